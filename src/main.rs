use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::info;
use tracing_subscriber::EnvFilter;

use syspulse::config::{Config, load_config, load_config_from_path};
use syspulse::format::{format_bytes, format_percent, format_rate, format_uptime};
use syspulse::sampler::{Sampler, SamplerHandle, SamplerState};
use syspulse::snapshot::{Reading, Snapshot};
use syspulse::system::PlatformSource;
use syspulse::{diag, export};

#[derive(Parser)]
#[command(
    name = "syspulse",
    about = "Polling system metrics sampler with rolling history"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Samples kept per rolling series
    #[arg(long)]
    capacity: Option<usize>,

    /// Per-metric query timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Network interface to track
    #[arg(long)]
    interface: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample continuously and print one line per snapshot
    Watch {
        /// Stop after this many snapshots
        #[arg(long)]
        ticks: Option<u64>,

        /// Print each snapshot as a JSON document instead of a summary line
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sample briefly and write a JSON snapshot to a file
    Export {
        /// Output path
        #[arg(long, default_value = "syspulse.json")]
        output: PathBuf,

        /// Snapshots to take before exporting (at least 2 gives throughput
        /// a baseline)
        #[arg(long, default_value_t = 2)]
        samples: u64,
    },
    /// Ping a host with the platform ping utility
    Ping {
        #[arg(long, default_value = diag::DEFAULT_HOST)]
        host: String,

        #[arg(long, default_value_t = diag::DEFAULT_COUNT)]
        count: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("syspulse=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    config.validate()?;

    match cli.command {
        Command::Watch { ticks, json } => run_watch(config, ticks, json).await,
        Command::Export { output, samples } => run_export(config, &output, samples).await,
        Command::Ping { host, count } => run_ping(&host, count).await,
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(tick_ms) = cli.tick_ms {
        config.sampler.tick_interval_ms = tick_ms;
    }
    if let Some(capacity) = cli.capacity {
        config.sampler.history_capacity = capacity;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.sampler.call_timeout_ms = timeout_ms;
    }
    if let Some(ref interface) = cli.interface {
        config.network.interface = Some(interface.clone());
    }

    config
}

fn start_sampler(config: &Config) -> SamplerHandle {
    let source = Arc::new(PlatformSource::new());
    Sampler::new(source, config).start()
}

async fn run_watch(config: Config, ticks: Option<u64>, json: bool) -> Result<()> {
    let handle = start_sampler(&config);
    let mut snapshots = handle.subscribe();
    let states = handle.state_stream();
    let mut seen = 0u64;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(snapshot) = snapshots.borrow_and_update().clone() else {
                    continue;
                };
                if json {
                    println!("{}", serde_json::to_string(&export::document(&snapshot))?);
                } else {
                    println!("{}", render_line(&snapshot));
                }
                seen += 1;
                if let Some(limit) = ticks
                    && seen >= limit
                {
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    if let SamplerState::Failed(reason) = states.borrow().clone() {
        return Err(eyre!("sampler failed: {reason}"));
    }
    Ok(())
}

async fn run_export(config: Config, output: &Path, samples: u64) -> Result<()> {
    let samples = samples.max(1);
    let handle = start_sampler(&config);
    let mut snapshots = handle.subscribe();
    let states = handle.state_stream();

    let mut latest = None;
    for _ in 0..samples {
        if snapshots.changed().await.is_err() {
            break;
        }
        latest = snapshots.borrow_and_update().clone();
    }
    handle.shutdown().await;

    if let SamplerState::Failed(reason) = states.borrow().clone() {
        return Err(eyre!("sampler failed: {reason}"));
    }
    let snapshot = latest.ok_or_else(|| eyre!("no snapshot was produced"))?;
    export::write_json(&snapshot, output)?;
    info!(path = %output.display(), "snapshot exported");
    println!("exported {}", output.display());
    Ok(())
}

async fn run_ping(host: &str, count: u32) -> Result<()> {
    let output = diag::ping(host, count).await?;
    print!("{output}");
    Ok(())
}

fn render_line(snapshot: &Snapshot) -> String {
    let uptime = match &snapshot.uptime {
        Reading::Available(uptime) => format_uptime(*uptime),
        Reading::Unavailable(_) => "n/a".to_string(),
    };

    let cpu = match &snapshot.cpu_percent {
        Reading::Available(cores) if !cores.is_empty() => {
            let avg = cores.iter().sum::<f32>() / cores.len() as f32;
            format!("{} ({} cores)", format_percent(avg), cores.len())
        }
        _ => "n/a".to_string(),
    };

    let memory = match &snapshot.memory {
        Reading::Available(memory) => format!(
            "{} ({}/{})",
            format_percent(memory.percent),
            format_bytes(memory.total.saturating_sub(memory.available)),
            format_bytes(memory.total)
        ),
        Reading::Unavailable(_) => "n/a".to_string(),
    };

    let network = match &snapshot.network {
        Reading::Available(view) => match view.throughput {
            Some(rate) => format!(
                "{} tx {} rx {}",
                view.interface,
                format_rate(rate.sent_bytes_per_sec),
                format_rate(rate.recv_bytes_per_sec)
            ),
            None => format!("{} (no baseline)", view.interface),
        },
        Reading::Unavailable(_) => "n/a".to_string(),
    };

    let disks = match &snapshot.disks {
        Reading::Available(views) => format!("{} partitions", views.len()),
        Reading::Unavailable(_) => "n/a".to_string(),
    };

    let temperature = match &snapshot.temperatures {
        Reading::Available(readings) => readings
            .iter()
            .map(|reading| reading.celsius)
            .fold(f32::NAN, f32::max),
        Reading::Unavailable(_) => f32::NAN,
    };
    let temperature = if temperature.is_finite() {
        format!("{temperature:.1}C")
    } else {
        "n/a".to_string()
    };

    format!(
        "tick {:>4} | up {} | cpu {} | mem {} | net {} | disks {} | temp {}",
        snapshot.tick, uptime, cpu, memory, network, disks, temperature
    )
}
