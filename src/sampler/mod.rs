pub mod history;
pub mod rate;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::snapshot::{DiskView, NetworkView, Reading, Snapshot};
use crate::system::{MetricSource, NetCounters, SourceError, SourceResult};

pub use history::SeriesKey;
use history::HistoryStore;
use rate::{RateSample, RateTracker};

/// Lifecycle of a sampler. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerState {
    /// Constructed but not started.
    Idle,
    Running,
    /// Stopped on request; no further snapshots will be published.
    Stopped,
    /// The metric source failed outright and sampling halted.
    Failed(String),
}

/// A sampler that has not started ticking yet.
///
/// [`Sampler::start`] spawns the sampling task and hands back the
/// [`SamplerHandle`] used to read snapshots and steer the loop.
pub struct Sampler {
    source: Arc<dyn MetricSource>,
    tick_interval: Duration,
    call_timeout: Duration,
    history_capacity: usize,
    interface: Option<String>,
    snapshot_tx: watch::Sender<Option<Snapshot>>,
    state_tx: watch::Sender<SamplerState>,
}

impl Sampler {
    pub fn new(source: Arc<dyn MetricSource>, config: &Config) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(SamplerState::Idle);
        Self {
            source,
            tick_interval: config.tick_interval(),
            call_timeout: config.call_timeout(),
            history_capacity: config.sampler.history_capacity,
            interface: config.network.interface.clone(),
            snapshot_tx,
            state_tx,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state_tx.borrow().clone()
    }

    /// Starts sampling. Must be called from within a tokio runtime.
    ///
    /// The state is `Running` by the time this returns; the first tick fires
    /// immediately rather than one interval in.
    pub fn start(self) -> SamplerHandle {
        let Sampler {
            source,
            tick_interval,
            call_timeout,
            history_capacity,
            interface,
            snapshot_tx,
            state_tx,
        } = self;

        let cancel = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let snapshot_rx = snapshot_tx.subscribe();
        let state_rx = state_tx.subscribe();

        state_tx.send_replace(SamplerState::Running);
        info!(
            interval_ms = tick_interval.as_millis() as u64,
            history_capacity, "sampler started"
        );

        let worker = Worker {
            source,
            history: HistoryStore::new(history_capacity),
            rates: RateTracker::new(tick_interval),
            interface,
            known_interfaces: BTreeSet::new(),
            tick_interval,
            call_timeout,
            tick: 0,
            snapshot_tx,
            state_tx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(worker.run(cmd_rx));

        SamplerHandle {
            cmd_tx,
            snapshot_rx,
            state_rx,
            cancel,
            join: Some(join),
        }
    }
}

enum Command {
    SelectInterface(String, oneshot::Sender<Result<()>>),
    History(SeriesKey, oneshot::Sender<Vec<f32>>),
    Interfaces(oneshot::Sender<Vec<String>>),
}

/// Owner handle for a running sampler.
///
/// Reads are cheap copies of the latest published snapshot; commands travel
/// to the sampling task and are applied between ticks. Dropping the handle
/// cancels the task.
pub struct SamplerHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<Option<Snapshot>>,
    state_rx: watch::Receiver<SamplerState>,
    cancel: CancellationToken,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl SamplerHandle {
    /// The most recent completed snapshot, if any tick has finished yet.
    pub fn latest(&self) -> Option<Snapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that yields each newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn state(&self) -> SamplerState {
        self.state_rx.borrow().clone()
    }

    /// A receiver observing state transitions, ending in `Stopped` or
    /// `Failed`.
    pub fn state_stream(&self) -> watch::Receiver<SamplerState> {
        self.state_rx.clone()
    }

    /// Switches throughput tracking to `name`.
    ///
    /// The name must be part of the interface set seen on the most recent
    /// successful network query; otherwise [`Error::InvalidInterface`] is
    /// returned and the previous selection stays in effect.
    pub async fn select_interface(&self, name: impl Into<String>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SelectInterface(name.into(), reply_tx))
            .await
            .map_err(|_| Error::NotRunning)?;
        reply_rx.await.map_err(|_| Error::NotRunning)?
    }

    /// A copy of one rolling series, oldest sample first.
    pub async fn history(&self, key: SeriesKey) -> Result<Vec<f32>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::History(key, reply_tx))
            .await
            .map_err(|_| Error::NotRunning)?;
        reply_rx.await.map_err(|_| Error::NotRunning)
    }

    /// Interface names seen on the most recent successful network query.
    pub async fn interfaces(&self) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Interfaces(reply_tx))
            .await
            .map_err(|_| Error::NotRunning)?;
        reply_rx.await.map_err(|_| Error::NotRunning)
    }

    /// Requests a stop. Safe mid-tick: in-flight metric queries are
    /// abandoned and nothing further is published.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the sampler and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    source: Arc<dyn MetricSource>,
    history: HistoryStore,
    rates: RateTracker,
    interface: Option<String>,
    known_interfaces: BTreeSet<String>,
    tick_interval: Duration,
    call_timeout: Duration,
    tick: u64,
    snapshot_tx: watch::Sender<Option<Snapshot>>,
    state_tx: watch::Sender<SamplerState>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let cancel = self.cancel.clone();
        let mut interval = tokio::time::interval(self.tick_interval);
        // A tick that overruns its slot skips the missed slots instead of
        // queueing them; ticks never run concurrently.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sampler stopped");
                    self.state_tx.send_replace(SamplerState::Stopped);
                    return;
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        // Every handle is gone; nobody can read or stop us.
                        None => {
                            info!("sampler handle dropped, stopping");
                            self.state_tx.send_replace(SamplerState::Stopped);
                            return;
                        }
                    }
                }
                _ = interval.tick() => {
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => None,
                        result = self.run_tick() => Some(result),
                    };
                    match outcome {
                        None => {
                            info!("sampler stopped mid-tick");
                            self.state_tx.send_replace(SamplerState::Stopped);
                            return;
                        }
                        Some(Err(reason)) => {
                            warn!(%reason, "metric source failed, halting sampler");
                            self.state_tx.send_replace(SamplerState::Failed(reason));
                            return;
                        }
                        Some(Ok(snapshot)) => {
                            self.snapshot_tx.send_replace(Some(snapshot));
                        }
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectInterface(name, reply) => {
                let result = if self.known_interfaces.contains(&name) {
                    info!(interface = %name, "interface selected");
                    self.interface = Some(name);
                    Ok(())
                } else {
                    Err(Error::InvalidInterface(name))
                };
                let _ = reply.send(result);
            }
            Command::History(key, reply) => {
                let _ = reply.send(self.history.series(key));
            }
            Command::Interfaces(reply) => {
                let _ = reply.send(self.known_interfaces.iter().cloned().collect());
            }
        }
    }

    /// One full sample cycle. `Err` carries the reason for a fatal source
    /// failure; any other failure lands in the snapshot as `Unavailable`.
    async fn run_tick(&mut self) -> std::result::Result<Snapshot, String> {
        self.tick += 1;
        let tick = self.tick;
        let timeout = self.call_timeout;
        debug!(tick, "sampling");

        let source = &self.source;
        let (uptime, cpus, memory, parts, counters, temps) = tokio::join!(
            timed(timeout, source.uptime()),
            timed(timeout, source.cpu_percents()),
            timed(timeout, source.memory_stats()),
            timed(timeout, source.partitions()),
            timed(timeout, source.network_counters()),
            timed(timeout, source.temperatures()),
        );

        // Usage queries depend on the partition list, so they fan out in a
        // second round. One failing partition only marks itself.
        let disks = match settle("partitions", parts)? {
            Reading::Available(parts) => {
                let queries = parts
                    .iter()
                    .map(|part| timed(timeout, source.disk_usage(&part.device)));
                let usages = futures::future::join_all(queries).await;

                let mut views = Vec::with_capacity(parts.len());
                for (part, usage) in parts.into_iter().zip(usages) {
                    let usage = settle(&format!("disk:{}", part.device), usage)?;
                    views.push(DiskView {
                        device: part.device,
                        mount_point: part.mount_point,
                        file_system: part.file_system,
                        usage,
                    });
                }
                Reading::Available(views)
            }
            Reading::Unavailable(reason) => Reading::Unavailable(reason),
        };

        // Everything is fetched; the tick cannot suspend past this point, so
        // history and baselines stay consistent even if a stop lands now.
        let uptime = settle("uptime", uptime)?;
        let cpu_percent = settle("cpu", cpus)?;
        let memory = settle("memory", memory)?;
        let counters = settle("network", counters)?;
        let temperatures = settle("temperature", temps)?;

        if let Reading::Available(percents) = &cpu_percent {
            for (index, percent) in percents.iter().enumerate() {
                self.history.append(SeriesKey::Core(index), *percent);
            }
        }
        if let Reading::Available(stats) = &memory {
            self.history.append(SeriesKey::Memory, stats.percent);
        }

        let network = match counters {
            Reading::Available(counters) => self.observe_network(tick, counters),
            Reading::Unavailable(reason) => Reading::Unavailable(reason),
        };

        Ok(Snapshot {
            tick,
            uptime,
            cpu_percent,
            memory,
            disks,
            network,
            temperatures,
        })
    }

    /// Refreshes the known-interface set and computes throughput for the
    /// selected interface.
    fn observe_network(
        &mut self,
        tick: u64,
        counters: BTreeMap<String, NetCounters>,
    ) -> Reading<NetworkView> {
        self.known_interfaces = counters.keys().cloned().collect();

        if self.interface.is_none() {
            // No configured selection: track the first interface in name
            // order until told otherwise.
            self.interface = counters.keys().next().cloned();
            if let Some(name) = &self.interface {
                info!(interface = %name, "tracking default network interface");
            }
        }

        let Some(name) = self.interface.clone() else {
            return Reading::Unavailable("no network interfaces".into());
        };
        let Some(&current) = counters.get(&name) else {
            // Selection outlived the interface. Its baseline stays parked in
            // the tracker in case the interface comes back.
            return Reading::Unavailable(format!("interface {name} not present"));
        };

        let throughput = match self.rates.update(tick, &name, current) {
            RateSample::Rate(throughput) => Some(throughput),
            RateSample::NoBaseline => None,
        };
        Reading::Available(NetworkView {
            interface: name,
            counters: current,
            throughput,
        })
    }
}

async fn timed<T>(
    timeout: Duration,
    query: impl Future<Output = SourceResult<T>>,
) -> SourceResult<T> {
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Unavailable(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Converts a query result into a snapshot reading, keeping only fatal
/// source failures as tick-aborting errors.
fn settle<T>(metric: &str, result: SourceResult<T>) -> std::result::Result<Reading<T>, String> {
    match result {
        Ok(value) => Ok(Reading::Available(value)),
        Err(SourceError::Fatal(reason)) => Err(reason),
        Err(err) => {
            warn!(metric, error = %err, "metric unavailable this tick");
            Ok(Reading::Unavailable(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_keeps_value() {
        let reading = settle("cpu", Ok(vec![1.0f32])).unwrap();
        assert_eq!(reading, Reading::Available(vec![1.0f32]));
    }

    #[test]
    fn settle_contains_unavailable_and_unsupported() {
        let reading: Reading<u64> =
            settle("memory", Err(SourceError::Unavailable("backend busy".into()))).unwrap();
        assert_eq!(reading, Reading::Unavailable("backend busy".into()));

        let reading: Reading<u64> =
            settle("temperature", Err(SourceError::Unsupported("temperature sensors"))).unwrap();
        assert!(matches!(reading, Reading::Unavailable(_)));
    }

    #[test]
    fn settle_escalates_fatal() {
        let result: std::result::Result<Reading<u64>, String> =
            settle("cpu", Err(SourceError::Fatal("backend gone".into())));
        assert_eq!(result.unwrap_err(), "backend gone");
    }

    #[tokio::test(start_paused = true)]
    async fn timed_reports_timeout_as_unavailable() {
        let result: SourceResult<u64> = timed(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        })
        .await;
        assert_eq!(
            result,
            Err(SourceError::Unavailable("timed out after 50ms".into()))
        );
    }
}
