use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Components, Disks, Networks, System};
use tokio::task::JoinError;

use super::{
    DiskUsage, MemoryStats, MetricSource, NetCounters, Partition, SourceError, SourceResult,
    TemperatureReading,
};

/// Production [`MetricSource`] backed by `sysinfo`.
///
/// Each platform subsystem sits behind its own lock so the per-tick queries
/// stay independent: a slow disk scan does not serialize behind the CPU
/// refresh. Every query runs on the blocking pool; the caller can drop the
/// future (timeout, cancellation) without wedging the async runtime.
pub struct PlatformSource {
    cpu: Arc<Mutex<System>>,
    memory: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    components: Arc<Mutex<Components>>,
}

impl Default for PlatformSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSource {
    pub fn new() -> Self {
        // Prime the CPU counters so the first sampled tick has a real delta
        // to measure against instead of reporting zeros.
        let mut cpu = System::new();
        cpu.refresh_cpu_all();

        let mut memory = System::new();
        memory.refresh_memory();

        PlatformSource {
            cpu: Arc::new(Mutex::new(cpu)),
            memory: Arc::new(Mutex::new(memory)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
            components: Arc::new(Mutex::new(Components::new_with_refreshed_list())),
        }
    }
}

fn join_error(metric: &'static str, err: JoinError) -> SourceError {
    if err.is_panic() {
        SourceError::Fatal(format!("{metric} query panicked"))
    } else {
        SourceError::Unavailable(format!("{metric} query was cancelled"))
    }
}

#[async_trait]
impl MetricSource for PlatformSource {
    async fn uptime(&self) -> SourceResult<Duration> {
        let secs = tokio::task::spawn_blocking(System::uptime)
            .await
            .map_err(|err| join_error("uptime", err))?;
        Ok(Duration::from_secs(secs))
    }

    async fn cpu_percents(&self) -> SourceResult<Vec<f32>> {
        let cpu = Arc::clone(&self.cpu);
        let percents = tokio::task::spawn_blocking(move || {
            let mut sys = cpu.lock().unwrap_or_else(PoisonError::into_inner);
            sys.refresh_cpu_all();
            sys.cpus().iter().map(|core| core.cpu_usage()).collect::<Vec<f32>>()
        })
        .await
        .map_err(|err| join_error("cpu", err))?;

        if percents.is_empty() {
            return Err(SourceError::Unavailable("no cpu cores reported".into()));
        }
        Ok(percents)
    }

    async fn memory_stats(&self) -> SourceResult<MemoryStats> {
        let memory = Arc::clone(&self.memory);
        let (total, used, available) = tokio::task::spawn_blocking(move || {
            let mut sys = memory.lock().unwrap_or_else(PoisonError::into_inner);
            sys.refresh_memory();
            (sys.total_memory(), sys.used_memory(), sys.available_memory())
        })
        .await
        .map_err(|err| join_error("memory", err))?;

        if total == 0 {
            return Err(SourceError::Unavailable("no memory information".into()));
        }
        // psutil-style percent: how much of total is not available for new
        // allocations, which tracks what users see in a memory gauge.
        let percent = ((total.saturating_sub(available)) as f64 / total as f64 * 100.0) as f32;
        Ok(MemoryStats {
            total,
            used,
            available,
            percent,
        })
    }

    async fn partitions(&self) -> SourceResult<Vec<Partition>> {
        let disks = Arc::clone(&self.disks);
        let parts = tokio::task::spawn_blocking(move || {
            let mut disks = disks.lock().unwrap_or_else(PoisonError::into_inner);
            disks.refresh(true);
            disks
                .iter()
                .map(|disk| Partition {
                    device: disk.name().to_string_lossy().to_string(),
                    mount_point: disk.mount_point().to_string_lossy().to_string(),
                    file_system: disk.file_system().to_string_lossy().to_string(),
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|err| join_error("partitions", err))?;
        Ok(parts)
    }

    async fn disk_usage(&self, device: &str) -> SourceResult<DiskUsage> {
        let disks = Arc::clone(&self.disks);
        let device = device.to_string();
        tokio::task::spawn_blocking(move || {
            let disks = disks.lock().unwrap_or_else(PoisonError::into_inner);
            let disk = disks
                .iter()
                .find(|disk| disk.name().to_string_lossy() == device)
                .ok_or_else(|| SourceError::Unavailable(format!("unknown device: {device}")))?;
            let total = disk.total_space();
            if total == 0 {
                return Err(SourceError::Unavailable(format!(
                    "no size information for {device}"
                )));
            }
            Ok(DiskUsage {
                total,
                used: total.saturating_sub(disk.available_space()),
            })
        })
        .await
        .map_err(|err| join_error("disk usage", err))?
    }

    async fn network_counters(&self) -> SourceResult<BTreeMap<String, NetCounters>> {
        let networks = Arc::clone(&self.networks);
        let counters = tokio::task::spawn_blocking(move || {
            let mut networks = networks.lock().unwrap_or_else(PoisonError::into_inner);
            networks.refresh(true);
            networks
                .iter()
                .map(|(name, data)| {
                    (
                        name.clone(),
                        NetCounters {
                            bytes_sent: data.total_transmitted(),
                            bytes_recv: data.total_received(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>()
        })
        .await
        .map_err(|err| join_error("network", err))?;
        Ok(counters)
    }

    async fn temperatures(&self) -> SourceResult<Vec<TemperatureReading>> {
        let components = Arc::clone(&self.components);
        let readings = tokio::task::spawn_blocking(move || {
            let mut components = components.lock().unwrap_or_else(PoisonError::into_inner);
            components.refresh(true);
            components
                .iter()
                .filter_map(|component| {
                    component.temperature().map(|celsius| TemperatureReading {
                        label: component.label().to_string(),
                        celsius,
                    })
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|err| join_error("temperature", err))?;

        if readings.is_empty() {
            return Err(SourceError::Unsupported("temperature sensors"));
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smoke coverage against the live platform: values must come back
    // plausible, and the calls must not panic on any supported OS.
    #[tokio::test]
    async fn live_cpu_and_memory_queries() {
        let source = PlatformSource::new();

        let percents = source.cpu_percents().await.unwrap();
        assert!(!percents.is_empty());
        for pct in percents {
            assert!(pct.is_finite());
        }

        let memory = source.memory_stats().await.unwrap();
        assert!(memory.total > 0);
        assert!(memory.available <= memory.total);
        assert!((0.0..=100.0).contains(&memory.percent));
    }

    #[tokio::test]
    async fn live_uptime_is_nonzero() {
        let source = PlatformSource::new();
        let uptime = source.uptime().await.unwrap();
        assert!(uptime.as_secs() > 0);
    }

    #[tokio::test]
    async fn live_partition_usage_round_trip() {
        let source = PlatformSource::new();
        let parts = source.partitions().await.unwrap();
        // A machine with no mounted disks is legal; only check what exists.
        for part in parts.iter().take(2) {
            if let Ok(usage) = source.disk_usage(&part.device).await {
                assert!(usage.used <= usage.total);
            }
        }
    }

    #[tokio::test]
    async fn live_network_counters_query() {
        let source = PlatformSource::new();
        let counters = source.network_counters().await.unwrap();
        for (name, _) in counters.iter() {
            assert!(!name.is_empty());
        }
    }
}
