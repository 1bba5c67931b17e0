use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use syspulse::system::{
    DiskUsage, MemoryStats, MetricSource, NetCounters, Partition, SourceError, SourceResult,
    TemperatureReading,
};

/// Scripted results for one metric: queued results pop in order and the
/// final one repeats forever, so a feed is never exhausted mid-test.
pub struct Feed<T> {
    script: Mutex<VecDeque<SourceResult<T>>>,
}

impl<T: Clone> Feed<T> {
    fn new(initial: SourceResult<T>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([initial])),
        }
    }

    /// Appends a result to the script.
    pub fn push(&self, result: SourceResult<T>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Replaces the whole script with a single result.
    pub fn set(&self, result: SourceResult<T>) {
        let mut script = self.script.lock().unwrap();
        script.clear();
        script.push_back(result);
    }

    fn next(&self) -> SourceResult<T> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Deterministic in-memory metric source for driving the sampler in tests.
///
/// Every metric reads from its own [`Feed`]; per-device disk usage scripts
/// live in their own map. `delay_next_cpu` injects a one-shot virtual-time
/// stall into the next CPU query to exercise timeout and overrun paths.
pub struct ScriptedSource {
    pub uptime: Feed<Duration>,
    pub cpu: Feed<Vec<f32>>,
    pub memory: Feed<MemoryStats>,
    pub partitions: Feed<Vec<Partition>>,
    pub network: Feed<BTreeMap<String, NetCounters>>,
    pub temperatures: Feed<Vec<TemperatureReading>>,
    disk_usage: Mutex<HashMap<String, VecDeque<SourceResult<DiskUsage>>>>,
    cpu_delays: Mutex<VecDeque<Duration>>,
    cpu_calls: AtomicUsize,
}

impl ScriptedSource {
    /// A source where every metric succeeds with steady values.
    pub fn healthy() -> Self {
        let mut disk_usage = HashMap::new();
        disk_usage.insert(
            "sda1".to_string(),
            VecDeque::from([Ok(DiskUsage {
                total: 100_000,
                used: 40_000,
            })]),
        );

        Self {
            uptime: Feed::new(Ok(Duration::from_secs(3600))),
            cpu: Feed::new(Ok(vec![10.0, 20.0])),
            memory: Feed::new(Ok(MemoryStats {
                total: 16_000,
                used: 8_000,
                available: 8_000,
                percent: 50.0,
            })),
            partitions: Feed::new(Ok(vec![partition("sda1", "/", "ext4")])),
            network: Feed::new(Ok(net_map(&[("eth0", 1000, 2000), ("wlan0", 500, 700)]))),
            temperatures: Feed::new(Ok(vec![TemperatureReading {
                label: "cpu".into(),
                celsius: 45.0,
            }])),
            disk_usage: Mutex::new(disk_usage),
            cpu_delays: Mutex::new(VecDeque::new()),
            cpu_calls: AtomicUsize::new(0),
        }
    }

    /// Scripts the usage result for one device; the last result repeats.
    pub fn push_disk_usage(&self, device: &str, result: SourceResult<DiskUsage>) {
        self.disk_usage
            .lock()
            .unwrap()
            .entry(device.to_string())
            .or_default()
            .push_back(result);
    }

    /// Stalls the next CPU query by `delay` (virtual time).
    pub fn delay_next_cpu(&self, delay: Duration) {
        self.cpu_delays.lock().unwrap().push_back(delay);
    }

    pub fn cpu_calls(&self) -> usize {
        self.cpu_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn uptime(&self) -> SourceResult<Duration> {
        self.uptime.next()
    }

    async fn cpu_percents(&self) -> SourceResult<Vec<f32>> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.cpu_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.cpu.next()
    }

    async fn memory_stats(&self) -> SourceResult<MemoryStats> {
        self.memory.next()
    }

    async fn partitions(&self) -> SourceResult<Vec<Partition>> {
        self.partitions.next()
    }

    async fn disk_usage(&self, device: &str) -> SourceResult<DiskUsage> {
        let mut scripts = self.disk_usage.lock().unwrap();
        match scripts.get_mut(device) {
            Some(script) if !script.is_empty() => {
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    script.front().cloned().unwrap()
                }
            }
            _ => Err(SourceError::Unavailable(format!(
                "unknown device: {device}"
            ))),
        }
    }

    async fn network_counters(&self) -> SourceResult<BTreeMap<String, NetCounters>> {
        self.network.next()
    }

    async fn temperatures(&self) -> SourceResult<Vec<TemperatureReading>> {
        self.temperatures.next()
    }
}

pub fn partition(device: &str, mount_point: &str, file_system: &str) -> Partition {
    Partition {
        device: device.to_string(),
        mount_point: mount_point.to_string(),
        file_system: file_system.to_string(),
    }
}

pub fn net_map(entries: &[(&str, u64, u64)]) -> BTreeMap<String, NetCounters> {
    entries
        .iter()
        .map(|&(name, bytes_sent, bytes_recv)| {
            (
                name.to_string(),
                NetCounters {
                    bytes_sent,
                    bytes_recv,
                },
            )
        })
        .collect()
}
