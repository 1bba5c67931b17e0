pub mod platform;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use platform::PlatformSource;

/// Why a single metric query produced no value this tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The query failed; the next tick retries it naturally.
    #[error("{0}")]
    Unavailable(String),

    /// The platform has no backing for this metric at all.
    #[error("{0} not supported on this platform")]
    Unsupported(&'static str),

    /// The source itself can no longer be queried; sampling must halt.
    #[error("metric source failed: {0}")]
    Fatal(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
}

impl DiskUsage {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.used as f64 / self.total as f64 * 100.0) as f32
    }
}

/// Cumulative byte counters for one interface, monotone between resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReading {
    pub label: String,
    pub celsius: f32,
}

/// Capability surface over the platform metric queries.
///
/// Every call fails on its own: one broken metric must not take the others
/// down with it, so implementations return [`SourceError::Unavailable`] or
/// [`SourceError::Unsupported`] per query and reserve
/// [`SourceError::Fatal`] for a source that cannot be queried at all.
/// Queries run concurrently; implementations must be cheap to share and
/// must not block the async runtime.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Seconds since boot.
    async fn uptime(&self) -> SourceResult<Duration>;

    /// Busy percentage per logical core, in stable core order.
    async fn cpu_percents(&self) -> SourceResult<Vec<f32>>;

    async fn memory_stats(&self) -> SourceResult<MemoryStats>;

    /// Mounted partitions as the platform reports them, unfiltered.
    async fn partitions(&self) -> SourceResult<Vec<Partition>>;

    /// Usage for one partition, addressed by its device id.
    async fn disk_usage(&self, device: &str) -> SourceResult<DiskUsage>;

    /// Cumulative send/receive counters per interface name.
    async fn network_counters(&self) -> SourceResult<BTreeMap<String, NetCounters>>;

    async fn temperatures(&self) -> SourceResult<Vec<TemperatureReading>>;
}
