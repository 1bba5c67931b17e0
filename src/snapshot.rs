use std::time::Duration;

use crate::system::{DiskUsage, MemoryStats, NetCounters, TemperatureReading};

/// One metric's outcome for a tick: the value, or the reason there is none.
///
/// Consumers must be able to tell "this reading failed" from a stale or
/// zeroed value, so unavailability travels inside the snapshot instead of
/// erasing the field.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Reading<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Reading::Available(value) => Some(value),
            Reading::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }
}

/// Usage of one partition as sampled this tick. Not historized; every tick
/// recomputes the full list.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskView {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
    pub usage: Reading<DiskUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub sent_bytes_per_sec: f64,
    pub recv_bytes_per_sec: f64,
}

/// The selected interface's counters and, once a baseline exists, its rate.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkView {
    pub interface: String,
    pub counters: NetCounters,
    /// `None` until the rate tracker has a baseline for this interface.
    pub throughput: Option<Throughput>,
}

/// Everything sampled in one tick, published as an immutable value.
///
/// A snapshot is never mutated after assembly; the next tick supersedes it
/// wholesale. Consumers may hold on to clones for as long as they like.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Monotone tick sequence number, starting at 1.
    pub tick: u64,
    pub uptime: Reading<Duration>,
    /// Busy percentage per logical core, in core order.
    pub cpu_percent: Reading<Vec<f32>>,
    pub memory: Reading<MemoryStats>,
    pub disks: Reading<Vec<DiskView>>,
    pub network: Reading<NetworkView>,
    pub temperatures: Reading<Vec<TemperatureReading>>,
}
