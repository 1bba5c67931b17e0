use std::collections::HashMap;
use std::time::Duration;

use crate::snapshot::Throughput;
use crate::system::NetCounters;

/// Outcome of one rate computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSample {
    /// First sight of this interface, or its counters went backwards; there
    /// is nothing valid to compute a delta against yet.
    NoBaseline,
    Rate(Throughput),
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    counters: NetCounters,
    tick: u64,
}

/// Turns cumulative per-interface byte counters into instantaneous rates.
///
/// Each interface keeps its own baseline stamped with the tick it was taken
/// at, so switching which interface is tracked and back later yields the
/// average rate over the elapsed ticks instead of a restart artifact.
/// Elapsed time is ticks × the configured tick interval rather than wall
/// clock, which keeps the computation deterministic.
///
/// Baselines for interfaces that vanish are retained untouched; the counter
/// decrease check rebaselines them if they come back reset.
#[derive(Debug)]
pub struct RateTracker {
    baselines: HashMap<String, Baseline>,
    tick_interval: Duration,
}

impl RateTracker {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            baselines: HashMap::new(),
            tick_interval,
        }
    }

    /// Records `counters` as the new baseline for `interface` and returns
    /// the rate since the previous baseline, if one was valid.
    pub fn update(&mut self, tick: u64, interface: &str, counters: NetCounters) -> RateSample {
        let previous = self
            .baselines
            .insert(interface.to_string(), Baseline { counters, tick });

        let Some(previous) = previous else {
            return RateSample::NoBaseline;
        };

        // A counter running backwards means the interface reset (or the
        // counter wrapped); the stored baseline is already fresh, so just
        // report that no rate exists this tick.
        if counters.bytes_sent < previous.counters.bytes_sent
            || counters.bytes_recv < previous.counters.bytes_recv
        {
            return RateSample::NoBaseline;
        }

        let elapsed_ticks = tick.saturating_sub(previous.tick);
        if elapsed_ticks == 0 {
            return RateSample::NoBaseline;
        }

        let elapsed = self.tick_interval.as_secs_f64() * elapsed_ticks as f64;
        RateSample::Rate(Throughput {
            sent_bytes_per_sec: (counters.bytes_sent - previous.counters.bytes_sent) as f64
                / elapsed,
            recv_bytes_per_sec: (counters.bytes_recv - previous.counters.bytes_recv) as f64
                / elapsed,
        })
    }

    /// Interfaces a baseline has ever been recorded for, including stale
    /// ones.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.baselines.len()
    }
}
