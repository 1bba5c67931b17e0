use std::collections::{HashMap, VecDeque};
use std::fmt;

pub const DEFAULT_CAPACITY: usize = 60;

/// Dimension a rolling series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    /// One logical core, by index.
    Core(usize),
    /// Memory used percent.
    Memory,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Core(index) => write!(f, "core:{index}"),
            SeriesKey::Memory => write!(f, "mem"),
        }
    }
}

/// Capacity-bounded rolling series, one per dimension key.
///
/// Memory stays O(series × capacity): each series evicts its oldest sample
/// once it reaches capacity. Series are created lazily on first append and
/// never removed; the tracked dimensions (cores, memory) are fixed for the
/// life of the process.
#[derive(Debug)]
pub struct HistoryStore {
    series: HashMap<SeriesKey, VecDeque<f32>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records `value` as the newest sample for `key`, evicting the oldest
    /// sample if the series is full.
    pub fn append(&mut self, key: SeriesKey, value: f32) {
        let series = self
            .series
            .entry(key)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if series.len() == self.capacity {
            series.pop_front();
        }
        series.push_back(value);
    }

    /// The samples recorded for `key`, oldest first. Empty for a key that
    /// has never been appended to.
    pub fn series(&self, key: SeriesKey) -> Vec<f32> {
        self.series
            .get(&key)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The keys with at least one recorded sample, in key order.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.series.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
