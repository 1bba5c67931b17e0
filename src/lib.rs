//! Polling system-metrics sampler with bounded rolling history and network
//! rate tracking.
//!
//! [`Sampler`] drives a fixed-cadence loop over a [`MetricSource`], keeps a
//! capacity-bounded history per tracked series, derives network throughput
//! from cumulative counters, and publishes an immutable [`Snapshot`] per
//! tick. [`export`] turns any snapshot into a stable JSON document.

pub mod config;
pub mod diag;
pub mod error;
pub mod export;
pub mod format;
pub mod sampler;
pub mod snapshot;
pub mod system;

pub use config::Config;
pub use error::{Error, Result};
pub use sampler::{Sampler, SamplerHandle, SamplerState, SeriesKey};
pub use snapshot::{Reading, Snapshot};
pub use system::{MetricSource, PlatformSource};
