use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Milliseconds between sampling ticks.
    pub tick_interval_ms: u64,
    /// Samples kept per rolling series.
    pub history_capacity: usize,
    /// Milliseconds before a single metric query is abandoned for the tick.
    pub call_timeout_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            tick_interval_ms: 1000,
            history_capacity: 60,
            call_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface to track from the start; the first one in name order when
    /// unset.
    pub interface: Option<String>,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.sampler.tick_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.sampler.call_timeout_ms)
    }

    /// Rejects values the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sampler.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be greater than 0".into()));
        }
        if self.sampler.history_capacity == 0 {
            return Err(Error::Config("history_capacity must be greater than 0".into()));
        }
        if self.sampler.call_timeout_ms == 0 {
            return Err(Error::Config("call_timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("syspulse").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "invalid config file, using defaults");
                Config::default()
            }
        },
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "unreadable config file, using defaults");
            Config::default()
        }
    }
}
