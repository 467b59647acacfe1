//! Simulation run parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::MAX_WORKERS;

fn default_watchdog_secs() -> u64 {
    5
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Total number of workers ever launched.
    pub process_count: usize,
    /// Maximum concurrently live workers.
    pub simultaneous_count: usize,
    /// Simulated nanoseconds between spawns.
    pub spawn_interval_ns: u64,
    /// Base seed for worker RNGs; each worker derives its own from this and
    /// its slot index, so runs replay deterministically.
    #[serde(default)]
    pub seed: u64,
    /// Wall-clock watchdog in seconds. The run is torn down when it expires.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
}

impl SimConfig {
    /// Configuration with the given population shape, default seed, and the
    /// default five-second watchdog.
    #[must_use]
    pub fn new(process_count: usize, simultaneous_count: usize, spawn_interval_ns: u64) -> Self {
        Self {
            process_count,
            simultaneous_count,
            spawn_interval_ns,
            seed: 0,
            watchdog_secs: default_watchdog_secs(),
        }
    }

    /// Set the base RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the wall-clock watchdog.
    #[must_use]
    pub fn with_watchdog_secs(mut self, secs: u64) -> Self {
        self.watchdog_secs = secs;
        self
    }

    /// Watchdog as a [`Duration`].
    #[must_use]
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.process_count == 0 || self.process_count > MAX_WORKERS {
            return Err(format!("process_count must be in 1..={MAX_WORKERS}"));
        }
        if self.simultaneous_count == 0 || self.simultaneous_count > MAX_WORKERS {
            return Err(format!("simultaneous_count must be in 1..={MAX_WORKERS}"));
        }
        if self.spawn_interval_ns == 0 {
            return Err("spawn_interval_ns must be greater than 0".into());
        }
        if self.watchdog_secs == 0 {
            return Err("watchdog_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
