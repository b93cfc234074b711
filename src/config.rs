//! Configuration loading.
//!
//! The core consumes its configuration rather than owning it: cache
//! capacity, the per-request deadline, and which request fields
//! participate in key derivation all arrive from the deployment. This
//! module gives that surface a TOML shape with per-field defaults:
//!
//! ```toml
//! capacity = 100
//! deadline_secs = 30
//! latency_reservoir = 1024
//!
//! [key_fields]
//! seed = false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{DEFAULT_CAPACITY, KeyFields};
use crate::telemetry::aggregator::DEFAULT_LATENCY_RESERVOIR;
use crate::{MimirError, Result};

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MimirConfig {
    /// Maximum number of cached generations (default: 100).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Per-request deadline in seconds (default: 30).
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Latency samples retained for percentile estimation (default: 1024).
    #[serde(default = "default_latency_reservoir")]
    pub latency_reservoir: usize,
    /// Which request fields participate in cache-key derivation
    /// (default: all of them).
    #[serde(default)]
    pub key_fields: KeyFields,
}

impl Default for MimirConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            deadline_secs: default_deadline_secs(),
            latency_reservoir: default_latency_reservoir(),
            key_fields: KeyFields::default(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_deadline_secs() -> u64 {
    30
}

fn default_latency_reservoir() -> usize {
    DEFAULT_LATENCY_RESERVOIR
}

impl MimirConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Check the invariants the builder relies on.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MimirError::Configuration("capacity must be positive".into()));
        }
        if self.deadline_secs == 0 {
            return Err(MimirError::Configuration(
                "deadline_secs must be positive".into(),
            ));
        }
        if self.latency_reservoir == 0 {
            return Err(MimirError::Configuration(
                "latency_reservoir must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The per-request deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}
