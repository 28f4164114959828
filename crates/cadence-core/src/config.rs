//! Configuration for the model cache

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{CoreError, Result};

/// Configuration for a [`ModelCache`](crate::model_cache::ModelCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCacheConfig {
    /// Maximum number of resources held at once
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Milliseconds a loaded resource stays valid, measured from its load
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Interval for the optional background sweep of expired entries.
    /// Expiry is always checked lazily on `get`; the sweep only frees
    /// expired resources earlier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_ms: Option<u64>,
}

fn default_max_size() -> usize {
    4
}

fn default_ttl_ms() -> u64 {
    3_600_000 // 1 hour
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ModelCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: None,
        }
    }
}

impl ModelCacheConfig {
    /// Create a configuration with the given capacity and TTL.
    ///
    /// Durations are kept at millisecond precision.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl_ms: duration_ms(ttl),
            sweep_interval_ms: None,
        }
    }

    /// Enable the background sweep
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = Some(duration_ms(interval));
        self
    }

    /// TTL as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Sweep interval as a `Duration`, if enabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms.map(Duration::from_millis)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            let mut err = CoreError::from(err);
            if let CoreError::Io { path: p, .. } = &mut err {
                *p = Some(path.to_path_buf());
            }
            err
        })?;
        let config: Self = toml::from_str(&content).map_err(|err| CoreError::Configuration {
            code: "CONFIG_PARSE_FAILED",
            message: err.to_string(),
            context: "Parsing model cache configuration".to_string(),
            suggestion: "Check the TOML syntax and field names".to_string(),
            config_path: Some(path.to_path_buf()),
            field_name: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|err| {
            CoreError::configuration(
                "CONFIG_SERIALIZE_FAILED",
                err.to_string(),
                "Serializing model cache configuration",
                "Report this as a bug",
            )
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CoreError::configuration_field(
                "CONFIG_MAX_SIZE_ZERO",
                "max_size must be greater than 0",
                "Model cache configuration validation",
                "Set max_size to at least 1",
                "max_size",
            ));
        }

        if self.ttl_ms == 0 {
            return Err(CoreError::configuration_field(
                "CONFIG_TTL_ZERO",
                "ttl_ms must be greater than 0",
                "Model cache configuration validation",
                "A zero TTL would expire every entry immediately; use at least 1 millisecond",
                "ttl_ms",
            ));
        }

        if self.sweep_interval_ms == Some(0) {
            return Err(CoreError::configuration_field(
                "CONFIG_SWEEP_INTERVAL_ZERO",
                "sweep_interval_ms must be greater than 0",
                "Model cache configuration validation",
                "Remove sweep_interval_ms to disable the sweep",
                "sweep_interval_ms",
            ));
        }

        Ok(())
    }
}
