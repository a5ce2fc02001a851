//! Engine Configuration
//!
//! All tunables for the streaming engine, fixed at engine construction and
//! not re-tunable mid-stream. Configuration can come from three places, in
//! increasing order of effort:
//!
//! - [`EngineConfig::default`] — built-in constants suitable for mobile and
//!   desktop clients alike
//! - `with_*` builder methods for programmatic overrides
//! - [`load_config`] — a TOML file, with every missing field defaulted
//!
//! Environment overrides (`SMBSTREAM_*`) are applied on top by
//! [`EngineConfig::from_env`], which the demo binary uses.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the streaming engine
///
/// Sizes are in bytes, intervals in milliseconds. The millisecond fields
/// have `Duration` accessors for call sites that sleep or compare clocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Process-wide memory ceiling for in-flight stream buffers (bytes)
    pub budget_capacity: u64,

    /// Maximum number of idle buffers kept in the pool free list
    pub pool_capacity: usize,

    /// Largest buffer the pool will accept back (bytes); bigger ones are dropped
    pub pool_max_buffer: usize,

    /// Free-list entries kept when a budget-relief action trims the pool
    pub pool_relief_low_water: usize,

    /// Smallest read granularity the adaptive controller will shrink to (bytes)
    pub chunk_min: usize,

    /// Largest read granularity the adaptive controller will grow to (bytes)
    pub chunk_max: usize,

    /// Read granularity a fresh stream starts with (bytes)
    pub chunk_initial: usize,

    /// Consecutive pressure events that trigger a chunk-size halving
    pub pressure_threshold: u32,

    /// Pressure events since the last relief action after which successful
    /// iterations are throttled
    pub throttle_after: u32,

    /// Delay appended to each throttled iteration (milliseconds)
    pub throttle_delay_ms: u64,

    /// Minimum interval between two budget-relief actions (milliseconds)
    pub relief_cooldown_ms: u64,

    /// Wait between a failed budget reservation and its single retry
    /// (milliseconds)
    pub relief_retry_wait_ms: u64,

    /// Minimum interval between progress log lines (milliseconds)
    pub progress_log_interval_ms: u64,

    /// Byte stride that forces a progress log line regardless of the interval
    pub progress_log_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget_capacity: 100 * 1024 * 1024, // 100 MiB
            pool_capacity: 3,
            pool_max_buffer: 1024 * 1024, // 1 MiB
            pool_relief_low_water: 1,
            chunk_min: 64 * 1024,     // 64 KiB
            chunk_max: 512 * 1024,    // 512 KiB
            chunk_initial: 128 * 1024, // 128 KiB
            pressure_threshold: 4,
            throttle_after: 3,
            throttle_delay_ms: 50,
            relief_cooldown_ms: 2_000,
            relief_retry_wait_ms: 200,
            progress_log_interval_ms: 3_000,
            progress_log_bytes: 25 * 1024 * 1024, // 25 MiB
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory budget ceiling (bytes)
    #[must_use]
    pub fn with_budget_capacity(mut self, bytes: u64) -> Self {
        self.budget_capacity = bytes;
        self
    }

    /// Set the buffer pool free-list capacity and per-buffer size cap
    #[must_use]
    pub fn with_pool(mut self, capacity: usize, max_buffer: usize) -> Self {
        self.pool_capacity = capacity;
        self.pool_max_buffer = max_buffer;
        self
    }

    /// Set the adaptive chunk-size floor and ceiling (bytes)
    #[must_use]
    pub fn with_chunk_bounds(mut self, min: usize, max: usize) -> Self {
        self.chunk_min = min;
        self.chunk_max = max;
        self
    }

    /// Set the starting chunk size for new streams (bytes)
    #[must_use]
    pub fn with_chunk_initial(mut self, bytes: usize) -> Self {
        self.chunk_initial = bytes;
        self
    }

    /// Set the consecutive-pressure threshold for halving
    #[must_use]
    pub fn with_pressure_threshold(mut self, events: u32) -> Self {
        self.pressure_threshold = events;
        self
    }

    /// Set the relief cooldown and retry wait (milliseconds)
    #[must_use]
    pub fn with_relief_timing(mut self, cooldown_ms: u64, retry_wait_ms: u64) -> Self {
        self.relief_cooldown_ms = cooldown_ms;
        self.relief_retry_wait_ms = retry_wait_ms;
        self
    }

    /// Set the throttle threshold and delay
    #[must_use]
    pub fn with_throttle(mut self, after_events: u32, delay_ms: u64) -> Self {
        self.throttle_after = after_events;
        self.throttle_delay_ms = delay_ms;
        self
    }

    /// Throttle delay as a `Duration`
    #[must_use]
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_delay_ms)
    }

    /// Relief cooldown as a `Duration`
    #[must_use]
    pub fn relief_cooldown(&self) -> Duration {
        Duration::from_millis(self.relief_cooldown_ms)
    }

    /// Relief retry wait as a `Duration`
    #[must_use]
    pub fn relief_retry_wait(&self) -> Duration {
        Duration::from_millis(self.relief_retry_wait_ms)
    }

    /// Progress log interval as a `Duration`
    #[must_use]
    pub fn progress_log_interval(&self) -> Duration {
        Duration::from_millis(self.progress_log_interval_ms)
    }

    /// Apply `SMBSTREAM_*` environment overrides on top of `self`
    ///
    /// Unparseable values are ignored with a warning rather than failing
    /// startup.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_u64("SMBSTREAM_BUDGET_CAPACITY") {
            self.budget_capacity = v;
        }
        if let Some(v) = env_usize("SMBSTREAM_POOL_CAPACITY") {
            self.pool_capacity = v;
        }
        if let Some(v) = env_usize("SMBSTREAM_POOL_MAX_BUFFER") {
            self.pool_max_buffer = v;
        }
        if let Some(v) = env_usize("SMBSTREAM_CHUNK_MIN") {
            self.chunk_min = v;
        }
        if let Some(v) = env_usize("SMBSTREAM_CHUNK_MAX") {
            self.chunk_max = v;
        }
        if let Some(v) = env_usize("SMBSTREAM_CHUNK_INITIAL") {
            self.chunk_initial = v;
        }
        if let Some(v) = env_u64("SMBSTREAM_RELIEF_COOLDOWN_MS") {
            self.relief_cooldown_ms = v;
        }
        if let Some(v) = env_u64("SMBSTREAM_THROTTLE_DELAY_MS") {
            self.throttle_delay_ms = v;
        }
        self
    }

    /// Default configuration with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Validate internal consistency
    ///
    /// Called by the engine constructor; exposed so config files can be
    /// checked before wiring anything up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget_capacity == 0 {
            return Err(ConfigError::Invalid(
                "budget_capacity must be nonzero".to_string(),
            ));
        }
        if self.chunk_min == 0 {
            return Err(ConfigError::Invalid("chunk_min must be nonzero".to_string()));
        }
        if self.chunk_min > self.chunk_max {
            return Err(ConfigError::Invalid(format!(
                "chunk_min ({}) exceeds chunk_max ({})",
                self.chunk_min, self.chunk_max
            )));
        }
        if self.chunk_initial < self.chunk_min || self.chunk_initial > self.chunk_max {
            return Err(ConfigError::Invalid(format!(
                "chunk_initial ({}) outside [{}, {}]",
                self.chunk_initial, self.chunk_min, self.chunk_max
            )));
        }
        if self.pressure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "pressure_threshold must be nonzero".to_string(),
            ));
        }
        if self.pool_relief_low_water > self.pool_capacity {
            return Err(ConfigError::Invalid(format!(
                "pool_relief_low_water ({}) exceeds pool_capacity ({})",
                self.pool_relief_low_water, self.pool_capacity
            )));
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env_u64(key).map(|v| v as usize)
}

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values are individually parseable but mutually inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load and validate a configuration from a TOML file
///
/// Missing fields take their defaults, so a partial file tuning only the
/// budget ceiling is valid.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget_capacity, 100 * 1024 * 1024);
        assert_eq!(config.pool_capacity, 3);
        assert_eq!(config.chunk_min, 64 * 1024);
        assert_eq!(config.chunk_max, 512 * 1024);
        assert_eq!(config.chunk_initial, 128 * 1024);
        assert_eq!(config.pressure_threshold, 4);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::new()
            .with_budget_capacity(2 * 1024 * 1024)
            .with_chunk_bounds(1024, 4096)
            .with_chunk_initial(2048)
            .with_pressure_threshold(2)
            .with_relief_timing(100, 10)
            .with_throttle(1, 5);

        assert!(config.validate().is_ok());
        assert_eq!(config.budget_capacity, 2 * 1024 * 1024);
        assert_eq!(config.chunk_min, 1024);
        assert_eq!(config.chunk_max, 4096);
        assert_eq!(config.chunk_initial, 2048);
        assert_eq!(config.relief_cooldown(), Duration::from_millis(100));
        assert_eq!(config.relief_retry_wait(), Duration::from_millis(10));
        assert_eq!(config.throttle_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let config = EngineConfig::new().with_chunk_bounds(4096, 1024);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_initial_outside_bounds() {
        let config = EngineConfig::new()
            .with_chunk_bounds(1024, 4096)
            .with_chunk_initial(8192);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_zero_budget() {
        let config = EngineConfig::new().with_budget_capacity(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stream.toml");
        std::fs::write(&path, "budget_capacity = 8388608\nchunk_initial = 65536\n")
            .expect("write config");

        let config = load_config(&path).expect("load config");
        assert_eq!(config.budget_capacity, 8 * 1024 * 1024);
        assert_eq!(config.chunk_initial, 64 * 1024);
        // Untouched fields keep their defaults
        assert_eq!(config.pool_capacity, 3);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stream.toml");
        std::fs::write(&path, "budget_capacity = \"lots\"").expect("write config");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
