//! Immutable pipeline configuration snapshot

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::log_record::DEFAULT_MAX_MESSAGE_LEN;
use super::overflow_policy::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 256;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
/// Bounded wait for the flush lock before a drain gives up
pub const DEFAULT_FLUSH_LOCK_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_SCOPE_MAX_AGE: Duration = Duration::from_secs(300);

/// Configuration accepted by the pipeline at construction.
///
/// Call [`PipelineConfig::validate`] (the builder does) to reject invalid
/// values and apply the documented default substitutions.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{LogLevel, OverflowPolicy, PipelineConfig};
///
/// let config = PipelineConfig::from_json(
///     r#"{ "queue_capacity": 512, "overflow_policy": "ForceFlush", "default_level": "Debug" }"#,
/// ).unwrap();
/// assert_eq!(config.queue_capacity, 512);
/// assert_eq!(config.overflow_policy, OverflowPolicy::ForceFlush);
/// assert_eq!(config.default_level, LogLevel::Debug);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of records held between drains. Must be positive.
    pub queue_capacity: usize,
    /// Maximum records popped per drain. Zero falls back to the default.
    pub max_batch_size: usize,
    /// Period of the background drain. Must be non-zero.
    pub flush_interval: Duration,
    /// Queue length that wakes the background drain early. Zero means
    /// `max_batch_size`.
    pub flush_threshold: usize,
    pub overflow_policy: OverflowPolicy,
    /// Global minimum level restored by `reset_to_defaults`
    pub default_level: LogLevel,
    pub flush_lock_timeout: Duration,
    /// Upper bound for message text in bytes. Must be positive.
    pub max_message_len: usize,
    /// Correlation scopes older than this are reaped from diagnostics
    pub scope_max_age: Duration,
    /// Spawn a background thread that drains on the interval
    pub auto_flush: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_threshold: 0,
            overflow_policy: OverflowPolicy::Drop,
            default_level: LogLevel::Info,
            flush_lock_timeout: DEFAULT_FLUSH_LOCK_TIMEOUT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            scope_max_age: DEFAULT_SCOPE_MAX_AGE,
            auto_flush: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()
    }

    /// Validate and return the normalised configuration
    pub fn validate(mut self) -> Result<Self> {
        if self.queue_capacity == 0 {
            return Err(LoggerError::config(
                "PipelineConfig",
                "queue_capacity must be greater than zero",
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(LoggerError::config(
                "PipelineConfig",
                "flush_interval must be greater than zero",
            ));
        }
        if self.max_message_len == 0 {
            return Err(LoggerError::config(
                "PipelineConfig",
                "max_message_len must be greater than zero",
            ));
        }
        if self.max_batch_size == 0 {
            self.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        }
        if self.flush_threshold == 0 {
            self.flush_threshold = self.max_batch_size;
        }
        self.flush_threshold = self.flush_threshold.min(self.queue_capacity);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default().validate().unwrap();
        assert_eq!(config.flush_threshold, DEFAULT_MAX_BATCH_SIZE);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = PipelineConfig {
            flush_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_falls_back_to_default() {
        let config = PipelineConfig {
            max_batch_size: 0,
            queue_capacity: 64,
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(config.flush_threshold, 64);
    }

    #[test]
    fn test_from_json_uses_defaults_for_missing_fields() {
        let config = PipelineConfig::from_json(r#"{ "auto_flush": false }"#).unwrap();
        assert!(!config.auto_flush);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(PipelineConfig::from_json(r#"{ "queue_capacity": 0 }"#).is_err());
    }
}
