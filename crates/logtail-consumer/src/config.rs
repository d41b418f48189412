//! Consumer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use logtail_types::Settings;

use crate::error::ConsumerError;

/// Default maximum records streamed per batch
pub const DEFAULT_BATCH_LIMIT: usize = 10_000;

/// Default pause between loop iterations
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 100;

/// Default fixed wait before restarting a failed loop
pub const DEFAULT_RESTART_BACKOFF_MS: u64 = 20_000;

/// Configuration for the log consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Maximum records streamed per batch
    pub batch_limit: usize,
    /// Pause between iterations, in milliseconds
    pub idle_interval_ms: u64,
    /// Wait before the supervisor restarts a failed loop, in milliseconds
    pub restart_backoff_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            restart_backoff_ms: DEFAULT_RESTART_BACKOFF_MS,
        }
    }
}

impl ConsumerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            batch_limit: settings.batch_limit,
            idle_interval_ms: settings.idle_interval_ms,
            restart_backoff_ms: settings.restart_backoff_secs.saturating_mul(1000),
        }
    }

    /// Set the batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Set the idle interval.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the restart backoff.
    pub fn with_restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConsumerError> {
        if self.batch_limit == 0 {
            return Err(ConsumerError::Config(
                "batch_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsumerConfig::default();
        assert_eq!(config.batch_limit, 10_000);
        assert_eq!(config.idle_interval(), Duration::from_millis(100));
        assert_eq!(config.restart_backoff(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = ConsumerConfig::default()
            .with_batch_limit(50)
            .with_idle_interval(Duration::from_millis(5))
            .with_restart_backoff(Duration::from_millis(250));

        assert_eq!(config.batch_limit, 50);
        assert_eq!(config.idle_interval_ms, 5);
        assert_eq!(config.restart_backoff_ms, 250);
    }

    #[test]
    fn test_zero_batch_limit_rejected() {
        let err = ConsumerConfig::default()
            .with_batch_limit(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Config(_)));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            batch_limit: 500,
            idle_interval_ms: 250,
            restart_backoff_secs: 3,
            ..Settings::default()
        };

        let config = ConsumerConfig::from_settings(&settings);
        assert_eq!(config.batch_limit, 500);
        assert_eq!(config.idle_interval_ms, 250);
        assert_eq!(config.restart_backoff_ms, 3_000);
    }
}
