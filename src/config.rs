use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::RetryConfig;

// ============================================================================
// Saga Configuration
// ============================================================================
//
// Every value can be overridden with a `USER_REGISTRY_<FIELD>` environment
// variable, e.g. `USER_REGISTRY_COMPENSATION_DELAY_MS=5000`.
//
// ============================================================================

const ENV_PREFIX: &str = "USER_REGISTRY_";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid config: {message}")]
    Validation { message: String },

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Default compensation delay: two minutes.
fn default_compensation_delay_ms() -> u64 {
    120_000
}

fn default_subscription_poll_interval_ms() -> u64 {
    500
}

fn default_subscription_batch_size() -> usize {
    100
}

fn default_delivery_max_attempts() -> u32 {
    5
}

fn default_delivery_initial_backoff_ms() -> u64 {
    50
}

fn default_delivery_max_backoff_ms() -> u64 {
    5_000
}

fn default_timer_retry_delay_ms() -> u64 {
    1_000
}

fn default_entity_idle_timeout_ms() -> u64 {
    60_000
}

fn default_dlq_capacity() -> usize {
    10_000
}

fn default_metrics_port() -> u16 {
    9090
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaConfig {
    /// How long a reservation may stay unconfirmed before it is released.
    #[serde(default = "default_compensation_delay_ms")]
    pub compensation_delay_ms: u64,
    /// Upper bound on the wait between two outbox polls.
    #[serde(default = "default_subscription_poll_interval_ms")]
    pub subscription_poll_interval_ms: u64,
    /// Maximum number of events delivered per batch.
    #[serde(default = "default_subscription_batch_size")]
    pub subscription_batch_size: usize,
    /// Attempts per delivery round before an event is recorded in the dead letter queue.
    #[serde(default = "default_delivery_max_attempts")]
    pub delivery_max_attempts: u32,
    #[serde(default = "default_delivery_initial_backoff_ms")]
    pub delivery_initial_backoff_ms: u64,
    #[serde(default = "default_delivery_max_backoff_ms")]
    pub delivery_max_backoff_ms: u64,
    /// Delay before a compensation timer retries a failed Release.
    #[serde(default = "default_timer_retry_delay_ms")]
    pub timer_retry_delay_ms: u64,
    /// Idle period after which a per-address or per-user actor stops.
    #[serde(default = "default_entity_idle_timeout_ms")]
    pub entity_idle_timeout_ms: u64,
    /// Parked events kept by the dead letter queue; the oldest go first.
    #[serde(default = "default_dlq_capacity")]
    pub dlq_capacity: usize,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            compensation_delay_ms: default_compensation_delay_ms(),
            subscription_poll_interval_ms: default_subscription_poll_interval_ms(),
            subscription_batch_size: default_subscription_batch_size(),
            delivery_max_attempts: default_delivery_max_attempts(),
            delivery_initial_backoff_ms: default_delivery_initial_backoff_ms(),
            delivery_max_backoff_ms: default_delivery_max_backoff_ms(),
            timer_retry_delay_ms: default_timer_retry_delay_ms(),
            entity_idle_timeout_ms: default_entity_idle_timeout_ms(),
            dlq_capacity: default_dlq_capacity(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl SagaConfig {
    /// Load from `USER_REGISTRY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse or a value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Keys carry the `USER_REGISTRY_` prefix.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        override_from(&lookup, "COMPENSATION_DELAY_MS", &mut config.compensation_delay_ms)?;
        override_from(&lookup, "SUBSCRIPTION_POLL_INTERVAL_MS", &mut config.subscription_poll_interval_ms)?;
        override_from(&lookup, "SUBSCRIPTION_BATCH_SIZE", &mut config.subscription_batch_size)?;
        override_from(&lookup, "DELIVERY_MAX_ATTEMPTS", &mut config.delivery_max_attempts)?;
        override_from(&lookup, "DELIVERY_INITIAL_BACKOFF_MS", &mut config.delivery_initial_backoff_ms)?;
        override_from(&lookup, "DELIVERY_MAX_BACKOFF_MS", &mut config.delivery_max_backoff_ms)?;
        override_from(&lookup, "TIMER_RETRY_DELAY_MS", &mut config.timer_retry_delay_ms)?;
        override_from(&lookup, "ENTITY_IDLE_TIMEOUT_MS", &mut config.entity_idle_timeout_ms)?;
        override_from(&lookup, "DLQ_CAPACITY", &mut config.dlq_capacity)?;
        override_from(&lookup, "METRICS_PORT", &mut config.metrics_port)?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compensation_delay_ms == 0 {
            return Err(ConfigError::Validation {
                message: "compensation_delay_ms must be > 0".to_string(),
            });
        }
        if self.subscription_poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                message: "subscription_poll_interval_ms must be > 0".to_string(),
            });
        }
        if self.subscription_batch_size == 0 {
            return Err(ConfigError::Validation {
                message: "subscription_batch_size must be > 0".to_string(),
            });
        }
        if self.delivery_max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "delivery_max_attempts must be > 0".to_string(),
            });
        }
        if self.delivery_initial_backoff_ms > self.delivery_max_backoff_ms {
            return Err(ConfigError::Validation {
                message: format!(
                    "delivery_initial_backoff_ms ({}) must be <= delivery_max_backoff_ms ({})",
                    self.delivery_initial_backoff_ms, self.delivery_max_backoff_ms
                ),
            });
        }
        if self.timer_retry_delay_ms == 0 {
            return Err(ConfigError::Validation {
                message: "timer_retry_delay_ms must be > 0".to_string(),
            });
        }
        if self.entity_idle_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "entity_idle_timeout_ms must be > 0".to_string(),
            });
        }
        if self.dlq_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "dlq_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn compensation_delay(&self) -> Duration {
        Duration::from_millis(self.compensation_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.subscription_poll_interval_ms)
    }

    pub fn timer_retry_delay(&self) -> Duration {
        Duration::from_millis(self.timer_retry_delay_ms)
    }

    pub fn entity_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.entity_idle_timeout_ms)
    }

    /// Backoff policy for routing one event
    pub fn delivery_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.delivery_max_attempts,
            initial_delay: Duration::from_millis(self.delivery_initial_backoff_ms),
            max_delay: Duration::from_millis(self.delivery_max_backoff_ms),
            ..RetryConfig::default()
        }
    }
}

fn override_from<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    let key = format!("{}{}", ENV_PREFIX, field);
    if let Some(value) = lookup(&key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SagaConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, SagaConfig::default());
        assert_eq!(config.compensation_delay(), Duration::from_secs(120));
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.delivery_retry().max_attempts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let config = SagaConfig::from_lookup(lookup(&[
            ("USER_REGISTRY_COMPENSATION_DELAY_MS", "250"),
            ("USER_REGISTRY_SUBSCRIPTION_BATCH_SIZE", " 10 "),
            ("USER_REGISTRY_METRICS_PORT", "9191"),
            ("USER_REGISTRY_ENTITY_IDLE_TIMEOUT_MS", "5000"),
        ]))
        .unwrap();

        assert_eq!(config.entity_idle_timeout(), Duration::from_secs(5));
        assert_eq!(config.compensation_delay(), Duration::from_millis(250));
        assert_eq!(config.subscription_batch_size, 10);
        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.timer_retry_delay_ms, 1_000);
    }

    #[test]
    fn test_unparsable_value() {
        let result = SagaConfig::from_lookup(lookup(&[("USER_REGISTRY_DELIVERY_MAX_ATTEMPTS", "many")]));

        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                key: "USER_REGISTRY_DELIVERY_MAX_ATTEMPTS".to_string(),
                value: "many".to_string(),
            })
        );
    }

    #[test]
    fn test_validation() {
        let zero_delay = SagaConfig::from_lookup(lookup(&[("USER_REGISTRY_COMPENSATION_DELAY_MS", "0")]));
        assert!(matches!(zero_delay, Err(ConfigError::Validation { .. })));

        let inverted_backoff = SagaConfig { delivery_initial_backoff_ms: 10_000, ..SagaConfig::default() };
        assert!(inverted_backoff.validate().is_err());

        let no_dlq = SagaConfig { dlq_capacity: 0, ..SagaConfig::default() };
        assert!(no_dlq.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SagaConfig = serde_json::from_str(r#"{"compensation_delay_ms": 1000}"#).unwrap();
        assert_eq!(config.compensation_delay_ms, 1000);
        assert_eq!(config.subscription_poll_interval_ms, 500);
    }
}
