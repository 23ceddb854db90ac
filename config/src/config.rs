use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Top-level configuration for an ephemeris manager.
///
/// Provider preference order is not configured here: it is the order in
/// which providers are registered on the manager.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EphemerisConfig {
    /// Bound on each individual provider call, in milliseconds.
    #[validate(range(min = 1))]
    #[serde(default = "default_per_attempt_timeout_ms")]
    pub per_attempt_timeout_ms: u64,

    /// Optional bound on a whole manager call across every retry and
    /// failover. `None` leaves the caller's own cancellation in charge.
    #[serde(default)]
    pub overall_timeout_ms: Option<u64>,

    /// Transient-failure retry policy.
    #[validate(nested)]
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Result cache sizing and freshness.
    #[validate(nested)]
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background health monitor cadence.
    #[validate(nested)]
    #[serde(default)]
    pub health: HealthCheckConfig,
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout_ms: default_per_attempt_timeout_ms(),
            overall_timeout_ms: None,
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            health: HealthCheckConfig::default(),
        }
    }
}

impl EphemerisConfig {
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_ms.map(Duration::from_millis)
    }
}

fn default_per_attempt_timeout_ms() -> u64 {
    5_000
}

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay, in milliseconds.
    #[validate(range(min = 1))]
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Ceiling for the backoff delay, in milliseconds.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    #[validate(range(min = 1.0))]
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    /// Randomize each delay by ±15% to avoid synchronized retries.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f32 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Result cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CacheConfig {
    /// LRU capacity; insertions beyond it evict the least recently used
    /// entry.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Freshness window for cached results, in seconds.
    #[validate(range(min = 1))]
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_max_entries() -> usize {
    1_000
}

fn default_ttl_secs() -> u64 {
    3_600
}

/// Background health monitor cadence.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct HealthCheckConfig {
    /// Seconds between probe sweeps.
    #[validate(range(min = 1))]
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Bound on each individual probe, in milliseconds.
    #[validate(range(min = 1))]
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EphemerisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.per_attempt_timeout(), Duration::from_secs(5));
        assert_eq!(config.overall_timeout(), None);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3_600));
        assert_eq!(config.health.interval(), Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = EphemerisConfig {
            per_attempt_timeout_ms: 0,
            ..EphemerisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EphemerisConfig =
            serde_json::from_str(r#"{"per_attempt_timeout_ms": 250, "cache": {"ttl_secs": 60}}"#)
                .unwrap();
        assert_eq!(config.per_attempt_timeout_ms, 250);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn retry_policy_durations() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.initial_backoff(), Duration::from_millis(100));
        assert_eq!(retry.max_backoff(), Duration::from_secs(5));
        assert_eq!(retry.max_retries, 2);
        assert!(retry.jitter);
    }
}
