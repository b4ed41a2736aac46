//! Configuration Module
//!
//! Handles loading the cache, reconnect and server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;
use crate::subscription::BackoffPolicy;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of query results the cache can hold
    pub cache_capacity: usize,
    /// Freshness window in milliseconds, 0 = entries never expire
    pub cache_ttl_ms: u64,
    /// First reconnect delay in milliseconds
    pub reconnect_base_delay_ms: u64,
    /// Ceiling for a single reconnect delay in milliseconds
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failures tolerated before a cooldown
    pub reconnect_max_attempts: u32,
    /// How long a channel must stay subscribed before the attempt counter resets
    pub stability_window_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// HTTP diagnostics port
    pub server_port: u16,
    /// Resources watched at startup
    pub watched_resources: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cached query results (default: 100)
    /// - `CACHE_TTL_MS` - Freshness window in ms, 0 disables expiry (default: 300000)
    /// - `RECONNECT_BASE_DELAY_MS` - First reconnect delay (default: 1000)
    /// - `RECONNECT_MAX_DELAY_MS` - Reconnect delay ceiling (default: 30000)
    /// - `RECONNECT_MAX_ATTEMPTS` - Failures before cooldown (default: 10)
    /// - `STABILITY_WINDOW_MS` - Healthy-connection window (default: 60000)
    /// - `CLEANUP_INTERVAL` - Expired-entry sweep in seconds (default: 5)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `WATCHED_RESOURCES` - Comma separated resource names (default: "calls")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_capacity: parse_var("CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            cache_ttl_ms: parse_var("CACHE_TTL_MS").unwrap_or(defaults.cache_ttl_ms),
            reconnect_base_delay_ms: parse_var("RECONNECT_BASE_DELAY_MS")
                .unwrap_or(defaults.reconnect_base_delay_ms),
            reconnect_max_delay_ms: parse_var("RECONNECT_MAX_DELAY_MS")
                .unwrap_or(defaults.reconnect_max_delay_ms),
            reconnect_max_attempts: parse_var("RECONNECT_MAX_ATTEMPTS")
                .unwrap_or(defaults.reconnect_max_attempts),
            stability_window_ms: parse_var("STABILITY_WINDOW_MS")
                .unwrap_or(defaults.stability_window_ms),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            watched_resources: env::var("WATCHED_RESOURCES")
                .ok()
                .map(|v| split_resources(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.watched_resources),
        }
    }

    /// Cache TTL as a duration, `None` when expiry is disabled.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_ms > 0).then(|| Duration::from_millis(self.cache_ttl_ms))
    }

    /// Reconnect policy built from the configured delays.
    ///
    /// # Errors
    /// `InvalidPolicy` for a zero base delay, a ceiling below the base
    /// delay, or zero attempts.
    pub fn backoff_policy(&self) -> Result<BackoffPolicy> {
        BackoffPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
            self.reconnect_max_attempts,
            Duration::from_millis(self.stability_window_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            cache_ttl_ms: 300_000,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            reconnect_max_attempts: 10,
            stability_window_ms: 60_000,
            cleanup_interval: 5,
            server_port: 3000,
            watched_resources: vec!["calls".to_string()],
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn split_resources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.reconnect_max_attempts, 10);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.watched_resources, vec!["calls".to_string()]);
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("CACHE_CAPACITY");
        env::remove_var("CACHE_TTL_MS");
        env::remove_var("RECONNECT_MAX_ATTEMPTS");
        env::remove_var("WATCHED_RESOURCES");

        let config = Config::from_env();
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.reconnect_max_attempts, 10);
        assert_eq!(config.watched_resources, vec!["calls".to_string()]);
    }

    #[test]
    fn test_cache_ttl_zero_disables_expiry() {
        let config = Config {
            cache_ttl_ms: 0,
            ..Config::default()
        };
        assert!(config.cache_ttl().is_none());
        assert_eq!(Config::default().cache_ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_backoff_policy_from_config() {
        let policy = Config::default().backoff_policy().unwrap();
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(30));
        assert_eq!(policy.max_attempts(), 10);
        assert_eq!(policy.stability_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_policy_rejects_zero_delays() {
        let config = Config {
            reconnect_base_delay_ms: 0,
            reconnect_max_delay_ms: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.backoff_policy(),
            Err(crate::error::SyncError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_split_resources() {
        assert_eq!(
            split_resources(" calls, reps ,,teams"),
            vec!["calls".to_string(), "reps".to_string(), "teams".to_string()]
        );
        assert!(split_resources(" , ").is_empty());
    }
}
