//! Configuration management for the harness

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default bounded wait for every action and assertion (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval for condition waits (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default outer budget for one test (milliseconds)
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 60_000;

/// Harness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// CDP endpoint of a running Chrome (e.g. "ws://localhost:9222")
    pub cdp_endpoint: String,

    /// Bounded wait for actions and assertions in milliseconds
    pub default_timeout_ms: u64,

    /// Interval between condition observations in milliseconds
    pub poll_interval_ms: u64,

    /// Timeout for a page load after `goto` in milliseconds
    pub navigation_timeout_ms: u64,

    /// Outer budget for a whole test in milliseconds
    pub test_timeout_ms: u64,

    /// Log level used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cdp_endpoint: "ws://localhost:9222".to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            test_timeout_ms: DEFAULT_TEST_TIMEOUT_MS,
            log_level: "info".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = HarnessConfig::default();

        if let Ok(endpoint) = env::var("HARNESS_CDP_ENDPOINT") {
            config.cdp_endpoint = endpoint;
        }

        if let Ok(timeout) = env::var("HARNESS_TIMEOUT_MS") {
            config.default_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid HARNESS_TIMEOUT_MS"))?;
        }

        if let Ok(interval) = env::var("HARNESS_POLL_INTERVAL_MS") {
            config.poll_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid HARNESS_POLL_INTERVAL_MS"))?;
        }

        if let Ok(timeout) = env::var("HARNESS_NAVIGATION_TIMEOUT_MS") {
            config.navigation_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid HARNESS_NAVIGATION_TIMEOUT_MS"))?;
        }

        if let Ok(timeout) = env::var("HARNESS_TEST_TIMEOUT_MS") {
            config.test_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid HARNESS_TEST_TIMEOUT_MS"))?;
        }

        if let Ok(log_level) = env::var("HARNESS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::configuration("poll_interval_ms must be greater than zero"));
        }
        if self.default_timeout_ms < self.poll_interval_ms {
            return Err(Error::configuration(
                "default_timeout_ms must not be shorter than poll_interval_ms",
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_explicit() {
        let config = HarnessConfig::default();
        assert_eq!(config.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.cdp_endpoint, "ws://localhost:9222");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HarnessConfig::from_toml_str(
            r#"
            cdp_endpoint = "ws://10.0.0.5:9222"
            default_timeout_ms = 8000
            "#,
        )
        .unwrap();

        assert_eq!(config.cdp_endpoint, "ws://10.0.0.5:9222");
        assert_eq!(config.default_timeout_ms, 8000);
        assert_eq!(config.test_timeout_ms, DEFAULT_TEST_TIMEOUT_MS);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = HarnessConfig::from_toml_str("poll_interval_ms = 0");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
