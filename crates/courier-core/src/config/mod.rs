//! Engine configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `COURIER_CONFIG` env var
//! 3. **Environment variables**: `COURIER__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ThrottleConfig`]: Per-host minimum request spacing and table bound
//! - [`TimeoutsConfig`]: Connect/read timeout pairs for the short and long tiers
//! - [`CacheConfig`]: Renewal window, sizing and storage switches
//! - [`RetryConfig`]: Attempt budget and connectivity backoff range
//! - [`FallbackConfig`]: Lenient fetcher switch and user agent
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [throttle]
//! min_interval_ms = 1500
//!
//! [throttle.host_intervals]
//! "quotes.example.com" = 5000
//!
//! # connect_ms falls back to 5000 when omitted
//! [timeouts.long]
//! read_ms = 3600000
//!
//! [retry]
//! max_retries = 3
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

use crate::types::TimeoutTier;

/// Default user agent presented by the fallback fetcher.
pub const DEFAULT_BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
);

/// Per-host request pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum spacing between successive requests to one host. Defaults to `1500`.
    pub min_interval_ms: u64,

    /// Upper bound on tracked hosts before the oldest entry is evicted. Defaults to `20`.
    pub max_tracked_hosts: usize,

    /// Host-specific spacing overriding `min_interval_ms`.
    pub host_intervals: HashMap<String, u64>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { min_interval_ms: 1500, max_tracked_hosts: 20, host_intervals: HashMap::new() }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// One connect/read timeout pair. `connect_ms` may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPair {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    pub read_ms: u64,
}

fn default_connect_ms() -> u64 {
    5_000
}

impl TimeoutPair {
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    #[must_use]
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

/// The two timeout tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Defaults to 5s connect / 7s read.
    pub short: TimeoutPair,

    /// Defaults to 5s connect / 3min read.
    pub long: TimeoutPair,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            short: TimeoutPair { connect_ms: default_connect_ms(), read_ms: 7_000 },
            long: TimeoutPair { connect_ms: default_connect_ms(), read_ms: 180_000 },
        }
    }
}

impl TimeoutsConfig {
    #[must_use]
    pub fn for_tier(&self, tier: TimeoutTier) -> TimeoutPair {
        match tier {
            TimeoutTier::Short => self.short,
            TimeoutTier::Long => self.long,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep records in memory. Defaults to `true`.
    pub in_memory: bool,

    /// Age after which a record is stale. Defaults to one hour.
    pub renewal_window_ms: u64,

    /// Upper bound on in-memory records. Defaults to `10000`.
    pub max_entries: usize,

    /// Replace existing durable records on store. Defaults to `true`.
    pub overwrite: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { in_memory: true, renewal_window_ms: 3_600_000, max_entries: 10_000, overwrite: true }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn renewal_window(&self) -> Duration {
        Duration::from_millis(self.renewal_window_ms)
    }
}

/// Retry budget and backoff range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Defaults to `2`.
    pub max_retries: u32,

    /// Lower bound of connectivity backoff jitter. Defaults to `200`.
    pub backoff_min_ms: u64,

    /// Upper bound (exclusive) of connectivity backoff jitter. Defaults to `1000`.
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 2, backoff_min_ms: 200, backoff_max_ms: 1_000 }
    }
}

/// Lenient fallback fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub user_agent: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: true, user_agent: DEFAULT_BROWSER_USER_AGENT.to_string() }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `COURIER__` prefix can override any configuration
    /// value, using `__` between nested fields (e.g. `COURIER__RETRY__MAX_RETRIES=5`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("throttle.min_interval_ms", 1500)?
            .set_default("throttle.max_tracked_hosts", 20)?
            .set_default("timeouts.short.connect_ms", 5_000)?
            .set_default("timeouts.short.read_ms", 7_000)?
            .set_default("timeouts.long.connect_ms", 5_000)?
            .set_default("timeouts.long.read_ms", 180_000)?
            .set_default("cache.in_memory", true)?
            .set_default("cache.renewal_window_ms", 3_600_000)?
            .set_default("cache.max_entries", 10_000)?
            .set_default("cache.overwrite", true)?
            .set_default("retry.max_retries", 2)?
            .set_default("retry.backoff_min_ms", 200)?
            .set_default("retry.backoff_max_ms", 1_000)?
            .set_default("fallback.enabled", true)?
            .set_default("fallback.user_agent", DEFAULT_BROWSER_USER_AGENT)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("COURIER").prefix_separator("__").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `COURIER_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("COURIER_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.throttle.max_tracked_hosts == 0 {
            return Err("Max tracked hosts must be greater than 0".to_string());
        }

        if self.cache.renewal_window_ms == 0 {
            return Err("Cache renewal window must be greater than 0".to_string());
        }

        if self.cache.max_entries == 0 {
            return Err("Cache max entries must be greater than 0".to_string());
        }

        if self.retry.backoff_min_ms > self.retry.backoff_max_ms {
            return Err(format!(
                "Retry backoff_min_ms ({}) must not exceed backoff_max_ms ({})",
                self.retry.backoff_min_ms, self.retry.backoff_max_ms
            ));
        }

        for (name, pair) in [("short", self.timeouts.short), ("long", self.timeouts.long)] {
            if pair.read_ms == 0 {
                return Err(format!("Read timeout of the {name} tier must be greater than 0"));
            }
            if pair.connect_ms == 0 {
                return Err(format!("Connect timeout of the {name} tier must be greater than 0"));
            }
        }

        if self.timeouts.short.read_ms > self.timeouts.long.read_ms {
            return Err("Short tier read timeout must not exceed the long tier".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
