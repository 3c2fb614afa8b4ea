//! Service Configuration Settings
//!
//! Configuration types for the stock stream service, loaded from environment
//! variables. Unparseable numbers fall back to their defaults; values that
//! parse but make no sense are errors.

use std::time::Duration;

use crate::domain::identity::Symbol;

/// Synthetic feed and symbol settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Symbols to load at startup.
    pub symbols: Vec<Symbol>,
    /// Interval between generated ticks.
    pub tick_interval: Duration,
    /// Delay between a feed attaching and the transport marking it loaded.
    pub snapshot_delay: Duration,
    /// Delay before the transport becomes available.
    pub connect_delay: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS
                .iter()
                .filter_map(|s| Symbol::parse(s).ok())
                .collect(),
            tick_interval: Duration::from_millis(250),
            snapshot_delay: Duration::from_millis(100),
            connect_delay: Duration::from_millis(500),
        }
    }
}

const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "MSFT"];

/// Load retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// First retry delay.
    pub initial_delay: Duration,
    /// Upper bound on the retry delay.
    pub max_delay: Duration,
    /// Backoff multiplier applied after each attempt.
    pub multiplier: f64,
    /// Maximum attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 0,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    /// Feed settings.
    pub feed: FeedSettings,
    /// Retry settings.
    pub retry: RetrySettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol list is empty or contains an invalid
    /// symbol, or if the retry multiplier is below 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let feed_defaults = FeedSettings::default();
        let retry_defaults = RetrySettings::default();

        let symbols = match lookup("STOCK_STREAM_SYMBOLS") {
            Some(list) => parse_symbols("STOCK_STREAM_SYMBOLS", &list)?,
            None => feed_defaults.symbols,
        };

        let feed = FeedSettings {
            symbols,
            tick_interval: parse_duration_millis(
                &lookup,
                "STOCK_STREAM_TICK_INTERVAL_MS",
                feed_defaults.tick_interval,
            ),
            snapshot_delay: parse_duration_millis(
                &lookup,
                "STOCK_STREAM_SNAPSHOT_DELAY_MS",
                feed_defaults.snapshot_delay,
            ),
            connect_delay: parse_duration_millis(
                &lookup,
                "STOCK_STREAM_CONNECT_DELAY_MS",
                feed_defaults.connect_delay,
            ),
        };

        let multiplier = parse_or(
            &lookup,
            "STOCK_STREAM_RETRY_MULTIPLIER",
            retry_defaults.multiplier,
        );
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "STOCK_STREAM_RETRY_MULTIPLIER".to_string(),
                value: multiplier.to_string(),
            });
        }

        let retry = RetrySettings {
            initial_delay: parse_duration_millis(
                &lookup,
                "STOCK_STREAM_RETRY_INITIAL_MS",
                retry_defaults.initial_delay,
            ),
            max_delay: parse_duration_secs(
                &lookup,
                "STOCK_STREAM_RETRY_MAX_SECS",
                retry_defaults.max_delay,
            ),
            multiplier,
            max_attempts: parse_or(
                &lookup,
                "STOCK_STREAM_RETRY_MAX_ATTEMPTS",
                retry_defaults.max_attempts,
            ),
        };

        Ok(Self { feed, retry })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable parsed but is out of range.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Symbol list entry is not a valid symbol.
    #[error("invalid symbol {symbol:?} in {key}: {reason}")]
    InvalidSymbol {
        /// Variable name.
        key: String,
        /// Offending entry.
        symbol: String,
        /// Why it was rejected.
        reason: String,
    },
}

fn parse_symbols(key: &str, list: &str) -> Result<Vec<Symbol>, ConfigError> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let symbol = Symbol::parse(entry).map_err(|e| ConfigError::InvalidSymbol {
            key: key.to_string(),
            symbol: entry.to_string(),
            reason: e.to_string(),
        })?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    if symbols.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(symbols)
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

// =============================================================================
// Tests
// =============================================================================
