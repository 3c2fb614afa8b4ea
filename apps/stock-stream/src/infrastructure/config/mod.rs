//! Configuration Module
//!
//! Configuration loading for the stock stream service.

mod settings;

pub use settings::{AppConfig, ConfigError, FeedSettings, RetrySettings};
