//! Configuration management for debounced.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::delay::Delay;
use crate::equality::EqualityMode;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "debounced";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "DEBOUNCED_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DEBOUNCED_`, sections separated
///    by `__`, e.g. `DEBOUNCED_DEBOUNCE__DELAY_MS=150`)
/// 2. TOML config file at `~/.config/debounced/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debounce behavior.
    pub debounce: DebounceConfig,
    /// Timer facility configuration.
    pub scheduler: SchedulerConfig,
    /// Line input handling.
    pub input: InputConfig,
}

/// Debounce-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet window in milliseconds. Must not be negative.
    pub delay_ms: i64,
    /// How repeated values are detected.
    pub equality: EqualityMode,
}

/// Scheduler-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of simultaneously armed timers.
    /// Unset means unlimited. A debounced value holds at most one.
    pub max_pending_timers: Option<usize>,
}

/// Input-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Strip surrounding whitespace from each input line.
    pub trim: bool,
    /// Ignore lines that are empty (after trimming).
    pub skip_empty: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            equality: EqualityMode::Value,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            trim: true,
            skip_empty: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.debounce.delay_ms < 0 {
            return Err(Error::config_validation(format!(
                "delay_ms must be non-negative, got {}",
                self.debounce.delay_ms
            )));
        }

        if self.scheduler.max_pending_timers == Some(0) {
            return Err(Error::config_validation(
                "max_pending_timers must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Get the configured quiet window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `delay_ms` is negative.
    pub fn delay(&self) -> Result<Delay> {
        Delay::try_from(self.debounce.delay_ms)
    }
}
