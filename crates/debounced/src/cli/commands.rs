//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::equality::EqualityMode;

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Quiet window in milliseconds (overrides configuration)
    #[arg(short, long, allow_negative_numbers = true)]
    pub delay_ms: Option<i64>,

    /// Equality policy for repeated lines (overrides configuration)
    #[arg(short, long, value_enum)]
    pub equality: Option<EqualityArg>,

    /// Output settled values as JSON lines
    #[arg(short, long)]
    pub json: bool,
}

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Script of timed steps, e.g. "0:ab 100:abc 150:~500 900:!dispose"
    pub script: String,

    /// Initial quiet window in milliseconds (overrides configuration)
    #[arg(short, long, allow_negative_numbers = true)]
    pub delay_ms: Option<i64>,

    /// Equality policy for repeated values (overrides configuration)
    #[arg(short, long, value_enum)]
    pub equality: Option<EqualityArg>,

    /// Stop at this virtual time (ms) instead of running until idle
    #[arg(short, long)]
    pub until: Option<u64>,

    /// Output the trace as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Equality policy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EqualityArg {
    /// Skip values equal to the current one
    Value,
    /// Treat every value as new
    AlwaysDistinct,
}

impl From<EqualityArg> for EqualityMode {
    fn from(arg: EqualityArg) -> Self {
        match arg {
            EqualityArg::Value => Self::Value,
            EqualityArg::AlwaysDistinct => Self::AlwaysDistinct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_arg_conversion() {
        assert_eq!(EqualityMode::from(EqualityArg::Value), EqualityMode::Value);
        assert_eq!(
            EqualityMode::from(EqualityArg::AlwaysDistinct),
            EqualityMode::AlwaysDistinct
        );
    }

    #[test]
    fn test_watch_command_debug() {
        let cmd = WatchCommand {
            delay_ms: Some(150),
            equality: None,
            json: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("delay_ms"));
        assert!(debug_str.contains("150"));
    }

    #[test]
    fn test_simulate_command_debug() {
        let cmd = SimulateCommand {
            script: "0:a".to_string(),
            delay_ms: None,
            equality: Some(EqualityArg::AlwaysDistinct),
            until: Some(1_000),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("0:a"));
        assert!(debug_str.contains("AlwaysDistinct"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
