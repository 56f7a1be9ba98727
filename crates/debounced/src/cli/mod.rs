//! Command-line interface for debounced.
//!
//! This module provides the CLI structure for the `debounced` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, EqualityArg, SimulateCommand, WatchCommand};

/// debounced - Settle rapidly changing input
///
/// Passes input through a debounced value: only a value that stays
/// unchanged for the whole quiet window comes out the other side.
#[derive(Debug, Parser)]
#[command(name = "debounced")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Debounce lines read from stdin, printing each settled value
    Watch(WatchCommand),

    /// Replay a timed script on a virtual clock and print the trace
    Simulate(SimulateCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
