//! Command-line interface for squares.
//!
//! This module provides the CLI structure for the `squares` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ListCommand, RunCommand};

/// squares - Manage a collection of squares from the terminal
///
/// Starts an interactive menu for listing, adding, updating and deleting
/// squares. An empty collection is seeded with three sample squares.
#[derive(Debug, Parser)]
#[command(name = "squares")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database file to use instead of the configured one
    #[arg(short, long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The command to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the interactive session
    Run(RunCommand),

    /// Print every square and exit
    List(ListCommand),

    /// Insert the sample squares if the collection is empty
    Seed,

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                2 => crate::logging::Verbosity::Debug,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }

    /// The command to run, `run` with defaults when none was given.
    #[must_use]
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunCommand::default()))
    }

    /// Fold command-line overrides into a loaded configuration.
    pub fn apply_overrides(&self, config: &mut crate::Config) {
        if let Some(path) = &self.database {
            config.storage.database_path = Some(path.clone());
        }
        if self.no_color {
            config.ui.color = false;
        }
        if let Some(Command::Run(RunCommand { no_seed: true })) = &self.command {
            config.session.seed_on_empty = false;
        }
    }
}
