//! Command-line interface definition.

use std::path::PathBuf;

use agenda_core::AgendaDay;
use clap::{Parser, Subcommand};

/// agenda - Today's calendar as a markdown checklist
#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "AGENDA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Show tomorrow's agenda instead of the rest of today
    #[arg(long, short)]
    pub tomorrow: bool,

    /// Seconds to wait for the browser authorization redirect
    #[arg(long, value_name = "SECS")]
    pub callback_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the day selected on the command line.
    pub fn day(&self) -> AgendaDay {
        if self.tomorrow {
            AgendaDay::Tomorrow
        } else {
            AgendaDay::Today
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize access to the calendar and store the credential
    Auth {
        /// Discard the stored credential and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
