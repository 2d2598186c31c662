//! Logging setup for the agenda binary.
//!
//! Logs always go to stderr so stdout carries nothing but the rendered
//! agenda. `RUST_LOG` takes precedence over the configured level.
//!
//! ```ignore
//! use agenda_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli_debug())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Which events reach stderr and how much context they carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level used for the agenda crates when `RUST_LOG` is unset.
    pub default_level: Level,
    /// Prefix each line with its module path, file and line.
    pub include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Debug output with source locations, for `--debug`.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_location: true,
        }
    }

    /// Filter directive applied when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> String {
        format!("agenda={}", self.default_level)
    }
}

/// Installs a compact stderr subscriber for `config`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let layer = fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_location);

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
