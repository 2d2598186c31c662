//! agenda CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use agenda_client::cli::{Cli, Command, ConfigAction};
use agenda_client::commands;
use agenda_client::config::ClientConfig;
use agenda_client::error::{ClientError, ClientResult};
use agenda_core::{TracingConfig, init_tracing};
use agenda_providers::ProviderError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", ClientError::from(e));
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let result = tokio::select! {
        result = run(cli, cancel.clone()) => result,
        () = cancel.cancelled() => Err(ProviderError::cancelled("interrupted").into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted");
            token.cancel();
        }
    });
}

async fn run(cli: Cli, cancel: CancellationToken) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    // Showing the path must not create the file.
    if let Some(Command::Config {
        action: ConfigAction::Path,
    }) = &cli.command
    {
        return commands::config::path(&config_path);
    }

    let day = cli.day();
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(secs) = cli.callback_timeout {
        config.auth.callback_timeout_secs = secs;
    }

    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        #[cfg(feature = "google")]
        Some(Command::Auth { force }) => commands::auth::run(&config, force, cancel).await,
        #[cfg(feature = "google")]
        None => commands::agenda::run(&config, day, cancel).await,
        #[cfg(not(feature = "google"))]
        _ => {
            let _ = (cancel, day);
            Err(ClientError::Config(
                "agenda was built without a calendar provider".to_string(),
            ))
        }
    }
}
