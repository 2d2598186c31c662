//! Client error types.

use agenda_core::{RenderError, TracingError};
use agenda_providers::ProviderError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Authorization or retrieval failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An event could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialized.
    #[error(transparent)]
    Tracing(#[from] TracingError),
}
