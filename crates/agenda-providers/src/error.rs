//! Error types for authorization and calendar retrieval.
//!
//! Every failure is a [`ProviderError`] tagged with a [`ProviderErrorCode`].
//! The code decides how the caller recovers: a missing or corrupt credential
//! falls into the interactive flow, an authentication rejection triggers a
//! single re-authorization, everything else is fatal.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No credential is stored.
    CredentialNotFound,
    /// The stored credential does not deserialize.
    CredentialCorrupt,
    /// The provider reports the credential as invalid or revoked.
    AuthenticationRejected,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Server returned a non-authentication error status.
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// The interactive flow got no redirect before its deadline.
    CallbackNeverReceived,
    /// The interactive flow was cancelled.
    Cancelled,
    /// The system browser could not be launched.
    BrowserLaunchFailed,
    /// Reading or writing local storage failed.
    StorageError,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns a human-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialNotFound => "credential_not_found",
            Self::CredentialCorrupt => "credential_corrupt",
            Self::AuthenticationRejected => "authentication_rejected",
            Self::NetworkError => "network_error",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::CallbackNeverReceived => "callback_never_received",
            Self::Cancelled => "cancelled",
            Self::BrowserLaunchFailed => "browser_launch_failed",
            Self::StorageError => "storage_error",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by the credential store, the authorization flow or the
/// calendar session.
#[derive(Debug, Error)]
pub struct ProviderError {
    /// The error code categorizing this error.
    code: ProviderErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// The provider that generated this error (e.g., "google").
    provider: Option<String>,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates a credential-not-found error.
    pub fn credential_not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CredentialNotFound, message)
    }

    /// Creates a corrupt-credential error.
    pub fn credential_corrupt(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CredentialCorrupt, message)
    }

    /// Creates an authentication-rejected error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationRejected, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a callback timeout error.
    pub fn callback_never_received(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CallbackNeverReceived, message)
    }

    /// Creates a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Cancelled, message)
    }

    /// Creates a browser launch error.
    pub fn browser(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BrowserLaunchFailed, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::StorageError, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// True when no usable credential is stored.
    pub fn is_credential_missing(&self) -> bool {
        matches!(
            self.code,
            ProviderErrorCode::CredentialNotFound | ProviderErrorCode::CredentialCorrupt
        )
    }

    /// True when the provider rejected the credential.
    pub fn is_authentication_rejected(&self) -> bool {
        self.code == ProviderErrorCode::AuthenticationRejected
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        assert_eq!(
            ProviderErrorCode::AuthenticationRejected.as_str(),
            "authentication_rejected"
        );
        assert_eq!(
            ProviderErrorCode::CallbackNeverReceived.to_string(),
            "callback_never_received"
        );
    }

    #[test]
    fn provider_error_creation() {
        let err = ProviderError::authentication("token revoked");
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationRejected);
        assert_eq!(err.message(), "token revoked");
        assert!(err.provider().is_none());
        assert!(err.is_authentication_rejected());
        assert!(!err.is_credential_missing());
    }

    #[test]
    fn credential_missing_covers_not_found_and_corrupt() {
        assert!(ProviderError::credential_not_found("x").is_credential_missing());
        assert!(ProviderError::credential_corrupt("x").is_credential_missing());
        assert!(!ProviderError::storage("x").is_credential_missing());
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::network("connection reset").with_provider("google");
        let display = format!("{}", err);
        assert!(display.contains("[google]"));
        assert!(display.contains("network_error"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn provider_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ProviderError::storage("failed to write credential").with_source(io_err);
        assert!(err.source().is_some());
    }
}
