//! OAuth client configuration for Google APIs.

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::credential::StorageLocations;
use crate::error::{ProviderError, ProviderResult};

/// Google OAuth endpoints.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only access to the user's calendars.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Structure of Google's client-secret JSON file.
///
/// Supports multiple formats:
/// 1. Google Cloud Console format with "installed" or "web" section
/// 2. Flat format with client_id and client_secret at root level (e.g., from gcloud)
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

/// OAuth client data within a nested section of the client-secret file.
#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Everything needed to run the OAuth 2.0 authorization-code flow.
///
/// Immutable once loaded, except for the redirect URL, which is rebound to
/// the loopback listener's port for each interactive flow via
/// [`AuthorizationConfig::bind_redirect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Where the user grants consent.
    pub auth_endpoint: String,
    /// Where codes and refresh tokens are exchanged.
    pub token_endpoint: String,
    /// Scopes to request.
    pub scopes: Vec<String>,
    /// The redirect URL of the current flow, if one is running.
    pub redirect_url: Option<String>,
}

impl AuthorizationConfig {
    /// Creates a configuration for Google's endpoints with read-only
    /// calendar scope.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_endpoint: GOOGLE_AUTH_URL.to_string(),
            token_endpoint: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
            redirect_url: None,
        }
    }

    /// Loads the client-secret descriptor named by `locations`.
    pub fn from_locations(locations: &StorageLocations) -> ProviderResult<Self> {
        Self::from_file(&locations.client_secret_path)
    }

    /// Loads a client-secret descriptor from a file.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if the file is missing, unreadable or malformed.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            let message = if e.kind() == ErrorKind::NotFound {
                format!(
                    "client secret file not found at {} (download it from the Google Cloud Console)",
                    path.display()
                )
            } else {
                format!("failed to read client secret file {}", path.display())
            };
            ProviderError::configuration(message).with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses a client-secret descriptor.
    ///
    /// Supports multiple formats:
    /// 1. Google Cloud Console format: `{"installed": {"client_id": "...", "client_secret": "..."}}`
    /// 2. Flat format: `{"client_id": "...", "client_secret": "..."}`
    ///
    /// `auth_uri` and `token_uri` in a nested section override the default
    /// endpoints.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration("failed to parse client secret JSON").with_source(e)
        })?;

        if let Some(section) = file.installed.or(file.web) {
            let mut config = Self::new(section.client_id, section.client_secret);
            if let Some(auth_uri) = section.auth_uri {
                config.auth_endpoint = auth_uri;
            }
            if let Some(token_uri) = section.token_uri {
                config.token_endpoint = token_uri;
            }
            return Ok(config);
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(ProviderError::configuration(
            "client secret file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    /// Sets the OAuth endpoints.
    pub fn with_endpoints(
        mut self,
        auth_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        self.auth_endpoint = auth_endpoint.into();
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Returns a copy whose redirect URL points at `http://localhost:<port>`.
    #[must_use]
    pub fn bind_redirect(&self, port: u16) -> Self {
        Self {
            redirect_url: Some(format!("http://localhost:{}", port)),
            ..self.clone()
        }
    }

    /// The redirect URL of the current flow.
    pub fn redirect_url(&self) -> ProviderResult<&str> {
        self.redirect_url
            .as_deref()
            .ok_or_else(|| ProviderError::internal("redirect URL is not bound to a listener"))
    }

    /// Validates that the configuration is usable.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        for (name, endpoint) in [
            ("auth endpoint", &self.auth_endpoint),
            ("token endpoint", &self.token_endpoint),
        ] {
            Url::parse(endpoint).map_err(|e| {
                ProviderError::configuration(format!("invalid {}: {}", name, endpoint))
                    .with_source(e)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn defaults_to_google() {
        let config = AuthorizationConfig::new("id", "secret");
        assert_eq!(config.auth_endpoint, GOOGLE_AUTH_URL);
        assert_eq!(config.token_endpoint, GOOGLE_TOKEN_URL);
        assert_eq!(config.scopes, vec![CALENDAR_READONLY_SCOPE.to_string()]);
        assert!(config.redirect_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_json_installed_with_endpoints() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "project_id": "my-project",
                "auth_uri": "https://example.com/auth",
                "token_uri": "https://example.com/token",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let config = AuthorizationConfig::from_json(json).unwrap();
        assert_eq!(config.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(config.client_secret, "test-secret");
        assert_eq!(config.auth_endpoint, "https://example.com/auth");
        assert_eq!(config.token_endpoint, "https://example.com/token");
    }

    #[test]
    fn from_json_web() {
        let json = r#"{
            "web": {
                "client_id": "web-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let config = AuthorizationConfig::from_json(json).unwrap();
        assert_eq!(config.client_id, "web-id.apps.googleusercontent.com");
        assert_eq!(config.token_endpoint, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn from_json_flat() {
        let json = r#"{
            "client_id": "flat-id.apps.googleusercontent.com",
            "client_secret": "flat-secret",
            "refresh_token": "ignored"
        }"#;

        let config = AuthorizationConfig::from_json(json).unwrap();
        assert_eq!(config.client_id, "flat-id.apps.googleusercontent.com");
        assert_eq!(config.client_secret, "flat-secret");
    }

    #[test]
    fn from_json_invalid() {
        let err = AuthorizationConfig::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert!(err.message().contains("client_id"));

        let err = AuthorizationConfig::from_json("not json").unwrap_err();
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let locations = StorageLocations::in_dir(dir.path());
        let err = AuthorizationConfig::from_locations(&locations).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert!(err.message().contains("not found"));
    }

    #[test]
    fn bind_redirect_leaves_original_untouched() {
        let config = AuthorizationConfig::new("id", "secret");
        let bound = config.bind_redirect(49152);
        assert_eq!(bound.redirect_url().unwrap(), "http://localhost:49152");
        assert!(config.redirect_url().is_err());
        assert_eq!(bound.client_id, config.client_id);
    }

    #[test]
    fn validation() {
        assert!(AuthorizationConfig::new("", "secret").validate().is_err());
        assert!(AuthorizationConfig::new("id", "").validate().is_err());
        assert!(
            AuthorizationConfig::new("id", "secret")
                .with_scopes(vec![])
                .validate()
                .is_err()
        );
        assert!(
            AuthorizationConfig::new("id", "secret")
                .with_endpoints("not a url", GOOGLE_TOKEN_URL)
                .validate()
                .is_err()
        );
    }
}
