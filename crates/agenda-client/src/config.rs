//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/agenda/config.toml` by default. When that file does not exist
//! it is created with the defaults on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agenda_core::{MEET_INVITATION_MARKER, RenderOptions};
use agenda_providers::{MAX_PAGE_SIZE, QueryPolicy, StorageLocations};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClientError, ClientResult};

/// Configuration for the agenda client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Calendars to query, in display order.
    pub calendar_ids: Vec<String>,

    /// Events whose summary contains any of these substrings are hidden.
    pub exclude: Vec<String>,

    /// Descriptions containing any of these markers are cut to their first
    /// line.
    pub trim_markers: Vec<String>,

    /// Query window settings.
    pub window: WindowSettings,

    /// Authorization settings.
    pub auth: AuthSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            calendar_ids: vec!["primary".to_string()],
            exclude: Vec::new(),
            trim_markers: vec![MEET_INVITATION_MARKER.to_string()],
            window: WindowSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

/// Query window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Leave the window open-ended instead of stopping at midnight.
    pub open_ended: bool,

    /// Events requested per calendar.
    pub page_size: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            open_ended: false,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Authorization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// OAuth client-secret descriptor downloaded from the Google Cloud
    /// Console.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_path: Option<PathBuf>,

    /// Where the credential is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// Seconds to wait for the browser redirect.
    pub callback_timeout_secs: u64,

    /// Timeout for each HTTP request, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            client_secret_path: None,
            token_path: None,
            callback_timeout_secs: 300,
            http_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration from `explicit`, or from the default path,
    /// creating the default file if it does not exist yet.
    pub fn load(explicit: Option<&Path>) -> ClientResult<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load_or_create(&Self::default_path()),
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, writing the defaults there first if
    /// the file is absent.
    pub fn load_or_create(path: &Path) -> ClientResult<Self> {
        if !path.exists() {
            Self::default().save(path)?;
            info!("wrote default configuration to {:?}", path);
        }
        Self::load_from(path)
    }

    /// Writes this configuration to `path`.
    pub fn save(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, format!("# agenda configuration\n\n{}", content))?;
        Ok(())
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> ClientResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Checks settings that cannot be defaulted.
    pub fn validate(&self) -> ClientResult<()> {
        if self.calendar_ids.is_empty() {
            return Err(ClientError::Config(
                "calendar_ids must list at least one calendar".to_string(),
            ));
        }
        if self.calendar_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ClientError::Config(
                "calendar_ids must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Where the client-secret descriptor and credential live.
    pub fn storage_locations(&self) -> StorageLocations {
        let defaults = StorageLocations::default_for_user();
        StorageLocations::new(
            self.auth
                .client_secret_path
                .clone()
                .unwrap_or(defaults.client_secret_path),
            self.auth.token_path.clone().unwrap_or(defaults.token_path),
        )
    }

    /// Rendering rules derived from `exclude` and `trim_markers`.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::default()
            .with_exclusions(self.exclude.clone())
            .with_trim_markers(self.trim_markers.clone())
    }

    /// How query windows are sent to the provider.
    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy::default()
            .with_open_ended(self.window.open_ended)
            .with_page_size(self.window.page_size)
    }

    /// How long the interactive flow waits for the redirect.
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.callback_timeout_secs)
    }

    /// Per-request HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.http_timeout_secs)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
    }
}
