//! OAuth credential persistence.
//!
//! A [`Credential`] is the token set obtained from the provider's token
//! endpoint. [`CredentialStore`] keeps exactly one of them on disk as JSON,
//! readable by the owner only. Every save overwrites: the file always holds
//! the most recently exchanged or refreshed credential.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Margin subtracted from `expires_in` so tokens are refreshed before the
/// provider starts rejecting them.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Where the client-secret descriptor and the credential live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocations {
    /// The OAuth client-secret descriptor (read-only input).
    pub client_secret_path: PathBuf,
    /// The persisted credential.
    pub token_path: PathBuf,
}

impl StorageLocations {
    /// Creates storage locations from explicit paths.
    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
        }
    }

    /// Places both files inside `dir` (`credentials.json`, `token.json`).
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("credentials.json"), dir.join("token.json"))
    }

    /// Per-user defaults: the descriptor under the config directory and the
    /// credential under the data directory.
    pub fn default_for_user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda");
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda");
        Self::new(
            config_dir.join("credentials.json"),
            data_dir.join("token.json"),
        )
    }
}

impl Default for StorageLocations {
    fn default() -> Self {
        Self::default_for_user()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// An OAuth 2.0 access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for minting new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires. `None` means it does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// The token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl Credential {
    /// Creates a credential from token endpoint data, received at `now`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        token_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry: expires_in_secs.map(|secs| expiry_from(now, secs)),
            token_type: token_type.unwrap_or_else(default_token_type),
        }
    }

    /// Returns true if the access token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }

    /// Returns true if the access token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the credential can be refreshed without interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns the refreshed credential.
    ///
    /// Providers usually omit the refresh token from refresh responses; the
    /// existing one is carried over in that case.
    #[must_use]
    pub fn refreshed(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            expiry: expires_in_secs.map(|secs| expiry_from(now, secs)),
            token_type: self.token_type.clone(),
        }
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_SKEW_SECS)
}

/// File-backed store for a single [`Credential`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    /// Path to the credential file.
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the credential path of `locations`.
    pub fn from_locations(locations: &StorageLocations) -> Self {
        Self::new(&locations.token_path)
    }

    /// Returns the credential file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored credential.
    ///
    /// # Errors
    ///
    /// `CredentialNotFound` if there is no file, `CredentialCorrupt` if it
    /// does not parse, `StorageError` for any other read failure.
    pub fn load(&self) -> ProviderResult<Credential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no credential file at {:?}", self.path);
                return Err(ProviderError::credential_not_found(format!(
                    "no credential at {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(ProviderError::storage(format!(
                    "failed to read credential file {}",
                    self.path.display()
                ))
                .with_source(e));
            }
        };

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            ProviderError::credential_corrupt(format!(
                "failed to parse credential file {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        debug!("loaded credential from {:?}", self.path);
        Ok(credential)
    }

    /// Writes `credential`, replacing whatever was stored.
    ///
    /// The file is written owner-only (0600) to a temporary sibling and
    /// renamed into place.
    pub fn save(&self, credential: &Credential) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::storage(format!(
                    "failed to create credential directory {}",
                    parent.display()
                ))
                .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(credential).map_err(|e| {
            ProviderError::internal("failed to serialize credential").with_source(e)
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            ProviderError::storage(format!(
                "failed to write credential file {}",
                temp_path.display()
            ))
            .with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::storage(format!(
                "failed to move credential into {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        info!("saved credential to {:?}", self.path);
        Ok(())
    }

    /// Removes the stored credential. An absent file counts as success.
    pub fn delete(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("removed credential at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("credential at {:?} already absent", self.path);
                Ok(())
            }
            Err(e) => Err(ProviderError::storage(format!(
                "failed to remove credential file {}",
                self.path.display()
            ))
            .with_source(e)),
        }
    }
}

/// Create-or-truncate `path` with owner-only permissions and write `data`.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // `mode` only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(data)?;
    file.sync_all()
}
