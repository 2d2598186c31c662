//! Credential acquisition: stored, refreshed or interactively authorized.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credential::{Credential, CredentialStore, StorageLocations};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Authorizer, BoxFuture};

use super::config::AuthorizationConfig;
use super::oauth::{CallbackListener, DEFAULT_CALLBACK_TIMEOUT, OAuthClient, PkceFlow};

/// Opens the consent URL for the user.
pub trait Browser: Send + Sync {
    /// Opens `url`.
    ///
    /// # Errors
    ///
    /// `BrowserLaunchFailed` if no browser could be started.
    fn open(&self, url: &str) -> ProviderResult<()>;
}

/// Launches the desktop's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> ProviderResult<()> {
        open::that(url).map_err(|e| {
            ProviderError::browser(format!("failed to open browser: {}", e)).with_source(e)
        })
    }
}

/// Produces credentials for the calendar session.
///
/// Reuses the stored credential while it is valid, refreshes it silently
/// when it has expired, and falls back to the browser consent flow when
/// nothing usable is stored or the refresh token has been revoked.
pub struct AuthorizationFlow {
    oauth: OAuthClient,
    store: CredentialStore,
    browser: Arc<dyn Browser>,
    callback_timeout: Duration,
    cancel: CancellationToken,
    /// Serializes interactive flows.
    interactive: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("store", &self.store)
            .field("callback_timeout", &self.callback_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlow {
    /// Creates a flow that stores credentials in `store`.
    pub fn new(
        config: AuthorizationConfig,
        store: CredentialStore,
        http_timeout: Duration,
    ) -> ProviderResult<Self> {
        Ok(Self {
            oauth: OAuthClient::new(config, http_timeout)?,
            store,
            browser: Arc::new(SystemBrowser),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            cancel: CancellationToken::new(),
            interactive: tokio::sync::Mutex::new(()),
        })
    }

    /// Loads the client-secret descriptor and credential path from
    /// `locations`.
    pub fn from_locations(
        locations: &StorageLocations,
        http_timeout: Duration,
    ) -> ProviderResult<Self> {
        let config = AuthorizationConfig::from_locations(locations)?;
        Self::new(config, CredentialStore::from_locations(locations), http_timeout)
    }

    /// Builder method to replace the browser launcher.
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = browser;
        self
    }

    /// Builder method to bound the wait for the redirect.
    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Builder method to cancel pending interactive flows with `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Runs the browser consent flow and persists the resulting credential.
    ///
    /// # Errors
    ///
    /// - `CallbackNeverReceived` if the redirect does not arrive in time
    /// - `Cancelled` if the cancellation token fires
    /// - `AuthenticationRejected` if consent is denied or the code exchange
    ///   is refused
    pub async fn run_interactive(&self) -> ProviderResult<Credential> {
        let _guard = self.interactive.lock().await;

        let listener = CallbackListener::bind().await?;
        let config = self.oauth.config().bind_redirect(listener.port());
        let redirect_uri = config.redirect_url()?.to_string();
        let pkce = PkceFlow::new();
        let auth_url = pkce.build_auth_url(&config, &redirect_uri);

        info!("starting OAuth flow, opening browser...");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = self.browser.open(&auth_url) {
            warn!("{}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let code = listener
            .wait_for_code(&pkce.state, self.callback_timeout, &self.cancel)
            .await?;

        info!("received authorization code, exchanging for tokens...");
        let credential = self
            .oauth
            .exchange_code(&code, &pkce.verifier, &redirect_uri)
            .await?;
        self.store.save(&credential)?;
        Ok(credential)
    }

    async fn refresh_and_store(&self, credential: &Credential) -> ProviderResult<Credential> {
        let refreshed = self.oauth.refresh(credential).await?;
        self.store.save(&refreshed)?;
        Ok(refreshed)
    }

    async fn load_or_authorize(&self) -> ProviderResult<Credential> {
        let stored = match self.store.load() {
            Ok(credential) => credential,
            Err(e) if e.is_credential_missing() => {
                info!("no usable stored credential ({}), authorizing", e.message());
                return self.run_interactive().await;
            }
            Err(e) => return Err(e),
        };

        if !stored.is_expired() {
            debug!("using stored credential");
            return Ok(stored);
        }

        if !stored.can_refresh() {
            info!("stored credential expired and cannot be refreshed, authorizing");
            return self.run_interactive().await;
        }

        match self.refresh_and_store(&stored).await {
            Ok(credential) => Ok(credential),
            Err(e) if e.is_authentication_rejected() => {
                warn!("refresh rejected ({}), authorizing again", e.message());
                self.store.delete()?;
                self.run_interactive().await
            }
            Err(e) => Err(e),
        }
    }
}

impl Authorizer for AuthorizationFlow {
    fn obtain(&self) -> BoxFuture<'_, ProviderResult<Credential>> {
        Box::pin(self.load_or_authorize())
    }

    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.refresh_and_store(credential))
    }

    fn reauthorize(&self) -> BoxFuture<'_, ProviderResult<Credential>> {
        Box::pin(async move {
            self.store.delete()?;
            self.run_interactive().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Plays the user: follows the consent URL's redirect with a code.
    struct ConsentingBrowser {
        opened: AtomicUsize,
        code: &'static str,
    }

    impl ConsentingBrowser {
        fn new(code: &'static str) -> Arc<Self> {
            Arc::new(Self {
                opened: AtomicUsize::new(0),
                code,
            })
        }
    }

    impl Browser for ConsentingBrowser {
        fn open(&self, url: &str) -> ProviderResult<()> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let consent = Url::parse(url).unwrap();
            let query = |name: &str| {
                consent
                    .query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
                    .unwrap()
            };
            let redirect = query("redirect_uri").replace("localhost", "127.0.0.1");
            let target = format!("{}/?code={}&state={}", redirect, self.code, query("state"));
            tokio::spawn(async move {
                let _ = reqwest::get(target).await;
            });
            Ok(())
        }
    }

    /// A browser that only records the URLs it was asked to open.
    #[derive(Debug, Default)]
    struct RecordingBrowser {
        opened: Mutex<Vec<String>>,
    }

    impl RecordingBrowser {
        /// URLs opened so far.
        fn opened(&self) -> Vec<String> {
            self.opened
                .lock()
                .map(|urls| urls.clone())
                .unwrap_or_default()
        }
    }

    impl Browser for RecordingBrowser {
        fn open(&self, url: &str) -> ProviderResult<()> {
            if let Ok(mut urls) = self.opened.lock() {
                urls.push(url.to_string());
            }
            Ok(())
        }
    }

    struct BrokenBrowser;

    impl Browser for BrokenBrowser {
        fn open(&self, _url: &str) -> ProviderResult<()> {
            Err(ProviderError::browser("no display"))
        }
    }

    fn stored(access: &str, expires_in: i64) -> Credential {
        Credential::new(
            access,
            Some("stored-refresh".to_string()),
            Some(expires_in),
            None,
            Utc::now(),
        )
    }

    async fn token_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=granted"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "interactive-access",
                "refresh_token": "interactive-refresh",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        server
    }

    fn flow(server: &MockServer, dir: &tempfile::TempDir) -> AuthorizationFlow {
        let config = AuthorizationConfig::new("client", "secret").with_endpoints(
            format!("{}/auth", server.uri()),
            format!("{}/token", server.uri()),
        );
        let store = CredentialStore::new(dir.path().join("token.json"));
        AuthorizationFlow::new(config, store, Duration::from_secs(5))
            .unwrap()
            .with_callback_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn fresh_stored_credential_is_used_as_is() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(RecordingBrowser::default());
        let flow = flow(&server, &dir).with_browser(browser.clone());
        flow.store().save(&stored("stored-access", 3600)).unwrap();

        let credential = flow.obtain().await.unwrap();
        assert_eq!(credential.access_token, "stored-access");
        assert!(browser.opened().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_runs_interactive_flow() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let browser = ConsentingBrowser::new("granted");
        let flow = flow(&server, &dir).with_browser(browser.clone());

        let credential = flow.obtain().await.unwrap();
        assert_eq!(credential.access_token, "interactive-access");
        assert_eq!(browser.opened.load(Ordering::SeqCst), 1);
        assert_eq!(flow.store().load().unwrap(), credential);
    }

    #[tokio::test]
    async fn corrupt_credential_runs_interactive_flow() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&server, &dir).with_browser(ConsentingBrowser::new("granted"));
        std::fs::write(flow.store().path(), "garbage").unwrap();

        let credential = flow.obtain().await.unwrap();
        assert_eq!(credential.access_token, "interactive-access");
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_and_persisted() {
        let server = token_server().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "refreshed-access",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(RecordingBrowser::default());
        let flow = flow(&server, &dir).with_browser(browser.clone());
        flow.store().save(&stored("expired-access", 0)).unwrap();

        let credential = flow.obtain().await.unwrap();
        assert_eq!(credential.access_token, "refreshed-access");
        assert_eq!(credential.refresh_token.as_deref(), Some("stored-refresh"));
        assert_eq!(flow.store().load().unwrap(), credential);
        assert!(browser.opened().is_empty());
    }

    #[tokio::test]
    async fn revoked_refresh_token_falls_back_to_interactive_flow() {
        let server = token_server().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&server, &dir).with_browser(ConsentingBrowser::new("granted"));
        flow.store().save(&stored("expired-access", 0)).unwrap();

        let credential = flow.obtain().await.unwrap();
        assert_eq!(credential.access_token, "interactive-access");
        assert_eq!(
            flow.store().load().unwrap().refresh_token.as_deref(),
            Some("interactive-refresh")
        );
    }

    #[tokio::test]
    async fn refresh_server_error_is_not_masked() {
        let server = token_server().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(RecordingBrowser::default());
        let flow = flow(&server, &dir).with_browser(browser.clone());
        flow.store().save(&stored("expired-access", 0)).unwrap();

        let err = flow.obtain().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(browser.opened().is_empty());
        assert!(flow.store().load().is_ok());
    }

    #[tokio::test]
    async fn reauthorize_replaces_stored_credential() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&server, &dir).with_browser(ConsentingBrowser::new("granted"));
        flow.store().save(&stored("revoked-access", 3600)).unwrap();

        let credential = flow.reauthorize().await.unwrap();
        assert_eq!(credential.access_token, "interactive-access");
        assert_eq!(flow.store().load().unwrap().access_token, "interactive-access");
    }

    #[tokio::test]
    async fn browser_failure_is_not_fatal() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let flow = flow(&server, &dir)
            .with_browser(Arc::new(BrokenBrowser))
            .with_callback_timeout(Duration::from_millis(100));

        let err = flow.run_interactive().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::CallbackNeverReceived);
        assert!(flow.store().load().unwrap_err().is_credential_missing());
    }

    #[tokio::test]
    async fn cancelled_flow_stores_nothing() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let flow = flow(&server, &dir)
            .with_browser(Arc::new(RecordingBrowser::default()))
            .with_cancellation(token.clone());
        token.cancel();

        let err = flow.obtain().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Cancelled);
        assert!(flow.store().load().unwrap_err().is_credential_missing());
    }

    #[tokio::test]
    async fn consent_url_targets_configured_endpoint() {
        let server = token_server().await;
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(RecordingBrowser::default());
        let flow = flow(&server, &dir)
            .with_browser(browser.clone())
            .with_callback_timeout(Duration::from_millis(50));

        let _ = flow.run_interactive().await;
        let opened = browser.opened();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with(&format!("{}/auth?", server.uri())));
        assert!(opened[0].contains("redirect_uri=http%3A%2F%2Flocalhost%3A"));
    }
}
