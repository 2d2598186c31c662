//! OAuth 2.0 authorization-code flow for Google APIs.
//!
//! Implements the Authorization Code flow with PKCE (Proof Key for Code
//! Exchange) and a loopback redirect, as recommended for desktop
//! applications.
//!
//! # Flow Overview
//!
//! 1. Bind a local HTTP listener on an ephemeral port
//! 2. Build the consent URL with the PKCE challenge and the state token
//! 3. Open the user's browser to the consent page
//! 4. The user grants permission; Google redirects to the local listener
//! 5. Extract the authorization code from the redirect
//! 6. Exchange the code (with the verifier) for access and refresh tokens
//!
//! Each callback connection is served on its own task and the first
//! redirect wins. The wait in step 5 is bounded by a deadline and a
//! [`CancellationToken`]. The listener task, and every connection it is
//! still serving, is aborted whichever way the wait ends.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::credential::Credential;
use crate::error::{ProviderError, ProviderResult};

use super::config::AuthorizationConfig;

/// The state value sent with every consent request and expected back.
pub const STATE_TOKEN: &str = "state-token";

/// How long the interactive flow waits for the redirect by default.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for token endpoint requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Successful</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Failed</h1>\
    <p>You can close this window.</p></body></html>";

const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Talks to the OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: AuthorizationConfig,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if the configuration is invalid, `InternalError`
    /// if the HTTP client cannot be built.
    pub fn new(config: AuthorizationConfig, timeout: Duration) -> ProviderResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the authorization configuration.
    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    /// Exchanges an authorization code for a credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ProviderResult<Credential> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token = self.post_token(&params, "token exchange").await?;
        info!("successfully obtained tokens");
        Ok(Credential::new(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            token.token_type,
            Utc::now(),
        ))
    }

    /// Mints a new access token from `credential`'s refresh token.
    ///
    /// The returned credential keeps the old refresh token unless the
    /// endpoint rotated it.
    pub async fn refresh(&self, credential: &Credential) -> ProviderResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::authentication("credential has no refresh token"))?;

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.post_token(&params, "token refresh").await?;
        info!("successfully refreshed access token");
        Ok(credential.refreshed(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            Utc::now(),
        ))
    }

    async fn post_token(
        &self,
        params: &[(&str, &str)],
        operation: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", operation, e))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(token_endpoint_error(status, &body, operation));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_source(e)
        })
    }
}

/// Maps a failed token endpoint response to an error.
///
/// A rejected grant or client means the stored authorization is no longer
/// usable; anything else is a server problem.
fn token_endpoint_error(status: reqwest::StatusCode, body: &str, operation: &str) -> ProviderError {
    let parsed: Option<TokenErrorResponse> = serde_json::from_str(body).ok();
    let rejected = status == reqwest::StatusCode::UNAUTHORIZED
        || parsed.as_ref().is_some_and(|e| {
            matches!(
                e.error.as_str(),
                "invalid_grant" | "invalid_client" | "unauthorized_client"
            )
        });

    let detail = match parsed {
        Some(TokenErrorResponse {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Some(TokenErrorResponse { error, .. }) => error,
        None => body.to_string(),
    };
    let message = format!("{} failed ({}): {}", operation, status, detail);

    if rejected {
        ProviderError::authentication(message)
    } else {
        ProviderError::server(message)
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// The state sent with the consent request.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with a random verifier.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);

        Self {
            verifier,
            challenge,
            state: STATE_TOKEN.to_string(),
        }
    }

    /// Generates a cryptographically random code verifier.
    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the consent URL, requesting offline access.
    pub fn build_auth_url(&self, config: &AuthorizationConfig, redirect_uri: &str) -> String {
        let scope = config.scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            config.auth_endpoint,
            urlencoding::encode(&config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Error body from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Query parameters carried by the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CallbackParams {
    code: String,
    state: Option<String>,
}

/// A loopback HTTP listener waiting for the OAuth redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Binds to an ephemeral port on the loopback interface.
    pub async fn bind() -> ProviderResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            ProviderError::network("failed to bind loopback listener").with_source(e)
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::internal("listener has no local address").with_source(e))?
            .port();
        debug!("bound loopback listener on port {}", port);
        Ok(Self { listener, port })
    }

    /// The port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves requests until one carries the redirect, then returns its
    /// authorization code.
    ///
    /// # Errors
    ///
    /// - `CallbackNeverReceived` when `timeout` elapses first
    /// - `Cancelled` when `cancel` fires first
    /// - `AuthenticationRejected` when the redirect reports an error, lacks
    ///   a code, or carries the wrong state
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        let (tx, mut rx) = mpsc::channel(1);
        let listener = self.listener;

        let server = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(%peer, "callback connection");
                        let tx = tx.clone();
                        connections.spawn(async move {
                            if let Some(outcome) = handle_connection(stream).await {
                                let _ = tx.try_send(outcome);
                            }
                        });
                    }
                    Err(e) => {
                        let _ = tx.try_send(Err(ProviderError::network(
                            "failed to accept callback connection",
                        )
                        .with_source(e)));
                        return;
                    }
                }
                while connections.try_join_next().is_some() {}
            }
        });

        let outcome = tokio::select! {
            received = rx.recv() => received.unwrap_or_else(|| {
                Err(ProviderError::internal("callback listener stopped unexpectedly"))
            }),
            () = tokio::time::sleep(timeout) => Err(ProviderError::callback_never_received(
                format!("no authorization redirect within {}s", timeout.as_secs()),
            )),
            () = cancel.cancelled() => Err(ProviderError::cancelled("authorization cancelled")),
        };
        server.abort();

        let params = outcome?;
        match params.state.as_deref() {
            Some(state) if state == expected_state => Ok(params.code),
            _ => Err(ProviderError::authentication(
                "OAuth state mismatch in authorization redirect",
            )),
        }
    }
}

/// Serves one request. Returns `None` for requests that are not the
/// redirect (such as a favicon fetch).
async fn handle_connection(stream: TcpStream) -> Option<ProviderResult<CallbackParams>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.is_err() {
        return None;
    }

    // Drain headers so the browser sees a clean response.
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    let outcome = parse_request_line(&request_line);
    let page = match &outcome {
        None => NOT_FOUND,
        Some(Ok(_)) => SUCCESS_PAGE,
        Some(Err(_)) => FAILURE_PAGE,
    };

    let mut stream = reader.into_inner();
    if let Err(e) = stream.write_all(page.as_bytes()).await {
        warn!("failed to answer callback request: {}", e);
    }
    let _ = stream.shutdown().await;

    outcome
}

/// Parses `GET /?code=...&state=... HTTP/1.1`.
fn parse_request_line(request_line: &str) -> Option<ProviderResult<CallbackParams>> {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return None;
    };
    if target.starts_with("/favicon") {
        return None;
    }

    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    Some(match code.filter(|c| !c.is_empty()) {
        Some(code) => Ok(CallbackParams { code, state }),
        None => Err(ProviderError::authentication(
            "missing authorization code in callback",
        )),
    })
}
