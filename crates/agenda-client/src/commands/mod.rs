//! Command runners.

pub mod agenda;
#[cfg(feature = "google")]
pub mod auth;
pub mod config;

#[cfg(feature = "google")]
use agenda_providers::google::AuthorizationFlow;
#[cfg(feature = "google")]
use tokio_util::sync::CancellationToken;

#[cfg(feature = "google")]
use crate::config::ClientConfig;
#[cfg(feature = "google")]
use crate::error::ClientResult;

/// Builds the authorization flow described by `config`.
#[cfg(feature = "google")]
pub(crate) fn authorization_flow(
    config: &ClientConfig,
    cancel: CancellationToken,
) -> ClientResult<AuthorizationFlow> {
    let locations = config.storage_locations();
    let flow = AuthorizationFlow::from_locations(&locations, config.http_timeout())?
        .with_callback_timeout(config.callback_timeout())
        .with_cancellation(cancel);
    Ok(flow)
}

#[cfg(all(test, feature = "google"))]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use agenda_providers::ProviderErrorCode;

    #[test]
    fn missing_client_secret_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.auth.client_secret_path = Some(dir.path().join("credentials.json"));
        config.auth.token_path = Some(dir.path().join("token.json"));

        let err = authorization_flow(&config, CancellationToken::new()).unwrap_err();
        match err {
            ClientError::Provider(e) => {
                assert_eq!(e.code(), ProviderErrorCode::ConfigurationError)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn flow_uses_configured_token_path() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("credentials.json");
        std::fs::write(
            &secret,
            r#"{"installed":{"client_id":"id","client_secret":"secret"}}"#,
        )
        .unwrap();

        let mut config = ClientConfig::default();
        config.auth.client_secret_path = Some(secret);
        config.auth.token_path = Some(dir.path().join("token.json"));

        let flow = authorization_flow(&config, CancellationToken::new()).unwrap();
        assert_eq!(flow.store().path(), dir.path().join("token.json"));
    }
}
