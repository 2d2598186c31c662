//! Authentication commands.

use agenda_providers::Authorizer;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Makes sure a usable credential is stored.
///
/// Reuses or refreshes the stored credential when possible. With `force`,
/// the stored credential is discarded and the browser flow always runs.
pub async fn run(config: &ClientConfig, force: bool, cancel: CancellationToken) -> ClientResult<()> {
    let flow = super::authorization_flow(config, cancel)?;

    let credential = if force {
        println!("Starting Google Calendar authorization...");
        println!("A browser window will open for you to authorize access.");
        flow.reauthorize().await?
    } else {
        flow.obtain().await?
    };

    info!("Google authorization successful");
    println!(
        "Authorized. Credential stored at {}",
        flow.store().path().display()
    );
    if !credential.can_refresh() {
        println!("No refresh token was issued; you will be asked to authorize again once it expires.");
    }
    Ok(())
}
