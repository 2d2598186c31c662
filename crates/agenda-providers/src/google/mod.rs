//! Google Calendar backend.
//!
//! # Authentication Flow
//!
//! 1. The user provides their own OAuth client descriptor (required by Google)
//! 2. A local HTTP listener is bound on an ephemeral loopback port
//! 3. The browser is opened to Google's consent page with a PKCE challenge
//! 4. Google redirects to the listener with the authorization code
//! 5. The code is exchanged for access and refresh tokens
//! 6. Tokens are persisted and silently refreshed on later runs
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use agenda_providers::google::{AuthorizationFlow, GoogleCalendarClient};
//! use agenda_providers::{CalendarSession, QueryPolicy, StorageLocations};
//!
//! let flow = AuthorizationFlow::from_locations(&StorageLocations::default(), Duration::from_secs(30))?;
//! let client = GoogleCalendarClient::new(Duration::from_secs(30))?;
//! let session = CalendarSession::connect(
//!     Arc::new(flow),
//!     Arc::new(client),
//!     vec!["primary".to_string()],
//!     QueryPolicy::default(),
//! )
//! .await?;
//! let events = session.today().await?;
//! ```

mod client;
mod config;
mod flow;
mod oauth;

pub use client::{CALENDAR_API_BASE, GoogleCalendarClient};
pub use config::{AuthorizationConfig, CALENDAR_READONLY_SCOPE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL};
pub use flow::{AuthorizationFlow, Browser, SystemBrowser};
pub use oauth::{
    CallbackListener, DEFAULT_CALLBACK_TIMEOUT, DEFAULT_HTTP_TIMEOUT, OAuthClient, PkceFlow,
    STATE_TOKEN,
};
