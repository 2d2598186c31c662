//! Calendar retrieval and OAuth credential handling.
//!
//! This crate connects the agenda to a calendar provider:
//!
//! - [`CredentialStore`] - Owner-only persistence of the OAuth credential
//! - [`Authorizer`] - Produces credentials (stored, refreshed or interactive)
//! - [`EventSource`] - One page of events for one calendar
//! - [`CalendarSession`] - Multi-calendar retrieval with bounded re-authorization
//! - [`ProviderError`] - Error types for all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐        ┌─────────────────────┐
//! │ CredentialStore │◄───────│  AuthorizationFlow  │ (Authorizer)
//! └─────────────────┘        └──────────┬──────────┘
//!                                       │ Credential
//!                                       ▼
//!                            ┌─────────────────────┐
//!                            │   CalendarSession   │
//!                            └──────────┬──────────┘
//!                                       │ EventQuery per calendar
//!                                       ▼
//!                            ┌─────────────────────┐
//!                            │ GoogleCalendarClient│ (EventSource)
//!                            └─────────────────────┘
//! ```

pub mod credential;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;
pub mod session;

// Re-export main types at crate root
pub use credential::{Credential, CredentialStore, StorageLocations};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{Authorizer, BoxFuture, EventQuery, EventSource, MAX_PAGE_SIZE, QueryPolicy};
pub use session::{CalendarSession, MAX_REAUTHORIZATIONS};
