//! Trait seams between the calendar session and its collaborators.
//!
//! [`EventSource`] is the provider RPC surface (one page of events for one
//! calendar). [`Authorizer`] produces credentials, either from storage or
//! through the interactive flow. Both return boxed futures so they stay
//! object-safe and can be swapped for in-memory doubles.

use std::future::Future;
use std::pin::Pin;

use agenda_core::{EventRecord, TimeWindow};
use chrono::{DateTime, Utc};

use crate::credential::Credential;
use crate::error::ProviderResult;

/// Largest page the session asks a provider for.
pub const MAX_PAGE_SIZE: u32 = 10;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe for dynamic dispatch.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a [`TimeWindow`] is turned into a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Omit the upper bound and return everything from the window start on.
    pub open_ended: bool,
    /// Events requested per calendar, clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            open_ended: false,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryPolicy {
    /// Builder method to omit the upper bound.
    #[must_use]
    pub fn with_open_ended(mut self, open_ended: bool) -> Self {
        self.open_ended = open_ended;
        self
    }

    /// Builder method to set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// A single-page event list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Lower bound on event end time.
    pub time_min: DateTime<Utc>,
    /// Upper bound on event start time, if any.
    pub time_max: Option<DateTime<Utc>>,
    /// Page size.
    pub max_results: u32,
    /// Include cancelled events.
    pub show_deleted: bool,
    /// Expand recurring events into instances.
    pub single_events: bool,
    /// Sort key understood by the provider.
    pub order_by: &'static str,
}

impl EventQuery {
    /// Builds the query for `window` under `policy`.
    pub fn for_window(window: &TimeWindow, policy: &QueryPolicy) -> Self {
        Self {
            time_min: window.start,
            time_max: (!policy.open_ended).then_some(window.end),
            max_results: policy.page_size.clamp(1, MAX_PAGE_SIZE),
            show_deleted: false,
            single_events: true,
            order_by: "startTime",
        }
    }
}

/// The provider's event-list RPC.
pub trait EventSource: Send + Sync {
    /// Returns the name of this source (e.g. "google").
    fn name(&self) -> &str;

    /// Fetches one page of events from `calendar_id`, in provider order.
    ///
    /// # Errors
    ///
    /// `AuthenticationRejected` when the provider refuses the credential;
    /// any other code for transport, server or decoding failures.
    fn list_events<'a>(
        &'a self,
        credential: &'a Credential,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>>;
}

/// Produces credentials for the session.
pub trait Authorizer: Send + Sync {
    /// Returns a usable credential without interaction when possible:
    /// stored and fresh, or stored and silently refreshed. Falls back to the
    /// interactive flow when nothing usable is stored.
    fn obtain(&self) -> BoxFuture<'_, ProviderResult<Credential>>;

    /// Mints a new access token from `credential`'s refresh token and
    /// persists the result.
    fn refresh<'a>(&'a self, credential: &'a Credential)
    -> BoxFuture<'a, ProviderResult<Credential>>;

    /// Discards the stored credential and runs the interactive flow.
    fn reauthorize(&self) -> BoxFuture<'_, ProviderResult<Credential>>;
}
