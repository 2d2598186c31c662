//! Cross-calendar retrieval with bounded re-authorization.
//!
//! A [`CalendarSession`] holds a credential and an ordered list of calendar
//! identifiers. Retrieval walks the calendars in order and concatenates
//! their pages; it never re-sorts across calendars, so the configured
//! calendar order is the display order.
//!
//! When the provider rejects the credential, the session discards it, runs
//! the interactive flow once and restarts the retrieval from the first
//! calendar. A second rejection is returned to the caller.

use std::sync::Arc;

use agenda_core::{AgendaDay, EventRecord, TimeWindow};
use chrono::{Local, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Authorizer, EventQuery, EventSource, QueryPolicy};

/// Re-authorizations allowed per retrieval.
pub const MAX_REAUTHORIZATIONS: usize = 1;

/// An authenticated view over a set of calendars.
pub struct CalendarSession {
    authorizer: Arc<dyn Authorizer>,
    source: Arc<dyn EventSource>,
    calendar_ids: Vec<String>,
    policy: QueryPolicy,
    credential: RwLock<Credential>,
}

impl std::fmt::Debug for CalendarSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarSession")
            .field("source", &self.source.name())
            .field("calendar_ids", &self.calendar_ids)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CalendarSession {
    /// Obtains a credential from `authorizer` and binds it to `calendar_ids`.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when `calendar_ids` is empty; otherwise whatever
    /// [`Authorizer::obtain`] returns.
    pub async fn connect(
        authorizer: Arc<dyn Authorizer>,
        source: Arc<dyn EventSource>,
        calendar_ids: Vec<String>,
        policy: QueryPolicy,
    ) -> ProviderResult<Self> {
        if calendar_ids.is_empty() {
            return Err(ProviderError::configuration("no calendar ids configured"));
        }
        let credential = authorizer.obtain().await?;
        Ok(Self::with_credential(
            authorizer,
            source,
            calendar_ids,
            policy,
            credential,
        ))
    }

    /// Builds a session around an already obtained credential.
    pub fn with_credential(
        authorizer: Arc<dyn Authorizer>,
        source: Arc<dyn EventSource>,
        calendar_ids: Vec<String>,
        policy: QueryPolicy,
        credential: Credential,
    ) -> Self {
        Self {
            authorizer,
            source,
            calendar_ids,
            policy,
            credential: RwLock::new(credential),
        }
    }

    /// Returns the configured calendar identifiers, in query order.
    pub fn calendar_ids(&self) -> &[String] {
        &self.calendar_ids
    }

    /// Events from now until the next local midnight.
    pub async fn today(&self) -> ProviderResult<Vec<EventRecord>> {
        self.day(AgendaDay::Today).await
    }

    /// Events for the next local calendar day.
    pub async fn tomorrow(&self) -> ProviderResult<Vec<EventRecord>> {
        self.day(AgendaDay::Tomorrow).await
    }

    /// Events for `day` in the local timezone.
    pub async fn day(&self, day: AgendaDay) -> ProviderResult<Vec<EventRecord>> {
        let window = TimeWindow::for_day(day, Utc::now(), &Local);
        self.retrieve(&window).await
    }

    /// Fetches every calendar for `window` and concatenates the pages.
    ///
    /// # Errors
    ///
    /// Any failure on any calendar aborts the whole retrieval. An
    /// authentication rejection is retried after at most
    /// [`MAX_REAUTHORIZATIONS`] re-authorizations.
    pub async fn retrieve(&self, window: &TimeWindow) -> ProviderResult<Vec<EventRecord>> {
        let query = EventQuery::for_window(window, &self.policy);

        let mut result = self.fetch_all(&query).await;
        for attempt in 0..MAX_REAUTHORIZATIONS {
            let reason = match &result {
                Err(e) if e.is_authentication_rejected() => e.message().to_string(),
                _ => break,
            };
            warn!(
                attempt = attempt + 1,
                "credential rejected ({}), re-authorizing", reason
            );
            let fresh = self.authorizer.reauthorize().await?;
            *self.credential.write().await = fresh;
            result = self.fetch_all(&query).await;
        }
        result
    }

    async fn fetch_all(&self, query: &EventQuery) -> ProviderResult<Vec<EventRecord>> {
        let credential = self.fresh_credential().await?;

        let mut events = Vec::new();
        for calendar_id in &self.calendar_ids {
            debug!("fetching events from calendar {}", calendar_id);
            let page = self
                .source
                .list_events(&credential, calendar_id, query)
                .await
                .map_err(|e| e.with_provider(self.source.name()))?;
            debug!("calendar {} returned {} events", calendar_id, page.len());
            events.extend(page);
        }

        info!(
            "retrieved {} events from {} calendars",
            events.len(),
            self.calendar_ids.len()
        );
        Ok(events)
    }

    /// Returns the held credential, refreshing it first if it has expired.
    async fn fresh_credential(&self) -> ProviderResult<Credential> {
        let current = self.credential.read().await.clone();
        if !current.is_expired() {
            return Ok(current);
        }
        if !current.can_refresh() {
            return Err(ProviderError::authentication(
                "access token expired and no refresh token is available",
            ));
        }

        debug!("access token expired, refreshing");
        let refreshed = self.authorizer.refresh(&current).await?;
        *self.credential.write().await = refreshed.clone();
        Ok(refreshed)
    }
}
