//! Google Calendar API client.
//!
//! Issues the events.list request for one calendar and decodes the page
//! into [`EventRecord`]s. Only the first page is read; the query's
//! `max_results` bounds its size.

use std::time::Duration;

use agenda_core::EventRecord;
use serde::Deserialize;
use tracing::debug;

use crate::credential::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, EventQuery, EventSource};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a new client against the public API.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Builder method to point the client at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one page of events from `calendar_id`.
    pub async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        query: &EventQuery,
    ) -> ProviderResult<Vec<EventRecord>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&credential.access_token)
            .query(&[
                ("showDeleted", query.show_deleted.to_string()),
                ("singleEvents", query.single_events.to_string()),
                ("timeMin", query.time_min.to_rfc3339()),
                ("maxResults", query.max_results.to_string()),
                ("orderBy", query.order_by.to_string()),
            ]);

        if let Some(time_max) = query.time_max {
            request = request.query(&[("timeMax", time_max.to_rfc3339())]);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::authentication(
                "access token expired or invalid",
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_source(e)
        })?;

        if list.next_page_token.is_some() {
            debug!("calendar {} has more events than one page", calendar_id);
        }
        debug!("fetched {} events from calendar {}", list.items.len(), calendar_id);
        Ok(list.items)
    }
}

impl EventSource for GoogleCalendarClient {
    fn name(&self) -> &str {
        "google"
    }

    fn list_events<'a>(
        &'a self,
        credential: &'a Credential,
        calendar_id: &'a str,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>> {
        Box::pin(GoogleCalendarClient::list_events(
            self,
            credential,
            calendar_id,
            query,
        ))
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<EventRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::provider::QueryPolicy;
    use agenda_core::TimeWindow;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(policy: QueryPolicy) -> EventQuery {
        let start = Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 6, 0, 0, 0).unwrap();
        EventQuery::for_window(&TimeWindow::new(start, end).unwrap(), &policy)
    }

    fn credential() -> Credential {
        Credential::new("token-123", None, None, None, Utc::now())
    }

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn lists_events_with_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer token-123"))
            .and(query_param("showDeleted", "false"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("maxResults", "10"))
            .and(query_param("timeMin", "2025-02-05T10:00:00+00:00"))
            .and(query_param("timeMax", "2025-02-06T00:00:00+00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "calendar#events",
                "items": [
                    {
                        "id": "a",
                        "summary": "Standup",
                        "start": { "dateTime": "2025-02-05T09:05:00-03:00" },
                        "end": { "dateTime": "2025-02-05T09:20:00-03:00" }
                    },
                    {
                        "id": "b",
                        "summary": "Holiday",
                        "description": "Office closed",
                        "start": { "date": "2025-02-05" }
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = client(&server)
            .list_events(&credential(), "primary", &query(QueryPolicy::default()))
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Standup");
        assert_eq!(events[1].description(), Some("Office closed"));
        assert_eq!(events[1].start.date.as_deref(), Some("2025-02-05"));
    }

    #[tokio::test]
    async fn encodes_calendar_id_and_omits_time_max_when_open_ended() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/team%40example.com/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let events = client(&server)
            .list_events(
                &credential(),
                "team@example.com",
                &query(QueryPolicy::default().with_open_ended(true)),
            )
            .await
            .unwrap();
        assert!(events.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].url.query().unwrap_or_default().contains("timeMax"));
    }

    #[tokio::test]
    async fn unauthorized_is_authentication_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_events(&credential(), "primary", &query(QueryPolicy::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationRejected);
    }

    #[tokio::test]
    async fn other_statuses_are_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_events(&credential(), "missing", &query(QueryPolicy::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.message().contains("404"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_events(&credential(), "primary", &query(QueryPolicy::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn unreachable_api_is_network_error() {
        let client = GoogleCalendarClient::new(Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:1/");
        assert_eq!(client.base_url(), "http://127.0.0.1:1");

        let err = client
            .list_events(&credential(), "primary", &query(QueryPolicy::default()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
    }

    #[test]
    fn source_name() {
        let client = GoogleCalendarClient::new(Duration::from_secs(1)).unwrap();
        assert_eq!(EventSource::name(&client), "google");
    }
}
