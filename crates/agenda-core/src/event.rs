//! Event records as returned by the calendar provider.
//!
//! [`EventRecord`] mirrors the subset of the provider's event resource the
//! agenda needs. Records are read-only: the renderer derives display values
//! from them but never mutates them.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// The start of an event.
///
/// Exactly one of `date_time` (timed events) or `date` (all-day events) is
/// expected to be populated. Both are kept as raw strings so that parsing,
/// and its fallback, happens at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStart {
    /// RFC 3339 timestamp with offset, for timed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// `YYYY-MM-DD`, for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventStart {
    /// A timed start.
    pub fn at(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            ..Self::default()
        }
    }

    /// An all-day start.
    pub fn on(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Self::default()
        }
    }

    /// Parses the timed start, if present and valid.
    pub fn parse_date_time(&self) -> Option<DateTime<FixedOffset>> {
        self.date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    /// Parses the all-day start, if present and valid.
    pub fn parse_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

/// A single calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Provider-assigned identifier.
    #[serde(default)]
    pub id: String,
    /// Event title.
    #[serde(default)]
    pub summary: String,
    /// Free-form description, possibly multi-line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the event starts.
    #[serde(default)]
    pub start: EventStart,
}

impl EventRecord {
    /// Creates a new event with the given id, summary and start.
    pub fn new(id: impl Into<String>, summary: impl Into<String>, start: EventStart) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            start,
            ..Self::default()
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the description if it is present and non-empty.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}
