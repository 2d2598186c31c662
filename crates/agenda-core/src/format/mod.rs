//! Markdown rendering of an agenda.
//!
//! The [`MarkdownRenderer`] turns an aggregated event list into a markdown
//! checklist, one block per event:
//!
//! ```text
//! - [ ] 9:05 Standup
//! 	> Daily sync with the team
//! ```
//!
//! Hours keep their natural width (`9:05`, not `09:05`); minutes are always
//! two digits. Events whose summary contains an exclusion term are skipped.
//!
//! # Example
//!
//! ```rust
//! use agenda_core::format::{MarkdownRenderer, RenderOptions};
//! use agenda_core::{EventRecord, EventStart};
//!
//! let renderer = MarkdownRenderer::new(RenderOptions::default());
//! let events = vec![EventRecord::new("1", "Standup", EventStart::at("2024-01-02T09:05:00Z"))];
//! assert_eq!(renderer.render(&events).unwrap(), "- [ ] 9:05 Standup\n");
//! ```

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::event::EventRecord;

/// Separator Google Calendar inserts before generated Meet joining details.
pub const MEET_INVITATION_MARKER: &str = "-::~:~::~";

/// Errors raised while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The event has neither a parseable `dateTime` nor a parseable `date`.
    #[error("event {id} ({summary:?}) has no parseable start date")]
    DateParse {
        /// The offending event's id.
        id: String,
        /// The offending event's summary.
        summary: String,
    },
}

/// Rendering rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Case-sensitive substrings; an event whose summary contains any of
    /// them is left out.
    pub exclusions: Vec<String>,
    /// When a description contains any of these, only its first line is kept.
    pub trim_markers: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            exclusions: Vec::new(),
            trim_markers: vec![MEET_INVITATION_MARKER.to_string()],
        }
    }
}

impl RenderOptions {
    /// Builder method to set the exclusion terms.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Builder method to set the description trim markers.
    #[must_use]
    pub fn with_trim_markers(mut self, markers: Vec<String>) -> Self {
        self.trim_markers = markers;
        self
    }
}

/// What the pipeline produced for the caller to report.
///
/// An empty provider result and a result emptied by exclusions are kept
/// apart so the caller can word them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgendaOutcome {
    /// The provider returned no events.
    NoEvents,
    /// Events were returned, but every one of them was excluded.
    AllExcluded {
        /// How many events were dropped.
        excluded: usize,
    },
    /// At least one event was rendered.
    Rendered {
        /// The markdown checklist.
        markdown: String,
        /// How many events were dropped.
        excluded: usize,
    },
}

/// Renders event lists as markdown checklists.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    /// Creates a renderer with the given options.
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Returns the active options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Returns true if the event's summary matches an exclusion term.
    pub fn is_excluded(&self, event: &EventRecord) -> bool {
        self.options
            .exclusions
            .iter()
            .any(|term| event.summary.contains(term.as_str()))
    }

    /// Renders the events in order. Fully excluded input renders as `""`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DateParse`] for a kept event with no usable
    /// start.
    pub fn render(&self, events: &[EventRecord]) -> Result<String, RenderError> {
        let mut out = String::new();
        for event in events {
            if self.is_excluded(event) {
                debug!(id = %event.id, "excluding event {:?}", event.summary);
                continue;
            }
            self.write_item(&mut out, event)?;
        }
        Ok(out)
    }

    /// Renders the events and classifies the result.
    ///
    /// # Errors
    ///
    /// Same as [`MarkdownRenderer::render`].
    pub fn render_agenda(&self, events: &[EventRecord]) -> Result<AgendaOutcome, RenderError> {
        if events.is_empty() {
            return Ok(AgendaOutcome::NoEvents);
        }

        let excluded = events.iter().filter(|e| self.is_excluded(e)).count();
        if excluded == events.len() {
            return Ok(AgendaOutcome::AllExcluded { excluded });
        }

        Ok(AgendaOutcome::Rendered {
            markdown: self.render(events)?,
            excluded,
        })
    }

    fn write_item(&self, out: &mut String, event: &EventRecord) -> Result<(), RenderError> {
        let (hour, minute) = display_time(event)?;

        out.push_str(&format!("- [ ] {}:{:02} {}", hour, minute, event.summary));
        if let Some(description) = event.description().map(|d| self.trim_description(d))
            && !description.is_empty()
        {
            out.push_str(&format!("\n\t> {}", description));
        }
        out.push('\n');
        Ok(())
    }

    fn trim_description<'a>(&self, description: &'a str) -> &'a str {
        let marked = self
            .options
            .trim_markers
            .iter()
            .any(|m| !m.is_empty() && description.contains(m.as_str()));
        if marked {
            description.lines().next().unwrap_or_default().trim_end()
        } else {
            description
        }
    }
}

/// Hour and minute to display for an event.
///
/// Timed events keep the offset the provider sent; all-day events show as
/// midnight.
fn display_time(event: &EventRecord) -> Result<(u32, u32), RenderError> {
    if let Some(start) = event.start.parse_date_time() {
        return Ok((start.hour(), start.minute()));
    }
    if event.start.parse_date().is_some() {
        return Ok((0, 0));
    }
    Err(RenderError::DateParse {
        id: event.id.clone(),
        summary: event.summary.clone(),
    })
}
