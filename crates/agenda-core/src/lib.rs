//! Core types: time windows, event records, markdown rendering

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{EventRecord, EventStart};
pub use format::{
    AgendaOutcome, MEET_INVITATION_MARKER, MarkdownRenderer, RenderError, RenderOptions,
};
pub use time::{AgendaDay, TimeWindow};
pub use tracing::{TracingConfig, TracingError, init_tracing};
