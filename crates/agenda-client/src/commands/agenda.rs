//! The default command: print the day's agenda.

use std::io::Write;

use agenda_core::{AgendaDay, AgendaOutcome, MarkdownRenderer};
use agenda_providers::CalendarSession;
use tracing::debug;

use crate::error::ClientResult;

/// Printed when the provider returns no events at all.
pub const NO_EVENTS_MESSAGE: &str = "No upcoming events found.";

/// Authorizes, fetches every configured calendar for `day` and prints the
/// markdown checklist to stdout.
#[cfg(feature = "google")]
pub async fn run(
    config: &crate::config::ClientConfig,
    day: AgendaDay,
    cancel: tokio_util::sync::CancellationToken,
) -> ClientResult<()> {
    use std::sync::Arc;

    use agenda_providers::google::GoogleCalendarClient;

    let flow = super::authorization_flow(config, cancel)?;
    let client = GoogleCalendarClient::new(config.http_timeout())?;
    let session = CalendarSession::connect(
        Arc::new(flow),
        Arc::new(client),
        config.calendar_ids.clone(),
        config.query_policy(),
    )
    .await?;

    let renderer = MarkdownRenderer::new(config.render_options());
    let outcome = collect(&session, day, &renderer).await?;
    report(&outcome, &mut std::io::stdout().lock())
}

/// Fetches `day` from `session` and renders it.
pub async fn collect(
    session: &CalendarSession,
    day: AgendaDay,
    renderer: &MarkdownRenderer,
) -> ClientResult<AgendaOutcome> {
    let events = session.day(day).await?;
    Ok(renderer.render_agenda(&events)?)
}

/// Writes `outcome` for the user.
pub fn report(outcome: &AgendaOutcome, out: &mut impl Write) -> ClientResult<()> {
    match outcome {
        AgendaOutcome::NoEvents => writeln!(out, "{}", NO_EVENTS_MESSAGE)?,
        AgendaOutcome::AllExcluded { excluded } => {
            debug!("all {} events were excluded", excluded);
        }
        AgendaOutcome::Rendered { markdown, excluded } => {
            debug!("rendered agenda, {} events excluded", excluded);
            out.write_all(markdown.as_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}
