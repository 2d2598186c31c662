//! Query windows for the agenda.
//!
//! A [`TimeWindow`] is a half-open `[start, end)` interval in UTC. The
//! [`TimeWindow::today`] and [`TimeWindow::tomorrow`] constructors are pure
//! functions of "now" and the local calendar-day boundaries of a timezone.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which day of the agenda to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaDay {
    /// From now until the next local midnight.
    #[default]
    Today,
    /// From the next local midnight to the one after.
    Tomorrow,
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window, or `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Returns the window for `day` as seen from `now` in `tz`.
    pub fn for_day<Tz: TimeZone>(day: AgendaDay, now: DateTime<Utc>, tz: &Tz) -> Self {
        match day {
            AgendaDay::Today => Self::today(now, tz),
            AgendaDay::Tomorrow => Self::tomorrow(now, tz),
        }
    }

    /// `[now, next local midnight)`.
    pub fn today<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let end = midnight_after(today, tz);
        Self { start: now, end }
    }

    /// `[next local midnight, the midnight after that)`.
    pub fn tomorrow<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);
        Self {
            start: midnight_after(today, tz),
            end: midnight_after(tomorrow, tz),
        }
    }
}

/// The first instant of the local day following `date`.
///
/// Zones that skip midnight on a DST switch resolve to the first valid local
/// time after it.
fn midnight_after<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let next = date.succ_opt().unwrap_or(date);
    let midnight = next.and_time(chrono::NaiveTime::MIN);
    (0..=3)
        .map(|h| midnight + Duration::hours(h))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn new_rejects_empty_and_inverted_windows() {
        let t = utc(2025, 2, 5, 10, 0, 0);
        assert!(TimeWindow::new(t, t).is_none());
        assert!(TimeWindow::new(t, t - Duration::minutes(1)).is_none());
        assert!(TimeWindow::new(t, t + Duration::minutes(1)).is_some());
    }

    #[test]
    fn today_starts_now_and_ends_at_midnight() {
        let now = utc(2025, 2, 5, 10, 30, 0);
        let window = TimeWindow::today(now, &Utc);
        assert_eq!(window.start, now);
        assert_eq!(window.end, utc(2025, 2, 6, 0, 0, 0));
    }

    #[test]
    fn today_one_second_before_midnight() {
        let now = utc(2025, 2, 5, 23, 59, 59);
        let window = TimeWindow::today(now, &Utc);
        assert_eq!(window.start, now);
        assert_eq!(window.end, utc(2025, 2, 6, 0, 0, 0));
        assert!(window.end > window.start);
    }

    #[test]
    fn today_at_exact_midnight_covers_whole_day() {
        let now = utc(2025, 2, 5, 0, 0, 0);
        let window = TimeWindow::today(now, &Utc);
        assert_eq!(window.start, now);
        assert_eq!(window.end - window.start, Duration::hours(24));
    }

    #[test]
    fn tomorrow_is_next_full_day() {
        let now = utc(2025, 2, 5, 10, 30, 0);
        let window = TimeWindow::tomorrow(now, &Utc);
        assert_eq!(window.start, utc(2025, 2, 6, 0, 0, 0));
        assert_eq!(window.end, utc(2025, 2, 7, 0, 0, 0));
    }

    #[test]
    fn tomorrow_across_month_and_year_boundaries() {
        let window = TimeWindow::tomorrow(utc(2024, 12, 31, 8, 0, 0), &Utc);
        assert_eq!(window.start, utc(2025, 1, 1, 0, 0, 0));
        assert_eq!(window.end, utc(2025, 1, 2, 0, 0, 0));

        let window = TimeWindow::tomorrow(utc(2024, 2, 28, 8, 0, 0), &Utc);
        assert_eq!(window.start, utc(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn boundaries_follow_local_midnight() {
        // UTC-3: local midnight is 03:00 UTC
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let now = utc(2025, 2, 6, 1, 0, 0); // 22:00 local on Feb 5
        let today = TimeWindow::today(now, &tz);
        assert_eq!(today.end, utc(2025, 2, 6, 3, 0, 0));

        let tomorrow = TimeWindow::tomorrow(now, &tz);
        assert_eq!(tomorrow.start, utc(2025, 2, 6, 3, 0, 0));
        assert_eq!(tomorrow.end, utc(2025, 2, 7, 3, 0, 0));
        assert_eq!(tomorrow.start.with_timezone(&tz).hour(), 0);
    }

    #[test]
    fn for_day_dispatches() {
        let now = utc(2025, 2, 5, 10, 30, 0);
        assert_eq!(
            TimeWindow::for_day(AgendaDay::Today, now, &Utc),
            TimeWindow::today(now, &Utc)
        );
        assert_eq!(
            TimeWindow::for_day(AgendaDay::Tomorrow, now, &Utc),
            TimeWindow::tomorrow(now, &Utc)
        );
    }
}
