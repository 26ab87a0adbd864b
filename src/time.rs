use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeDelta, TimeZone, Utc};

use crate::error::SrsError;
use crate::models::MemoryState;

/// Window below which labels report hours and minutes instead of days
pub const NEAR_WINDOW_HOURS: i64 = 72;

/// Parse an RFC 3339 timestamp, e.g. `2024-01-01T10:00:00Z`
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, SrsError> {
    Ok(DateTime::parse_from_rfc3339(value)?)
}

/// Parse a calendar date in `YYYY-MM-DD` form
pub fn parse_due_date(value: &str) -> Result<NaiveDate, SrsError> {
    Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")?)
}

/// Resolve the instant a state becomes due.
///
/// `due_at` is authoritative when present; otherwise `due_date` is read as
/// midnight of that date in the same UTC offset as `now`.
pub fn effective_due(
    state: &MemoryState,
    now: &DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, SrsError> {
    if let Some(due_at) = &state.due_at {
        return parse_timestamp(due_at);
    }

    let date = parse_due_date(&state.due_date)?;
    let midnight = date.and_time(NaiveTime::MIN);
    now.offset()
        .from_local_datetime(&midnight)
        .single()
        .ok_or_else(|| SrsError::InvalidTimestamp(state.due_date.clone()))
}

/// Format an instant as RFC 3339 in UTC with a `Z` suffix
pub fn format_utc(instant: &DateTime<FixedOffset>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format the calendar-date portion of an instant as `YYYY-MM-DD`,
/// keeping the instant's own UTC offset
pub fn format_local_date(instant: &DateTime<FixedOffset>) -> String {
    instant.date_naive().format("%Y-%m-%d").to_string()
}

/// Format a non-negative delta as hours and minutes, e.g. `2h 30m`.
///
/// The hour part is omitted when zero. The minute part is shown whenever
/// the hour part is absent or the minutes are non-zero, so `2h`, `45m`
/// and `0m` are all possible but `2h 0m` is not.
pub fn format_hm(delta: TimeDelta) -> String {
    let hours = delta.num_hours();
    let minutes = delta.num_minutes() % 60;

    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Whole days in a positive delta, rounded up
pub fn ceil_days(delta: TimeDelta) -> i64 {
    let secs = delta.num_seconds();
    (secs + 86_399) / 86_400
}
