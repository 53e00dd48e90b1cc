//! Parsing of user-supplied publication times.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

pub const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid schedule '{0}' (expected YYYY-MM-DD HH:MM)")]
    Format(String),
    #[error("schedule '{0}' does not map to a single local time")]
    Ambiguous(String),
    #[error("schedule '{0}' is not in the future")]
    NotInFuture(String),
}

/// Parse `YYYY-MM-DD HH:MM` in the timezone of `now` and require it to be later than `now`.
pub fn parse_schedule<Tz: TimeZone>(
    input: &str,
    now: &DateTime<Tz>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let trimmed = input.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, SCHEDULE_FORMAT)
        .map_err(|_| ScheduleError::Format(trimmed.to_string()))?;
    let local = now
        .timezone()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ScheduleError::Ambiguous(trimmed.to_string()))?;
    let when = local.with_timezone(&Utc);
    if when <= now.with_timezone(&Utc) {
        return Err(ScheduleError::NotInFuture(trimmed.to_string()));
    }
    Ok(when)
}
