//! Schedule arithmetic for the task daemon
//!
//! Times are plain `i64` seconds since the Unix epoch; chrono is only used to
//! find local midnight and to render timestamps.

use chrono::{DateTime, Local, LocalResult, NaiveTime, TimeZone};

use super::errors::DomainError;

/// Rendering of an unset timestamp
pub const ZERO_TIMESTAMP: &str = "0000-00-00 00:00:00";

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

// ============================================================================
// Parsing
// ============================================================================

/// Parses a daily offset written as `HH:MM:SS`
///
/// Fields are read left to right, so `"06:30"` is six and a half hours.
///
/// # Errors
/// Returns [`DomainError::InvalidTimeSpec`] for empty or non-numeric fields,
/// more than three fields, or an offset of 24 hours or more.
pub fn parse_schedule(value: &str) -> Result<i64, DomainError> {
    let fields = split_fields(value, 3)?;
    let units = [SECS_PER_HOUR, SECS_PER_MINUTE, 1];
    let offset: i64 = fields.iter().zip(units).map(|(f, u)| f * u).sum();
    if offset >= SECS_PER_DAY {
        return Err(DomainError::InvalidTimeSpec {
            value: value.to_string(),
            reason: "daily offset must be less than 24 hours".to_string(),
        });
    }
    Ok(offset)
}

/// Parses a repeat interval written as `DD:HH:MM:SS`
///
/// Fields are aligned from the right, so `"24:00:00"` is twenty-four hours
/// and `"01:00:00:00"` is one day.
///
/// # Errors
/// Returns [`DomainError::InvalidTimeSpec`] for empty or non-numeric fields
/// or more than four fields.
pub fn parse_interval(value: &str) -> Result<i64, DomainError> {
    let fields = split_fields(value, 4)?;
    let units = [1, SECS_PER_MINUTE, SECS_PER_HOUR, SECS_PER_DAY];
    Ok(fields.iter().rev().zip(units).map(|(f, u)| f * u).sum())
}

fn split_fields(value: &str, max: usize) -> Result<Vec<i64>, DomainError> {
    let invalid = |reason: String| DomainError::InvalidTimeSpec {
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty value".to_string()));
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() > max {
        return Err(invalid(format!("expected at most {max} fields")));
    }

    fields
        .iter()
        .map(|field| {
            field
                .parse::<u32>()
                .map(i64::from)
                .map_err(|_| invalid(format!("'{field}' is not a number")))
        })
        .collect()
}

// ============================================================================
// Next-run computation
// ============================================================================

/// Start of the calendar day containing `now`, in `now`'s time zone
#[must_use]
pub fn midnight_of<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let naive = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        // Midnight skipped by a DST jump; fall back to the wall-clock distance.
        LocalResult::None => {
            let since_midnight = now.time().signed_duration_since(NaiveTime::MIN);
            now.timestamp() - since_midnight.num_seconds()
        }
    }
}

/// First run time of an item at daemon start
///
/// Today's midnight plus `schedule`; when that moment is not in the future
/// the interval is added once. A daemon that was down for several intervals
/// therefore catches up with a single run.
#[must_use]
pub fn initial_next_run<Tz: TimeZone>(schedule: i64, interval: i64, now: &DateTime<Tz>) -> i64 {
    let next = midnight_of(now) + schedule;
    if next <= now.timestamp() {
        next + interval
    } else {
        next
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Renders `secs` as `YYYY-MM-DD HH:MM:SS` in the local time zone
#[must_use]
pub fn format_timestamp(secs: i64) -> String {
    format_timestamp_in(secs, &Local)
}

/// Renders `secs` as `YYYY-MM-DD HH:MM:SS` in `tz`; zero renders as all zeros
#[must_use]
pub fn format_timestamp_in<Tz: TimeZone>(secs: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if secs == 0 {
        return ZERO_TIMESTAMP.to_string();
    }
    match tz.timestamp_opt(secs, 0) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
            dt.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        LocalResult::None => ZERO_TIMESTAMP.to_string(),
    }
}

/// Renders a duration in seconds as `DD:HH:MM:SS`
#[must_use]
pub fn format_interval(secs: i64) -> String {
    let days = secs / SECS_PER_DAY;
    let hours = (secs % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = secs % SECS_PER_MINUTE;
    format!("{days:02}:{hours:02}:{minutes:02}:{seconds:02}")
}
