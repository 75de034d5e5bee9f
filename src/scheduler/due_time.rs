//! Parsing of user-entered due times

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use thiserror::Error;

const ABSOLUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

const UNITS: [(char, i64); 4] = [('s', 1), ('m', 60), ('h', 3600), ('d', 86_400)];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DueTimeError {
    #[error("Could not read '{0}' as a time. Try 30m, 2h, 1d or 2026-05-01 09:00 (UTC)")]
    Unrecognized(String),
    #[error("{0} is not in the future")]
    NotInFuture(DateTime<Utc>),
    #[error("That delay is too large")]
    OutOfRange,
}

/// Parse a due time relative to `now`.
///
/// Accepts `45s`, `30m`, `2h`, `1d` (optionally prefixed by `+` or `in `) and
/// absolute `YYYY-MM-DD HH:MM` in UTC. The result is strictly after `now`.
pub fn parse_due_time(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DueTimeError> {
    let normalized = text.trim().to_ascii_lowercase();
    let relative = normalized
        .strip_prefix('+')
        .or_else(|| normalized.strip_prefix("in "))
        .unwrap_or(&normalized)
        .trim();

    let due_at = if let Some(delay) = parse_delay(relative) {
        now.checked_add_signed(delay?)
            .ok_or(DueTimeError::OutOfRange)?
    } else {
        NaiveDateTime::parse_from_str(&normalized, ABSOLUTE_FORMAT)
            .map_err(|_| DueTimeError::Unrecognized(text.trim().to_string()))?
            .and_utc()
    };

    if due_at <= now {
        return Err(DueTimeError::NotInFuture(due_at));
    }
    Ok(due_at)
}

/// `None` when the text is not a relative delay at all
fn parse_delay(text: &str) -> Option<Result<Duration, DueTimeError>> {
    let (digits, unit_secs) = UNITS
        .iter()
        .find_map(|&(suffix, secs)| text.strip_suffix(suffix).map(|d| (d.trim_end(), secs)))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let Ok(amount) = digits.parse::<i64>() else {
        return Some(Err(DueTimeError::OutOfRange));
    };
    Some(
        amount
            .checked_mul(unit_secs)
            .and_then(Duration::try_seconds)
            .ok_or(DueTimeError::OutOfRange),
    )
}
