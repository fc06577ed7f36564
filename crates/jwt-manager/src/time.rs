//! Clock and TTL policy.
//!
//! Pure functions computing expiration instants and tolerance windows from
//! Unix timestamps (seconds). Every check has an `_at` form taking an explicit
//! `now` so boundary conditions can be tested without wall-clock dependence.

use std::time::Duration;
use thiserror::Error;

/// Errors produced when parsing a timespan string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimespanError {
    /// Input was empty or whitespace only.
    #[error("Timespan is empty")]
    Empty,

    /// Input is neither a number of seconds nor a `humantime` duration.
    #[error("Invalid timespan '{input}': {reason}")]
    Invalid {
        /// Rejected input, trimmed.
        input: String,
        /// Parser message.
        reason: String,
    },
}

/// Current Unix time in seconds.
#[must_use]
pub fn now_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Whole seconds of `duration` as `i64`, saturating at `i64::MAX`.
#[must_use]
pub fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Expiration instant for a token issued at `issued_at` living for `ttl`.
#[must_use]
pub fn expires_at(issued_at: i64, ttl: Duration) -> i64 {
    issued_at.saturating_add(duration_secs(ttl))
}

/// Not-before instant for a token issued at `issued_at` that becomes valid
/// after `delay`.
#[must_use]
pub fn not_before(issued_at: i64, delay: Duration) -> i64 {
    issued_at.saturating_add(duration_secs(delay))
}

/// Last instant (inclusive) at which something expiring at `expires_at` is
/// still accepted under `tolerance`.
#[must_use]
pub fn retention_deadline(expires_at: i64, tolerance: Duration) -> i64 {
    expires_at.saturating_add(duration_secs(tolerance))
}

/// Whether an instant expiring at `expires_at` is still live at `now`,
/// allowing `tolerance` of clock skew past expiration.
#[must_use]
pub fn is_live_at(expires_at: i64, tolerance: Duration, now: i64) -> bool {
    now <= retention_deadline(expires_at, tolerance)
}

/// Parse a timespan such as `"3600"`, `"90s"`, `"1 min"`, `"2 hours"` or
/// `"1d 12h"`.
///
/// A bare number is seconds; anything else goes to [`humantime`].
///
/// # Errors
///
/// Returns `TimespanError` when the input is empty or not a valid duration.
pub fn parse_timespan(input: &str) -> Result<Duration, TimespanError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimespanError::Empty);
    }

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(trimmed).map_err(|e| TimespanError::Invalid {
        input: trimmed.to_string(),
        reason: e.to_string(),
    })
}
