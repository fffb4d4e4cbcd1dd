//! Timestamp normalization.
//!
//! Sources disagree on how they send time: the push channel sends epoch
//! milliseconds, database rows often carry epoch seconds or RFC 3339
//! strings. [`Timestamp`] accepts all of them and [`Timestamp::to_millis`]
//! normalizes to integer epoch milliseconds, the unit timeline ordering uses.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Epoch values below this are interpreted as seconds, not milliseconds.
///
/// `10^11` milliseconds is March 1973; `10^11` seconds is year 5138.
pub const SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// A raw timestamp as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Integer epoch value (seconds or milliseconds).
    Integer(i64),
    /// Fractional epoch value (seconds or milliseconds).
    Float(f64),
    /// RFC 3339 / ISO 8601 string.
    Text(String),
}

impl Timestamp {
    /// Normalize to epoch milliseconds.
    ///
    /// Returns `None` for strings that are neither RFC 3339 nor numeric, and
    /// for non-finite floats.
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(scale_epoch(*n)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => {
                if !f.is_finite() {
                    return None;
                }
                if f.abs() < SECONDS_THRESHOLD as f64 {
                    Some((f * 1000.0).round() as i64)
                } else {
                    Some(f.round() as i64)
                }
            }
            Self::Text(s) => parse_text(s),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

fn scale_epoch(n: i64) -> i64 {
    if n.abs() < SECONDS_THRESHOLD {
        n.saturating_mul(1000)
    } else {
        n
    }
}

fn parse_text(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp_millis());
    }
    // SQLite's `datetime('now')` format: "2025-01-02 03:04:05"
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    trimmed.parse::<i64>().ok().map(scale_epoch)
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
