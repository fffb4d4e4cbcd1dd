//! Source adapters: raw payloads → canonical events.
//!
//! Each adapter is a pure function over one raw payload:
//!
//! - [`live`]: push-channel envelopes, zero or one event each.
//! - [`stored`]: relational rows, one event per content part.
//! - [`memory`]: not-yet-persisted messages, identity from a caller index.
//!
//! Shape mismatches are logged with a [`RejectReason`] code and dropped.
//! The `try_*` variants return the reason instead so callers can count them.

pub mod live;
pub mod memory;
mod parts;
pub mod stored;
pub mod tool_result;

pub use live::{adapt_live, LiveAdapter, LiveEnvelope, LiveEvent};
pub use memory::{adapt_memory_message, adapt_memory_messages, MemoryMessage};
pub use parts::{ContentPart, RowContent};
pub use stored::{adapt_row, adapt_row_value, try_adapt_row, try_adapt_row_value, StoredRow};
pub use tool_result::{normalize_tool_result, RESULT_STRATEGIES};

use serde_json::Value;
use tracing::warn;

use crate::errors::RejectReason;

/// Log a dropped payload. Never fails, never panics.
pub(crate) fn log_reject(reason: RejectReason, session_id: Option<&str>, detail: &str) {
    warn!(
        reason = reason.code(),
        session_id,
        detail,
        "dropped payload: shape mismatch"
    );
}

/// Best-effort JSON parse of strings that look like an object or array.
///
/// Anything else, including invalid JSON, comes back as a JSON string.
pub fn parse_json_like(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            return parsed;
        }
    }
    Value::String(raw.to_string())
}

/// First string found under any of `keys`.
pub(crate) fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| {
        value
            .get(*k)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    })
}
