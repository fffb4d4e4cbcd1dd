//! Relational-row adapter.
//!
//! One persisted message row expands into one event per content part. Rows
//! carry no origin id; their identity is the row id (plus part index).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_core::{MessageId, SessionId, Timestamp};

use super::log_reject;
use super::parts::{expand_content, PartContext, RowContent};
use crate::errors::RejectReason;
use crate::types::{CanonicalEvent, Role, Source};

/// A persisted message row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Row id.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// `user`, `assistant` or `tool`.
    pub role: String,
    /// Plain text or an array of content parts.
    pub content: RowContent,
    /// Epoch seconds, epoch milliseconds or a datetime string.
    pub created_at: Timestamp,
    /// Turn the row belongs to.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Call answered by a tool row.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

/// Adapt a decoded row.
pub fn try_adapt_row(row: &StoredRow) -> Result<Vec<CanonicalEvent>, RejectReason> {
    if row.id.trim().is_empty() {
        return Err(RejectReason::MalformedRow);
    }
    if row.session_id.trim().is_empty() {
        return Err(RejectReason::MissingSessionId);
    }
    let role = Role::parse(&row.role).ok_or(RejectReason::UnknownRole)?;
    let created_at = row
        .created_at
        .to_millis()
        .ok_or(RejectReason::InvalidTimestamp)?;

    let session_id = SessionId::from(row.session_id.as_str());
    let message_id = row
        .message_id
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(MessageId::from);
    let ctx = PartContext {
        base_id: &row.id,
        session_id: &session_id,
        role,
        created_at,
        source: Source::Stored,
        message_id: message_id.as_ref(),
        tool_call_id: row.tool_call_id.as_deref().filter(|t| !t.is_empty()),
    };
    expand_content(&ctx, &row.content)
}

/// Adapt a decoded row, logging and dropping it on mismatch.
pub fn adapt_row(row: &StoredRow) -> Vec<CanonicalEvent> {
    try_adapt_row(row).unwrap_or_else(|reason| {
        log_reject(reason, Some(&row.session_id), &format!("row {}", row.id));
        Vec::new()
    })
}

/// Decode and adapt a raw row object.
pub fn try_adapt_row_value(raw: &Value) -> Result<Vec<CanonicalEvent>, RejectReason> {
    let row: StoredRow =
        serde_json::from_value(raw.clone()).map_err(|_| RejectReason::MalformedRow)?;
    try_adapt_row(&row)
}

/// Decode and adapt a raw row object, logging and dropping it on mismatch.
pub fn adapt_row_value(raw: &Value) -> Vec<CanonicalEvent> {
    try_adapt_row_value(raw).unwrap_or_else(|reason| {
        let session_id = raw.get("session_id").and_then(Value::as_str);
        let id = raw.get("id").and_then(Value::as_str).unwrap_or("<no id>");
        log_reject(reason, session_id, &format!("row {id}"));
        Vec::new()
    })
}
