//! In-memory message adapter.
//!
//! Messages the client holds before persistence. They share the row content
//! format but may lack an id and a timestamp, so identity falls back to the
//! caller-supplied position.

use serde::{Deserialize, Serialize};
use threadline_core::{now_millis, MessageId, SessionId, Timestamp};

use super::log_reject;
use super::parts::{expand_content, PartContext, RowContent};
use crate::types::{CanonicalEvent, Role, Source};

/// A not-yet-persisted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMessage {
    /// Client id, when assigned.
    #[serde(default)]
    pub id: Option<String>,
    /// Owning session.
    pub session_id: String,
    /// Speaker.
    pub role: Role,
    /// Plain text or content parts.
    pub content: RowContent,
    /// Creation time, when known.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Turn this message belongs to.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Call answered by a tool message.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl MemoryMessage {
    /// Plain-text message with no id or timestamp.
    pub fn text(session_id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            role,
            content: RowContent::Text(text.into()),
            created_at: None,
            message_id: None,
            tool_call_id: None,
        }
    }
}

/// Adapt one message at position `index` of the caller's list.
pub fn adapt_memory_message(msg: &MemoryMessage, index: usize) -> Vec<CanonicalEvent> {
    let base_id = msg
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("mem_{}_{index}", msg.session_id));
    let created_at = msg
        .created_at
        .as_ref()
        .and_then(Timestamp::to_millis)
        .unwrap_or_else(now_millis);
    let session_id = SessionId::from(msg.session_id.as_str());
    let message_id = msg
        .message_id
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(MessageId::from);

    let ctx = PartContext {
        base_id: &base_id,
        session_id: &session_id,
        role: msg.role,
        created_at,
        source: Source::Memory,
        message_id: message_id.as_ref(),
        tool_call_id: msg.tool_call_id.as_deref().filter(|t| !t.is_empty()),
    };
    expand_content(&ctx, &msg.content).unwrap_or_else(|reason| {
        log_reject(reason, Some(&msg.session_id), &format!("message {base_id}"));
        Vec::new()
    })
}

/// Adapt a list of messages, indexing them by position.
pub fn adapt_memory_messages(messages: &[MemoryMessage]) -> Vec<CanonicalEvent> {
    messages
        .iter()
        .enumerate()
        .flat_map(|(index, msg)| adapt_memory_message(msg, index))
        .collect()
}
