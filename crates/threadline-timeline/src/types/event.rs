//! The [`CanonicalEvent`] struct: one normalized timeline fact.

use serde::{Deserialize, Serialize};
use threadline_core::{EventId, MessageId, SessionId};

use super::kind::{EventKind, Role, Source};
use super::payloads::{Checkpoint, CompletionReason, ToolCall, ToolResult};

/// Kind-specific event payload.
///
/// The variant *is* the event kind, so kind and payload cannot disagree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventBody {
    /// Complete message text.
    Message {
        /// Full text.
        text: String,
    },
    /// Streaming fragment.
    Chunk {
        /// Text appended by this fragment.
        delta: String,
    },
    /// Tool invocation.
    ToolCall(ToolCall),
    /// Tool outcome.
    ToolResult(ToolResult),
    /// Turn finished or session idle.
    CompletionSignal {
        /// What completed.
        reason: CompletionReason,
    },
    /// Version-control save point.
    Checkpoint(Checkpoint),
}

impl EventBody {
    /// The kind discriminator for this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::Chunk { .. } => EventKind::Chunk,
            Self::ToolCall(_) => EventKind::ToolCall,
            Self::ToolResult(_) => EventKind::ToolResult,
            Self::CompletionSignal { .. } => EventKind::CompletionSignal,
            Self::Checkpoint(_) => EventKind::Checkpoint,
        }
    }
}

/// A normalized, source-agnostic timeline event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    /// Unique within the session (chunks excepted).
    pub id: EventId,
    /// Conversation this event belongs to.
    pub session_id: SessionId,
    /// Speaker.
    pub role: Role,
    /// Epoch milliseconds; the session's total order after merge.
    pub created_at: i64,
    /// Where the event came from.
    pub source: Source,
    /// True while a chunk has not been finalized.
    pub partial: bool,
    /// Turn this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Event id the origin supplied, if any. Preferred dedup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    /// Kind-specific payload.
    pub body: EventBody,
}

impl CanonicalEvent {
    /// Create an event with no message id and no origin id.
    ///
    /// `partial` starts `true` for chunks and `false` for everything else.
    pub fn new(
        id: impl Into<EventId>,
        session_id: impl Into<SessionId>,
        role: Role,
        created_at: i64,
        source: Source,
        body: EventBody,
    ) -> Self {
        let partial = matches!(body, EventBody::Chunk { .. });
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role,
            created_at,
            source,
            partial,
            message_id: None,
            origin_id: None,
            body,
        }
    }

    /// Set the owning message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Option<MessageId>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Set the origin-supplied event id.
    #[must_use]
    pub fn with_origin_id(mut self, origin_id: Option<String>) -> Self {
        self.origin_id = origin_id.filter(|id| !id.is_empty());
        self
    }

    /// Event kind, derived from the body.
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// Tool call payload, if this is a `tool_call`.
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match &self.body {
            EventBody::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    /// Tool result payload, if this is a `tool_result`.
    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match &self.body {
            EventBody::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    /// Checkpoint payload, if this is a `checkpoint`.
    pub fn as_checkpoint(&self) -> Option<&Checkpoint> {
        match &self.body {
            EventBody::Checkpoint(cp) => Some(cp),
            _ => None,
        }
    }

    /// Mutable checkpoint payload, if this is a `checkpoint`.
    pub fn as_checkpoint_mut(&mut self) -> Option<&mut Checkpoint> {
        match &mut self.body {
            EventBody::Checkpoint(cp) => Some(cp),
            _ => None,
        }
    }
}
