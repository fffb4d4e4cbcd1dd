//! Live-push adapter.
//!
//! The push channel sends one JSON envelope per event. [`LiveEnvelope::decode`]
//! pulls the common header out (session, message and origin ids, timestamp)
//! and classifies the payload into a [`LiveEvent`]; [`LiveAdapter`] maps that
//! onto zero or one [`CanonicalEvent`].

use serde_json::Value;
use threadline_core::{now_millis, EventId, MessageId, SessionId, Timestamp, ToolCallId};
use threadline_settings::LiveSettings;
use tracing::trace;

use super::tool_result::normalize_tool_result;
use super::{log_reject, parse_json_like, str_field};
use crate::errors::RejectReason;
use crate::types::{
    CanonicalEvent, Checkpoint, CompletionReason, EventBody, Role, Source, ToolCall,
};

/// Status value that marks the session idle unless configured otherwise.
pub const DEFAULT_IDLE_STATUS: &str = "idle";

/// Payload of a live envelope, classified by its type tag.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent {
    /// `chunk` / `message_chunk`.
    Chunk {
        /// Incremental text.
        delta: Option<String>,
        /// Complete text, when the sender already has it.
        content: Option<String>,
    },
    /// `message`.
    Message {
        /// Complete text.
        content: Option<String>,
    },
    /// `done` / `message_done`.
    Done,
    /// `agent_status`.
    AgentStatus {
        /// Reported status string.
        status: Option<String>,
    },
    /// `tool_call`; `call` is `data.tool_call` when present.
    ToolCall {
        /// Raw call object.
        call: Option<Value>,
    },
    /// `tool_result`; normalized by the strategy chain.
    ToolResult {
        /// The envelope's `data` object.
        data: Value,
    },
    /// `checkpoint`.
    Checkpoint {
        /// The envelope's `data` object.
        data: Value,
    },
    /// Any other tag.
    Unrecognized {
        /// The tag as sent.
        tag: String,
    },
}

/// A decoded live envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveEnvelope {
    /// Type tag as sent.
    pub tag: String,
    /// Owning session.
    pub session_id: Option<String>,
    /// Turn the event belongs to.
    pub message_id: Option<String>,
    /// Event id supplied by the sender.
    pub origin_id: Option<String>,
    /// Timestamp as sent.
    pub timestamp: Option<Timestamp>,
    /// Classified payload.
    pub event: LiveEvent,
}

impl LiveEnvelope {
    /// Decode a raw envelope.
    ///
    /// Fails only when the payload is not an object or carries no type tag;
    /// unknown tags decode to [`LiveEvent::Unrecognized`].
    pub fn decode(raw: &Value) -> Result<Self, RejectReason> {
        if !raw.is_object() {
            return Err(RejectReason::MalformedEnvelope);
        }
        let tag = str_field(raw, &["type", "event_type"])
            .ok_or(RejectReason::MalformedEnvelope)?
            .to_string();
        let data = raw.get("data").filter(|d| d.is_object());

        // Text fields may sit inside `data` or at the top level.
        let text = |keys: &[&str]| -> Option<String> {
            data.and_then(|d| str_field(d, keys))
                .or_else(|| str_field(raw, keys))
                .map(String::from)
        };

        let event = match tag.as_str() {
            "chunk" | "message_chunk" => LiveEvent::Chunk {
                delta: text(&["delta"]),
                content: text(&["content"]),
            },
            "message" => LiveEvent::Message {
                content: text(&["content", "text"]),
            },
            "done" | "message_done" => LiveEvent::Done,
            "agent_status" => LiveEvent::AgentStatus {
                status: text(&["status"]),
            },
            "tool_call" => LiveEvent::ToolCall {
                call: data
                    .and_then(|d| d.get("tool_call").or_else(|| d.get("toolCall")))
                    .filter(|c| c.is_object())
                    .cloned(),
            },
            "tool_result" => LiveEvent::ToolResult {
                data: data.cloned().unwrap_or(Value::Null),
            },
            "checkpoint" => LiveEvent::Checkpoint {
                data: data.cloned().unwrap_or(Value::Null),
            },
            _ => LiveEvent::Unrecognized { tag: tag.clone() },
        };

        let timestamp = ["timestamp", "createdAt", "created_at"]
            .iter()
            .find_map(|k| raw.get(*k))
            .or_else(|| data.and_then(|d| d.get("timestamp")))
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<Timestamp>(v.clone()).ok());

        Ok(Self {
            tag,
            session_id: str_field(raw, &["sessionId", "session_id"]).map(String::from),
            message_id: str_field(raw, &["messageId", "message_id"]).map(String::from),
            origin_id: str_field(raw, &["id", "eventId", "event_id"]).map(String::from),
            timestamp,
            event,
        })
    }

    /// Epoch milliseconds for this envelope; now when absent or unparseable.
    pub fn created_at(&self) -> i64 {
        self.timestamp
            .as_ref()
            .and_then(Timestamp::to_millis)
            .unwrap_or_else(now_millis)
    }
}

/// Maps live envelopes onto canonical events.
#[derive(Clone, Debug)]
pub struct LiveAdapter {
    idle_status: String,
}

impl Default for LiveAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_STATUS)
    }
}

impl LiveAdapter {
    /// Adapter that treats `idle_status` as the idle sentinel.
    pub fn new(idle_status: impl Into<String>) -> Self {
        Self {
            idle_status: idle_status.into(),
        }
    }

    /// Adapter configured from the `live` settings section.
    pub fn from_settings(settings: &LiveSettings) -> Self {
        Self::new(settings.idle_status.clone())
    }

    /// The configured idle sentinel.
    pub fn idle_status(&self) -> &str {
        &self.idle_status
    }

    /// Adapt one envelope, logging and dropping shape mismatches.
    pub fn adapt(&self, raw: &Value) -> Option<CanonicalEvent> {
        match self.try_adapt(raw) {
            Ok(event) => event,
            Err(reason) => {
                log_reject(
                    reason,
                    str_field(raw, &["sessionId", "session_id"]),
                    str_field(raw, &["type", "event_type"]).unwrap_or("<untagged>"),
                );
                None
            }
        }
    }

    /// Adapt one envelope.
    ///
    /// `Ok(None)` means the envelope was understood but produces no event
    /// (a non-idle status update).
    pub fn try_adapt(&self, raw: &Value) -> Result<Option<CanonicalEvent>, RejectReason> {
        let envelope = LiveEnvelope::decode(raw)?;
        if let LiveEvent::Unrecognized { .. } = envelope.event {
            return Err(RejectReason::UnrecognizedType);
        }
        let session_id = envelope
            .session_id
            .as_deref()
            .map(SessionId::from)
            .ok_or(RejectReason::MissingSessionId)?;
        let created_at = envelope.created_at();
        let message_id = envelope.message_id.as_deref().map(MessageId::from);
        let origin_id = envelope.origin_id.clone();

        let event = |id: EventId, role: Role, body: EventBody| {
            CanonicalEvent::new(id, session_id.clone(), role, created_at, Source::Live, body)
                .with_message_id(message_id.clone())
        };
        let origin_or_fresh = || {
            origin_id
                .as_deref()
                .map_or_else(EventId::generate, EventId::from)
        };

        let adapted = match envelope.event {
            LiveEvent::Chunk {
                content: Some(text),
                ..
            } => {
                // Complete content promotes the chunk. The promoted message
                // gets its own identity so it never collides with the
                // fragments already streamed under the origin id.
                event(
                    EventId::generate(),
                    Role::Assistant,
                    EventBody::Message { text },
                )
            }
            LiveEvent::Chunk {
                delta: Some(delta),
                content: None,
            } => event(origin_or_fresh(), Role::Assistant, EventBody::Chunk { delta })
                .with_origin_id(origin_id.clone()),
            LiveEvent::Chunk { .. } => return Err(RejectReason::EmptyChunk),

            LiveEvent::Message { content } => {
                let text = content.ok_or(RejectReason::MissingContent)?;
                event(origin_or_fresh(), Role::Assistant, EventBody::Message { text })
                    .with_origin_id(origin_id.clone())
            }

            LiveEvent::Done => event(
                origin_or_fresh(),
                Role::Assistant,
                EventBody::CompletionSignal {
                    reason: CompletionReason::Done,
                },
            )
            .with_origin_id(origin_id.clone()),

            LiveEvent::AgentStatus { status } => {
                if status.as_deref() != Some(self.idle_status.as_str()) {
                    trace!(
                        session_id = %session_id,
                        status = status.as_deref().unwrap_or(""),
                        "agent status ignored"
                    );
                    return Ok(None);
                }
                event(
                    origin_or_fresh(),
                    Role::Assistant,
                    EventBody::CompletionSignal {
                        reason: CompletionReason::Idle,
                    },
                )
                .with_origin_id(origin_id.clone())
            }

            LiveEvent::ToolCall { call } => {
                let call = call.ok_or(RejectReason::MissingToolCall)?;
                let name = str_field(&call, &["name"])
                    .ok_or(RejectReason::MissingToolName)?
                    .to_string();
                let call_id = str_field(&call, &["id"])
                    .or(origin_id.as_deref())
                    .map_or_else(ToolCallId::generate, ToolCallId::from);
                let arguments = match call.get("arguments").or_else(|| call.get("input")) {
                    Some(Value::String(s)) => parse_json_like(s),
                    Some(other) => other.clone(),
                    None => Value::Null,
                };
                event(
                    origin_or_fresh(),
                    Role::Assistant,
                    EventBody::ToolCall(ToolCall {
                        call_id,
                        name,
                        arguments,
                    }),
                )
                .with_origin_id(origin_id.clone())
            }

            LiveEvent::ToolResult { data } => {
                let result = normalize_tool_result(&data)?;
                event(origin_or_fresh(), Role::Tool, EventBody::ToolResult(result))
                    .with_origin_id(origin_id.clone())
            }

            LiveEvent::Checkpoint { data } => {
                let checkpoint: Checkpoint =
                    serde_json::from_value(data).map_err(|_| RejectReason::MalformedCheckpoint)?;
                event(
                    origin_or_fresh(),
                    Role::Assistant,
                    EventBody::Checkpoint(checkpoint),
                )
                .with_origin_id(origin_id.clone())
            }

            LiveEvent::Unrecognized { .. } => return Err(RejectReason::UnrecognizedType),
        };
        Ok(Some(adapted))
    }
}

/// Adapt one envelope with the default idle sentinel.
pub fn adapt_live(raw: &Value) -> Option<CanonicalEvent> {
    LiveAdapter::default().adapt(raw)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
