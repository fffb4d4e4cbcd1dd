//! Derived render views over a canonical sequence.
//!
//! Nothing here is stored. [`ToolInteraction`]s are recomputed from the
//! canonical events on every render request, so they cannot drift from them.

use serde::{Deserialize, Serialize};
use threadline_core::{EventId, MessageId};

use super::event::CanonicalEvent;
use super::payloads::{ToolCall, ToolResult};

/// Lifecycle of a tool interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    /// No result yet.
    Running,
    /// Result arrived and reports success.
    Completed,
    /// Result arrived and reports failure.
    Failed,
}

/// A tool call joined with its result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInteraction {
    /// The call. A stub named `"unknown"` when only the result was seen.
    pub call: ToolCall,
    /// The result, if one has arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    /// Derived status.
    pub status: InteractionStatus,
    /// Event that carried the call (the result's event for stub calls).
    pub call_event_id: EventId,
    /// Event that carried the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_event_id: Option<EventId>,
    /// Turn that issued the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Timeline position (the call's timestamp, or the result's for stubs).
    pub created_at: i64,
    /// True when `call` was synthesized because no call event was seen.
    pub synthesized_call: bool,
}

impl ToolInteraction {
    /// Status implied by an optional result.
    pub fn status_for(result: Option<&ToolResult>) -> InteractionStatus {
        match result {
            None => InteractionStatus::Running,
            Some(r) if r.is_failure() => InteractionStatus::Failed,
            Some(_) => InteractionStatus::Completed,
        }
    }
}

/// One renderable timeline row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// Any non-tool event, passed through unchanged.
    Event(CanonicalEvent),
    /// A paired (or orphaned) tool call/result.
    ToolInteraction(ToolInteraction),
}

impl TimelineEntry {
    /// Timeline position of this entry.
    pub fn created_at(&self) -> i64 {
        match self {
            Self::Event(ev) => ev.created_at,
            Self::ToolInteraction(ti) => ti.created_at,
        }
    }

    /// The interaction, if this entry is one.
    pub fn as_interaction(&self) -> Option<&ToolInteraction> {
        match self {
            Self::ToolInteraction(ti) => Some(ti),
            Self::Event(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(ok: bool, error: Option<&str>) -> ToolResult {
        ToolResult {
            tool_call_id: "call_1".into(),
            content: json!("out"),
            ok,
            error: error.map(String::from),
        }
    }

    #[test]
    fn status_derivation() {
        assert_eq!(ToolInteraction::status_for(None), InteractionStatus::Running);
        assert_eq!(
            ToolInteraction::status_for(Some(&result(true, None))),
            InteractionStatus::Completed
        );
        assert_eq!(
            ToolInteraction::status_for(Some(&result(false, None))),
            InteractionStatus::Failed
        );
        assert_eq!(
            ToolInteraction::status_for(Some(&result(true, Some("exit 1")))),
            InteractionStatus::Failed
        );
    }
}
