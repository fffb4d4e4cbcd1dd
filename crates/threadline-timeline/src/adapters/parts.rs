//! Content-part expansion shared by the stored-row and in-memory adapters.
//!
//! A message body is either a plain string or an array of rich parts. A
//! string becomes one event keyed by the message id; an array becomes one
//! event per part keyed `"{id}:{index}"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_core::{MessageId, SessionId};

use super::{log_reject, parse_json_like};
use crate::errors::RejectReason;
use crate::types::{
    CanonicalEvent, Checkpoint, CheckpointPhase, CheckpointStats, EventBody, Role, Source,
    ToolCall, ToolResult,
};

/// Body of a stored or in-memory message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowContent {
    /// Plain text (or, for tool rows, the raw result).
    Text(String),
    /// Rich parts, decoded one by one so a bad part only drops itself.
    Parts(Vec<Value>),
}

/// One rich content part.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text block.
    Text {
        /// Block text.
        text: String,
    },
    /// Tool invocation block.
    #[serde(alias = "tool_use")]
    ToolCall {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
        /// Arguments (`input` in some shapes).
        #[serde(default, alias = "input")]
        arguments: Value,
    },
    /// Tool outcome block.
    ToolResult {
        /// Call this answers.
        #[serde(alias = "toolCallId", alias = "tool_use_id")]
        tool_call_id: String,
        /// Result content.
        #[serde(default)]
        content: Value,
        /// Error flag used by some shapes.
        #[serde(default, alias = "isError")]
        is_error: Option<bool>,
        /// Success flag used by other shapes.
        #[serde(default)]
        ok: Option<bool>,
        /// Error text.
        #[serde(default)]
        error: Option<String>,
    },
    /// Persisted checkpoint.
    Checkpoint {
        /// Boundary marked.
        phase: CheckpointPhase,
        /// Commit hash, once attached.
        #[serde(default, alias = "commitHash")]
        commit_hash: Option<String>,
        /// Change statistics.
        #[serde(default)]
        stats: CheckpointStats,
    },
    /// Any part type this engine does not render.
    #[serde(other)]
    Unknown,
}

/// Identity and metadata shared by every event expanded from one message.
pub(crate) struct PartContext<'a> {
    pub base_id: &'a str,
    pub session_id: &'a SessionId,
    pub role: Role,
    pub created_at: i64,
    pub source: Source,
    pub message_id: Option<&'a MessageId>,
    pub tool_call_id: Option<&'a str>,
}

impl PartContext<'_> {
    fn event(&self, id: String, role: Role, body: EventBody) -> CanonicalEvent {
        CanonicalEvent::new(
            id,
            self.session_id.clone(),
            role,
            self.created_at,
            self.source,
            body,
        )
        .with_message_id(self.message_id.cloned())
    }
}

/// Expand a message body into canonical events.
pub(crate) fn expand_content(
    ctx: &PartContext<'_>,
    content: &RowContent,
) -> Result<Vec<CanonicalEvent>, RejectReason> {
    match content {
        RowContent::Text(text) => expand_text(ctx, text).map(|ev| vec![ev]),
        RowContent::Parts(parts) if parts.is_empty() => Err(RejectReason::MissingContent),
        RowContent::Parts(parts) => Ok(parts
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| expand_part(ctx, index, raw))
            .collect()),
    }
}

fn expand_text(ctx: &PartContext<'_>, text: &str) -> Result<CanonicalEvent, RejectReason> {
    let id = ctx.base_id.to_string();
    if ctx.role == Role::Tool || ctx.tool_call_id.is_some() {
        let tool_call_id = ctx
            .tool_call_id
            .filter(|id| !id.is_empty())
            .ok_or(RejectReason::MissingToolCallId)?;
        return Ok(ctx.event(
            id,
            Role::Tool,
            EventBody::ToolResult(ToolResult {
                tool_call_id: tool_call_id.into(),
                content: parse_json_like(text),
                ok: true,
                error: None,
            }),
        ));
    }
    Ok(ctx.event(
        id,
        ctx.role,
        EventBody::Message {
            text: text.to_string(),
        },
    ))
}

fn expand_part(ctx: &PartContext<'_>, index: usize, raw: &Value) -> Option<CanonicalEvent> {
    let id = format!("{}:{index}", ctx.base_id);
    let part = match serde_json::from_value::<ContentPart>(raw.clone()) {
        Ok(part) => part,
        Err(e) => {
            log_reject(
                RejectReason::MalformedRow,
                Some(ctx.session_id.as_str()),
                &format!("part {id}: {e}"),
            );
            return None;
        }
    };

    let event = match part {
        ContentPart::Text { text } => ctx.event(id, ctx.role, EventBody::Message { text }),
        ContentPart::ToolCall {
            id: call_id,
            name,
            arguments,
        } => {
            let owner = ctx
                .message_id
                .cloned()
                .unwrap_or_else(|| MessageId::from(ctx.base_id));
            let arguments = match arguments {
                Value::String(s) => parse_json_like(&s),
                other => other,
            };
            ctx.event(
                id,
                Role::Assistant,
                EventBody::ToolCall(ToolCall {
                    call_id: call_id.into(),
                    name,
                    arguments,
                }),
            )
            .with_message_id(Some(owner))
        }
        ContentPart::ToolResult {
            tool_call_id,
            content,
            is_error,
            ok,
            error,
        } => {
            let content = match content {
                Value::String(s) => parse_json_like(&s),
                Value::Array(items) => items
                    .first()
                    .and_then(|b| b.get("text"))
                    .and_then(Value::as_str)
                    .map_or(Value::Array(items.clone()), parse_json_like),
                other => other,
            };
            let ok = ok.unwrap_or(!is_error.unwrap_or(false));
            ctx.event(
                id,
                Role::Tool,
                EventBody::ToolResult(ToolResult {
                    tool_call_id: tool_call_id.into(),
                    content,
                    ok,
                    error,
                }),
            )
        }
        ContentPart::Checkpoint {
            phase,
            commit_hash,
            stats,
        } => ctx.event(
            id,
            ctx.role,
            EventBody::Checkpoint(Checkpoint {
                phase,
                commit_hash,
                stats,
            }),
        ),
        ContentPart::Unknown => {
            log_reject(
                RejectReason::UnknownContentPart,
                Some(ctx.session_id.as_str()),
                &id,
            );
            return None;
        }
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(session: &'a SessionId, role: Role, tool_call_id: Option<&'a str>) -> PartContext<'a> {
        PartContext {
            base_id: "r1",
            session_id: session,
            role,
            created_at: 100,
            source: Source::Stored,
            message_id: None,
            tool_call_id,
        }
    }

    #[test]
    fn parts_get_indexed_ids() {
        let session = SessionId::from("s1");
        let content = RowContent::Parts(vec![
            json!({"type": "text", "text": "Running ls"}),
            json!({"type": "tool_use", "id": "call_1", "name": "bash", "input": {"cmd": "ls"}}),
        ]);
        let events = expand_content(&ctx(&session, Role::Assistant, None), &content).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_str(), "r1:0");
        assert_eq!(events[1].id.as_str(), "r1:1");
        let call = events[1].as_tool_call().unwrap();
        assert_eq!(call.call_id.as_str(), "call_1");
        assert_eq!(call.arguments, json!({"cmd": "ls"}));
        // Calls without an explicit turn are owned by their row.
        assert_eq!(events[1].message_id.as_deref(), Some("r1"));
    }

    #[test]
    fn unknown_part_dropped_others_kept() {
        let session = SessionId::from("s1");
        let content = RowContent::Parts(vec![
            json!({"type": "image", "source": "..."}),
            json!({"type": "text", "text": "caption"}),
        ]);
        let events = expand_content(&ctx(&session, Role::User, None), &content).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_str(), "r1:1");
    }

    #[test]
    fn malformed_known_part_dropped() {
        let session = SessionId::from("s1");
        let content = RowContent::Parts(vec![json!({"type": "tool_call", "name": "bash"})]);
        let events = expand_content(&ctx(&session, Role::Assistant, None), &content).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn tool_result_part_error_flag() {
        let session = SessionId::from("s1");
        let content = RowContent::Parts(vec![json!({
            "type": "tool_result",
            "tool_use_id": "call_1",
            "content": [{"type": "text", "text": "permission denied"}],
            "is_error": true
        })]);
        let events = expand_content(&ctx(&session, Role::Tool, None), &content).unwrap();
        let result = events[0].as_tool_result().unwrap();
        assert!(!result.ok);
        assert_eq!(result.content, json!("permission denied"));
    }

    #[test]
    fn empty_parts_rejected() {
        let session = SessionId::from("s1");
        let err = expand_content(&ctx(&session, Role::User, None), &RowContent::Parts(vec![]))
            .unwrap_err();
        assert_eq!(err, RejectReason::MissingContent);
    }

    #[test]
    fn tool_text_without_call_id_rejected() {
        let session = SessionId::from("s1");
        let err = expand_content(
            &ctx(&session, Role::Tool, None),
            &RowContent::Text("ok".into()),
        )
        .unwrap_err();
        assert_eq!(err, RejectReason::MissingToolCallId);
    }

    #[test]
    fn checkpoint_part() {
        let session = SessionId::from("s1");
        let content = RowContent::Parts(vec![json!({
            "type": "checkpoint",
            "phase": "end",
            "commit_hash": "abc123",
            "stats": {"files_changed": 1, "lines_added": 4, "file_list": ["a.rs"]}
        })]);
        let events = expand_content(&ctx(&session, Role::Assistant, None), &content).unwrap();
        let cp = events[0].as_checkpoint().unwrap();
        assert_eq!(cp.commit(), Some("abc123"));
        assert_eq!(cp.stats.lines_added, 4);
        assert_eq!(cp.stats.file_list, vec!["a.rs".to_string()]);
    }
}
