//! Tool result normalization.
//!
//! Push payloads report tool results in several nesting shapes. Each shape
//! is one extraction strategy; [`RESULT_STRATEGIES`] is tried in order and
//! the first match wins. Supporting a new shape means adding one function
//! and one table entry.

use serde_json::Value;
use tracing::trace;

use super::{parse_json_like, str_field};
use crate::errors::RejectReason;
use crate::types::ToolResult;

/// What a strategy pulled out of the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Extracted {
    /// Raw result content (strings are parsed later).
    pub content: Value,
    /// Call id, when the shape carries one of its own.
    pub tool_call_id: Option<String>,
}

/// A strategy inspects the `data` object and either claims it or passes.
pub type Strategy = fn(&Value) -> Option<Extracted>;

/// Extraction strategies in priority order.
pub const RESULT_STRATEGIES: &[(&str, Strategy)] = &[
    ("direct_output", direct_output),
    ("tool_use_object", tool_use_object),
    ("content_array", content_array),
    ("bare_result", bare_result),
];

/// `data.output` is a plain string.
fn direct_output(data: &Value) -> Option<Extracted> {
    let output = data.get("output")?.as_str()?;
    Some(Extracted {
        content: Value::String(output.to_string()),
        tool_call_id: None,
    })
}

/// `data.result` is an object carrying its own `tool_use_id`.
fn tool_use_object(data: &Value) -> Option<Extracted> {
    let result = data.get("result")?;
    let tool_use_id = result.as_object()?.get("tool_use_id")?.as_str()?;
    let content = match result.get("content") {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Array(items)) => first_text(items).map_or_else(
            || Value::Array(items.clone()),
            |t| Value::String(t.to_string()),
        ),
        Some(Value::Null) | None => result.clone(),
        Some(other) => other.clone(),
    };
    Some(Extracted {
        content,
        tool_call_id: Some(tool_use_id.to_string()),
    })
}

/// A content array whose first element carries `text`.
fn content_array(data: &Value) -> Option<Extracted> {
    let items = data
        .get("content")
        .and_then(Value::as_array)
        .or_else(|| data.get("result")?.get("content")?.as_array())?;
    let text = items.first()?.get("text")?.as_str()?;
    Some(Extracted {
        content: Value::String(text.to_string()),
        tool_call_id: None,
    })
}

/// Anything under `data.result`.
fn bare_result(data: &Value) -> Option<Extracted> {
    let result = data.get("result").filter(|v| !v.is_null())?;
    Some(Extracted {
        content: result.clone(),
        tool_call_id: None,
    })
}

fn first_text(items: &[Value]) -> Option<&str> {
    items.first()?.get("text")?.as_str()
}

/// Normalize a live `tool_result` `data` object into a [`ToolResult`].
///
/// - content: first matching strategy; JSON-looking strings are parsed
/// - call id: the strategy's own, else `tool_call_id`/`toolCallId`/`tool_use_id`
/// - ok: `success`, else `ok`, else `true`
/// - error: `error` when present (non-strings are stringified)
pub fn normalize_tool_result(data: &Value) -> Result<ToolResult, RejectReason> {
    let (strategy, extracted) = RESULT_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(data).map(|e| (*name, e)))
        .ok_or(RejectReason::UnrecognizedToolResult)?;
    trace!(strategy, "tool result shape matched");

    let tool_call_id = extracted
        .tool_call_id
        .or_else(|| {
            str_field(data, &["tool_call_id", "toolCallId", "tool_use_id"]).map(String::from)
        })
        .ok_or(RejectReason::MissingToolCallId)?;

    let content = match extracted.content {
        Value::String(s) => parse_json_like(&s),
        other => other,
    };

    let ok = data
        .get("success")
        .and_then(Value::as_bool)
        .or_else(|| data.get("ok").and_then(Value::as_bool))
        .unwrap_or(true);

    let error = match data.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(ToolResult {
        tool_call_id: tool_call_id.into(),
        content,
        ok,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn direct_string_output() {
        let r = normalize_tool_result(&json!({"tool_call_id": "call_1", "output": "done"})).unwrap();
        assert_eq!(r.tool_call_id.as_str(), "call_1");
        assert_eq!(r.content, json!("done"));
        assert!(r.ok);
    }

    #[test]
    fn tool_use_object_supplies_call_id() {
        let r = normalize_tool_result(&json!({
            "result": {"tool_use_id": "toolu_7", "content": "listing"}
        }))
        .unwrap();
        assert_eq!(r.tool_call_id.as_str(), "toolu_7");
        assert_eq!(r.content, json!("listing"));
    }

    #[test]
    fn tool_use_object_with_content_blocks() {
        let r = normalize_tool_result(&json!({
            "result": {"tool_use_id": "toolu_7", "content": [{"type": "text", "text": "a.txt"}]}
        }))
        .unwrap();
        assert_eq!(r.content, json!("a.txt"));
    }

    #[test]
    fn content_array_first_text() {
        let r = normalize_tool_result(&json!({
            "toolCallId": "call_2",
            "content": [{"type": "text", "text": "first"}, {"type": "text", "text": "second"}]
        }))
        .unwrap();
        assert_eq!(r.tool_call_id.as_str(), "call_2");
        assert_eq!(r.content, json!("first"));
    }

    #[test]
    fn bare_result_object() {
        let r = normalize_tool_result(&json!({"tool_call_id": "call_3", "result": {"files": 3}}))
            .unwrap();
        assert_eq!(r.content, json!({"files": 3}));
    }

    #[test]
    fn json_looking_string_is_parsed() {
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "output": "{\"exit\": 0}"}))
            .unwrap();
        assert_eq!(r.content, json!({"exit": 0}));
    }

    #[test]
    fn broken_json_string_kept_raw() {
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "output": "[1, 2"})).unwrap();
        assert_eq!(r.content, json!("[1, 2"));
    }

    #[test]
    fn strategy_order_prefers_direct_output() {
        let r = normalize_tool_result(&json!({
            "tool_call_id": "c",
            "output": "direct",
            "result": "bare"
        }))
        .unwrap();
        assert_eq!(r.content, json!("direct"));
    }

    #[test]
    fn success_flag_precedence() {
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "output": "x", "success": false, "ok": true}))
            .unwrap();
        assert!(!r.ok);
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "output": "x", "ok": false})).unwrap();
        assert!(!r.ok);
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "output": "x"})).unwrap();
        assert!(r.ok);
    }

    #[test]
    fn error_text_copied() {
        let r = normalize_tool_result(&json!({"tool_call_id": "c", "result": null, "output": "", "error": "exit 1"}))
            .unwrap();
        assert_eq!(r.error.as_deref(), Some("exit 1"));
        assert!(r.is_failure());
    }

    #[test]
    fn missing_call_id_rejected() {
        assert_matches!(
            normalize_tool_result(&json!({"output": "x"})),
            Err(RejectReason::MissingToolCallId)
        );
    }

    #[test]
    fn no_strategy_rejected() {
        assert_matches!(
            normalize_tool_result(&json!({"tool_call_id": "c", "unrelated": 1})),
            Err(RejectReason::UnrecognizedToolResult)
        );
    }
}
