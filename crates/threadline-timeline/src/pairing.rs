//! Tool interaction pairing.
//!
//! Turns a merged canonical sequence into render entries. Every tool call
//! and tool result is consumed into a [`ToolInteraction`]; all other events
//! pass through as [`TimelineEntry::Event`].
//!
//! Two passes over the input:
//! 1. Index the first result per call id and note which call ids have a
//!    call event at all.
//! 2. Walk in order, emitting an interaction at each call's position and a
//!    stub-call interaction at each orphan result's position.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::types::{CanonicalEvent, TimelineEntry, ToolCall, ToolInteraction, ToolResult};

/// Tool name used for calls synthesized from orphan results.
pub const UNKNOWN_TOOL_NAME: &str = "unknown";

/// What pass 1 learned about the sequence.
struct Index<'a> {
    /// First result event per call id.
    results: HashMap<&'a str, &'a CanonicalEvent>,
    /// Call ids that have at least one call event.
    called: HashSet<&'a str>,
}

fn index(events: &[CanonicalEvent]) -> Index<'_> {
    let mut results = HashMap::new();
    let mut called = HashSet::new();
    for event in events {
        if let Some(call) = event.as_tool_call() {
            let _ = called.insert(call.call_id.as_str());
        } else if let Some(result) = event.as_tool_result() {
            let _ = results.entry(result.tool_call_id.as_str()).or_insert(event);
        }
    }
    Index { results, called }
}

/// Mutable state carried through pass 2.
struct BuildState<'a> {
    entries: Vec<TimelineEntry>,
    /// Call ids already emitted as an interaction.
    emitted: HashSet<&'a str>,
}

/// Pair tool calls with their results over a merged sequence.
///
/// - An interaction sits at its call's position; a result with no call
///   anywhere in the sequence gets a stub call named `"unknown"` at its
///   own position.
/// - Repeated calls or results for an already emitted call id are consumed
///   and dropped. The first one wins.
pub fn pair_tool_interactions(events: &[CanonicalEvent]) -> Vec<TimelineEntry> {
    let idx = index(events);
    let mut st = BuildState {
        entries: Vec::with_capacity(events.len()),
        emitted: HashSet::new(),
    };

    for event in events {
        if let Some(call) = event.as_tool_call() {
            handle_call(event, call, &idx, &mut st);
        } else if let Some(result) = event.as_tool_result() {
            handle_result(event, result, &idx, &mut st);
        } else {
            st.entries.push(TimelineEntry::Event(event.clone()));
        }
    }
    st.entries
}

fn handle_call<'a>(
    event: &CanonicalEvent,
    call: &'a ToolCall,
    idx: &Index<'a>,
    st: &mut BuildState<'a>,
) {
    let call_id = call.call_id.as_str();
    if !st.emitted.insert(call_id) {
        debug!(call_id, event_id = %event.id, "duplicate tool call collapsed");
        return;
    }
    let result_event = idx.results.get(call_id).copied();
    let result = result_event.and_then(CanonicalEvent::as_tool_result);
    st.entries.push(TimelineEntry::ToolInteraction(ToolInteraction {
        call: call.clone(),
        result: result.cloned(),
        status: ToolInteraction::status_for(result),
        call_event_id: event.id.clone(),
        result_event_id: result_event.map(|e| e.id.clone()),
        message_id: event.message_id.clone(),
        created_at: event.created_at,
        synthesized_call: false,
    }));
}

fn handle_result<'a>(
    event: &'a CanonicalEvent,
    result: &'a ToolResult,
    idx: &Index<'a>,
    st: &mut BuildState<'a>,
) {
    let call_id = result.tool_call_id.as_str();
    let is_first = idx
        .results
        .get(call_id)
        .is_some_and(|first| std::ptr::eq(*first, event));
    if !is_first {
        debug!(call_id, event_id = %event.id, "extra tool result dropped");
        return;
    }
    if idx.called.contains(call_id) {
        // Rendered with its call.
        return;
    }

    st.entries.push(TimelineEntry::ToolInteraction(ToolInteraction {
        call: ToolCall {
            call_id: result.tool_call_id.clone(),
            name: UNKNOWN_TOOL_NAME.to_string(),
            arguments: serde_json::Value::Null,
        },
        result: Some(result.clone()),
        status: ToolInteraction::status_for(Some(result)),
        call_event_id: event.id.clone(),
        result_event_id: Some(event.id.clone()),
        message_id: event.message_id.clone(),
        created_at: event.created_at,
        synthesized_call: true,
    }));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
