//! Merge and deduplication of canonical events.
//!
//! [`merge_events`] takes events from any mix of sources and returns one
//! ordered, deduplicated sequence:
//!
//! 1. Tool results inherit the message id of the call they answer.
//! 2. Each event gets a dedup key (see [`dedup_key`]).
//! 3. Chunks are always kept; for every other kind the first event per
//!    `(key, kind)` wins, so a message and a tool call sharing a key never
//!    shadow each other. A dropped checkpoint copy still hands its commit hash
//!    to the kept one if that has none.
//! 4. The survivors are stably sorted by `created_at`.
//!
//! The function is idempotent: merging a merged sequence returns it unchanged.

use std::collections::HashMap;

use threadline_core::MessageId;
use tracing::{debug, trace};

use crate::types::{CanonicalEvent, EventBody, EventKind};

/// Dedup key for one event.
///
/// Precedence: origin id, canonical id, `"{message_id}:{kind}"`, then
/// `":{kind}"`. Empty values count as absent.
pub fn dedup_key(event: &CanonicalEvent) -> String {
    if let Some(origin) = event.origin_id.as_deref().filter(|o| !o.is_empty()) {
        return origin.to_string();
    }
    if !event.id.is_empty() {
        return event.id.to_string();
    }
    let kind = event.kind();
    match event.message_id.as_deref().filter(|m| !m.is_empty()) {
        Some(message_id) => format!("{message_id}:{kind}"),
        None => format!(":{kind}"),
    }
}

/// Merge events from any sources into one ordered, deduplicated sequence.
pub fn merge_events(events: Vec<CanonicalEvent>) -> Vec<CanonicalEvent> {
    let owners = tool_call_owners(&events);

    // (key, kind) -> index of the kept event in `merged`
    let mut seen: HashMap<(String, EventKind), usize> = HashMap::with_capacity(events.len());
    let mut merged: Vec<CanonicalEvent> = Vec::with_capacity(events.len());
    let mut dropped = 0usize;

    for mut event in events {
        repair_result_owner(&mut event, &owners);

        let kind = event.kind();
        if kind == EventKind::Chunk {
            merged.push(event);
            continue;
        }

        let key = (dedup_key(&event), kind);
        if let Some(&kept) = seen.get(&key) {
            trace!(key = %key.0, kind = %kind, "duplicate event dropped");
            fill_commit(&mut merged[kept], &event);
            dropped += 1;
            continue;
        }
        let _ = seen.insert(key, merged.len());
        merged.push(event);
    }

    if dropped > 0 {
        debug!(dropped, kept = merged.len(), "merge removed duplicates");
    }

    merged.sort_by_key(|e| e.created_at);
    merged
}

/// Tool-call id → owning message id. The first call carrying an owner wins.
fn tool_call_owners(events: &[CanonicalEvent]) -> HashMap<String, MessageId> {
    let mut owners = HashMap::new();
    for event in events {
        if let (Some(call), Some(owner)) = (event.as_tool_call(), &event.message_id) {
            let _ = owners
                .entry(call.call_id.to_string())
                .or_insert_with(|| owner.clone());
        }
    }
    owners
}

fn fill_commit(kept: &mut CanonicalEvent, duplicate: &CanonicalEvent) {
    if let (Some(cp), Some(other)) = (kept.as_checkpoint_mut(), duplicate.as_checkpoint()) {
        if cp.adopt_commit(other) {
            debug!(event_id = %kept.id, "commit hash filled from re-delivered checkpoint");
        }
    }
}

fn repair_result_owner(event: &mut CanonicalEvent, owners: &HashMap<String, MessageId>) {
    if let EventBody::ToolResult(result) = &event.body {
        if let Some(owner) = owners.get(result.tool_call_id.as_str()) {
            event.message_id = Some(owner.clone());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
