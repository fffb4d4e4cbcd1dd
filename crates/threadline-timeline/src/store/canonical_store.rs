//! In-memory, session-indexed store of canonical events.
//!
//! Events live in an arena keyed by slot; each session keeps its slots
//! ordered by `created_at`, with ties kept in insertion order. Non-chunk
//! events are also indexed by their dedup identity so re-delivery of the
//! same fact is detected on insert.

use std::collections::HashMap;

use threadline_core::{MessageId, SessionId};
use tracing::{debug, trace};

use crate::errors::{Result, TimelineError};
use crate::merge::{dedup_key, merge_events};
use crate::pairing::pair_tool_interactions;
use crate::types::{CanonicalEvent, EventBody, EventKind, TimelineEntry};

type Slot = u64;

/// Dedup identity of a non-chunk event within the store.
type IdentityKey = (SessionId, String, EventKind);

/// What happened to an inserted event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored.
    Inserted,
    /// Same fact already stored; the earlier copy was kept.
    Duplicate,
    /// Re-delivered checkpoint whose commit hash was attached to the
    /// stored copy.
    CommitAttached,
}

/// Counts from [`CanonicalStore::insert_batch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Events newly stored.
    pub inserted: usize,
    /// Events dropped as already known.
    pub duplicates: usize,
}

/// Arena of canonical events with a per-session ordered index.
#[derive(Debug, Default)]
pub struct CanonicalStore {
    arena: HashMap<Slot, CanonicalEvent>,
    next_slot: Slot,
    identities: HashMap<IdentityKey, Slot>,
    by_session: HashMap<SessionId, Vec<Slot>>,
}

fn identity(event: &CanonicalEvent) -> Option<IdentityKey> {
    let kind = event.kind();
    (kind != EventKind::Chunk).then(|| (event.session_id.clone(), dedup_key(event), kind))
}

impl CanonicalStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Insert one event.
    ///
    /// Non-chunk events already present (same dedup key and kind) are
    /// dropped, first write wins, except that a re-delivered checkpoint
    /// carrying a commit hash fills in the stored copy's missing one.
    /// Chunks are always stored. A tool result
    /// takes the message id of its call if the call is known, and a
    /// completion signal finalizes the partial chunks it closes.
    pub fn insert(&mut self, mut event: CanonicalEvent) -> InsertOutcome {
        if let Some(key) = identity(&event) {
            if let Some(&slot) = self.identities.get(&key) {
                return self.absorb_duplicate(slot, &event);
            }
        }

        self.link_tool_owner(&mut event);

        let session_id = event.session_id.clone();
        let completes = match &event.body {
            EventBody::CompletionSignal { .. } => Some(event.message_id.clone()),
            _ => None,
        };
        let slot = self.alloc(event);
        self.place(&session_id, slot);

        if let Some(message_id) = completes {
            let _ = self.finalize_chunks(&session_id, message_id.as_ref());
        }
        InsertOutcome::Inserted
    }

    fn absorb_duplicate(&mut self, slot: Slot, event: &CanonicalEvent) -> InsertOutcome {
        let stored = self.arena.get_mut(&slot).and_then(CanonicalEvent::as_checkpoint_mut);
        if let (Some(stored), Some(incoming)) = (stored, event.as_checkpoint()) {
            if stored.adopt_commit(incoming) {
                debug!(
                    session_id = %event.session_id,
                    event_id = %event.id,
                    "commit hash filled from re-delivered checkpoint"
                );
                return InsertOutcome::CommitAttached;
            }
        }
        trace!(event_id = %event.id, kind = %event.kind(), "duplicate insert ignored");
        InsertOutcome::Duplicate
    }

    /// Insert a batch, re-merging each touched session.
    ///
    /// The session's stored events come first in the merge input, so they
    /// win over re-delivered copies and redundant batches converge to the
    /// same state.
    pub fn insert_batch(&mut self, events: Vec<CanonicalEvent>) -> BatchOutcome {
        let mut grouped: HashMap<SessionId, Vec<CanonicalEvent>> = HashMap::new();
        for event in events {
            grouped.entry(event.session_id.clone()).or_default().push(event);
        }

        let mut outcome = BatchOutcome::default();
        for (session_id, incoming) in grouped {
            let completions: Vec<Option<MessageId>> = incoming
                .iter()
                .filter(|e| e.kind() == EventKind::CompletionSignal)
                .map(|e| e.message_id.clone())
                .collect();

            let existing = self.take_session(&session_id);
            let existing_len = existing.len();
            let incoming_len = incoming.len();

            let mut all = existing;
            all.extend(incoming);
            let merged = merge_events(all);

            let inserted = merged.len().saturating_sub(existing_len);
            outcome.inserted += inserted;
            outcome.duplicates += incoming_len - inserted.min(incoming_len);

            // Merged output is already in timeline order.
            for event in merged {
                let slot = self.alloc(event);
                self.by_session.entry(session_id.clone()).or_default().push(slot);
            }
            for message_id in completions {
                let _ = self.finalize_chunks(&session_id, message_id.as_ref());
            }
            debug!(
                session_id = %session_id,
                inserted,
                total = self.session_len(&session_id),
                "batch merged into session"
            );
        }
        outcome
    }

    /// Attach a commit hash to a checkpoint.
    ///
    /// Re-attaching the same hash is a no-op.
    ///
    /// # Errors
    ///
    /// - [`TimelineError::SessionNotFound`] for an unknown session.
    /// - [`TimelineError::CheckpointNotFound`] if no event has that id.
    /// - [`TimelineError::NotACheckpoint`] if the event is another kind.
    /// - [`TimelineError::InvalidOperation`] if a different hash is attached.
    pub fn attach_commit_hash(
        &mut self,
        session_id: &SessionId,
        event_id: &str,
        commit_hash: &str,
    ) -> Result<()> {
        let slots = self
            .by_session
            .get(session_id)
            .ok_or_else(|| TimelineError::SessionNotFound(session_id.to_string()))?;
        let slot = slots
            .iter()
            .copied()
            .find(|s| self.arena.get(s).is_some_and(|e| e.id.as_str() == event_id))
            .ok_or_else(|| TimelineError::CheckpointNotFound(event_id.to_string()))?;
        let checkpoint = self
            .arena
            .get_mut(&slot)
            .and_then(CanonicalEvent::as_checkpoint_mut)
            .ok_or_else(|| TimelineError::NotACheckpoint(event_id.to_string()))?;

        match checkpoint.commit() {
            Some(existing) if existing == commit_hash => Ok(()),
            Some(existing) => Err(TimelineError::InvalidOperation(format!(
                "checkpoint {event_id} already has commit {existing}"
            ))),
            None => {
                checkpoint.commit_hash = Some(commit_hash.to_string());
                debug!(session_id = %session_id, event_id, commit_hash, "commit attached");
                Ok(())
            }
        }
    }

    /// Drop every event of a session. Returns how many were removed.
    pub fn clear_session(&mut self, session_id: &SessionId) -> usize {
        let removed = self.take_session(session_id).len();
        if removed > 0 {
            debug!(session_id = %session_id, removed, "session cleared");
        }
        removed
    }

    /// Mark partial chunks as final.
    ///
    /// With a message id only that message's chunks are finalized;
    /// without one, every partial chunk of the session.
    pub fn finalize_chunks(
        &mut self,
        session_id: &SessionId,
        message_id: Option<&MessageId>,
    ) -> usize {
        let Some(slots) = self.by_session.get(session_id) else {
            return 0;
        };
        let mut finalized = 0;
        for slot in slots {
            let Some(event) = self.arena.get_mut(slot) else {
                continue;
            };
            let matches = message_id.is_none_or(|m| event.message_id.as_ref() == Some(m));
            if event.partial && matches {
                event.partial = false;
                finalized += 1;
            }
        }
        finalized
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// The session's events in timeline order.
    pub fn session_events(&self, session_id: &SessionId) -> Vec<&CanonicalEvent> {
        self.by_session
            .get(session_id)
            .map(|slots| slots.iter().filter_map(|s| self.arena.get(s)).collect())
            .unwrap_or_default()
    }

    /// Owned copy of the session's events, for handing to pure components.
    pub fn snapshot(&self, session_id: &SessionId) -> Vec<CanonicalEvent> {
        self.session_events(session_id).into_iter().cloned().collect()
    }

    /// First event of the session with the given id.
    pub fn get(&self, session_id: &SessionId, event_id: &str) -> Option<&CanonicalEvent> {
        self.session_events(session_id)
            .into_iter()
            .find(|e| e.id.as_str() == event_id)
    }

    /// The session's checkpoints in stored order.
    pub fn checkpoints(&self, session_id: &SessionId) -> Vec<&CanonicalEvent> {
        self.session_events(session_id)
            .into_iter()
            .filter(|e| e.kind() == EventKind::Checkpoint)
            .collect()
    }

    /// Render view: merged and tool-paired.
    pub fn timeline(&self, session_id: &SessionId) -> Vec<TimelineEntry> {
        pair_tool_interactions(&merge_events(self.snapshot(session_id)))
    }

    /// Sessions with at least one event.
    pub fn sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.by_session.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of events in one session.
    pub fn session_len(&self, session_id: &SessionId) -> usize {
        self.by_session.get(session_id).map_or(0, Vec::len)
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn alloc(&mut self, event: CanonicalEvent) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(key) = identity(&event) {
            let _ = self.identities.insert(key, slot);
        }
        let _ = self.arena.insert(slot, event);
        slot
    }

    /// Insert `slot` after every event at or before its timestamp.
    fn place(&mut self, session_id: &SessionId, slot: Slot) {
        let Some(created_at) = self.arena.get(&slot).map(|e| e.created_at) else {
            return;
        };
        let arena = &self.arena;
        let slots = self.by_session.entry(session_id.clone()).or_default();
        let at = slots.partition_point(|s| arena.get(s).is_some_and(|e| e.created_at <= created_at));
        slots.insert(at, slot);
    }

    /// Remove a session from every index and return its events in order.
    fn take_session(&mut self, session_id: &SessionId) -> Vec<CanonicalEvent> {
        let Some(slots) = self.by_session.remove(session_id) else {
            return Vec::new();
        };
        let events: Vec<CanonicalEvent> = slots
            .into_iter()
            .filter_map(|s| self.arena.remove(&s))
            .collect();
        for event in &events {
            if let Some(key) = identity(event) {
                let _ = self.identities.remove(&key);
            }
        }
        events
    }

    /// Keep tool results attached to the turn that issued their call.
    fn link_tool_owner(&mut self, event: &mut CanonicalEvent) {
        let Some(slots) = self.by_session.get(&event.session_id) else {
            return;
        };
        match &event.body {
            EventBody::ToolResult(result) => {
                let owner = slots
                    .iter()
                    .filter_map(|s| self.arena.get(s))
                    .filter_map(|e| Some((e.as_tool_call()?, e.message_id.as_ref()?)))
                    .find(|(call, _)| call.call_id == result.tool_call_id)
                    .map(|(_, owner)| owner.clone());
                if owner.is_some() {
                    event.message_id = owner;
                }
            }
            EventBody::ToolCall(call) => {
                let Some(owner) = event.message_id.as_ref() else {
                    return;
                };
                for slot in slots {
                    let Some(stored) = self.arena.get_mut(slot) else {
                        continue;
                    };
                    if let EventBody::ToolResult(result) = &stored.body {
                        if result.tool_call_id == call.call_id {
                            stored.message_id = Some(owner.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
