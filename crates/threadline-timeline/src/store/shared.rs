//! Concurrent access to the Canonical Store.
//!
//! Reads take a snapshot under a short `parking_lot` read lock. Writes for a
//! session go through a [`SessionWriter`], which holds that session's async
//! writer lock, so live ingestion and hydration of the same session never
//! interleave. Different sessions proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use threadline_core::{MessageId, SessionId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use super::canonical_store::{BatchOutcome, CanonicalStore, InsertOutcome};
use crate::adapters::LiveAdapter;
use crate::errors::{Result, TimelineError};
use crate::merge::merge_events;
use crate::pairing::pair_tool_interactions;
use crate::types::{CanonicalEvent, TimelineEntry};

#[derive(Default)]
struct Inner {
    store: RwLock<CanonicalStore>,
    writers: DashMap<SessionId, Arc<Mutex<()>>>,
}

/// Cloneable handle to one [`CanonicalStore`] shared between producers and
/// readers.
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<Inner>,
}

impl SharedStore {
    /// Empty shared store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store.
    pub fn from_store(store: CanonicalStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(store),
                writers: DashMap::new(),
            }),
        }
    }

    /// The writer lock of one session.
    fn writer_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        self.inner
            .writers
            .entry(session_id.clone())
            .or_default()
            .clone()
    }

    /// Become the single writer of `session_id`, waiting for any current one.
    pub async fn lock_session(&self, session_id: &SessionId) -> SessionWriter {
        let guard = self.writer_lock(session_id).lock_owned().await;
        trace!(session_id = %session_id, "session writer acquired");
        SessionWriter {
            store: self.clone(),
            session_id: session_id.clone(),
            _guard: guard,
        }
    }

    /// Adapt one live envelope and insert it under the session's writer lock.
    ///
    /// Returns `Ok(None)` when the envelope produced no event (rejected or
    /// ignored); rejections are logged by the adapter.
    pub async fn ingest_live(
        &self,
        adapter: &LiveAdapter,
        raw: &Value,
    ) -> Result<Option<InsertOutcome>> {
        let Some(event) = adapter.adapt(raw) else {
            return Ok(None);
        };
        let session_id = event.session_id.clone();
        let mut writer = self.lock_session(&session_id).await;
        writer.insert(event).map(Some)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────

    /// Owned copy of the session's events in timeline order.
    pub fn session_events(&self, session_id: &SessionId) -> Vec<CanonicalEvent> {
        self.inner.store.read().snapshot(session_id)
    }

    /// Copy of one event.
    pub fn get(&self, session_id: &SessionId, event_id: &str) -> Option<CanonicalEvent> {
        self.inner.store.read().get(session_id, event_id).cloned()
    }

    /// Copies of the session's checkpoints in stored order.
    pub fn checkpoints(&self, session_id: &SessionId) -> Vec<CanonicalEvent> {
        self.inner
            .store
            .read()
            .checkpoints(session_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Render view of the session.
    pub fn timeline(&self, session_id: &SessionId) -> Vec<TimelineEntry> {
        pair_tool_interactions(&merge_events(self.session_events(session_id)))
    }

    /// Sessions with at least one event.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.inner.store.read().sessions()
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.inner.store.read().len()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.inner.store.read().is_empty()
    }
}

/// Exclusive write access to one session.
///
/// Dropping the writer releases the session.
pub struct SessionWriter {
    store: SharedStore,
    session_id: SessionId,
    _guard: OwnedMutexGuard<()>,
}

impl SessionWriter {
    /// Session this writer owns.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn check(&self, event: &CanonicalEvent) -> Result<()> {
        if event.session_id == self.session_id {
            Ok(())
        } else {
            Err(TimelineError::InvalidOperation(format!(
                "event {} belongs to session {}, writer owns {}",
                event.id, event.session_id, self.session_id
            )))
        }
    }

    /// Insert one event of this session.
    pub fn insert(&mut self, event: CanonicalEvent) -> Result<InsertOutcome> {
        self.check(&event)?;
        Ok(self.store.inner.store.write().insert(event))
    }

    /// Insert and merge a batch of this session's events.
    pub fn insert_batch(&mut self, events: Vec<CanonicalEvent>) -> Result<BatchOutcome> {
        events.iter().try_for_each(|e| self.check(e))?;
        Ok(self.store.inner.store.write().insert_batch(events))
    }

    /// Attach a commit hash to one of this session's checkpoints.
    pub fn attach_commit_hash(&mut self, event_id: &str, commit_hash: &str) -> Result<()> {
        self.store
            .inner
            .store
            .write()
            .attach_commit_hash(&self.session_id, event_id, commit_hash)
    }

    /// Finalize partial chunks of one message, or of the whole session.
    pub fn finalize_chunks(&mut self, message_id: Option<&MessageId>) -> usize {
        self.store
            .inner
            .store
            .write()
            .finalize_chunks(&self.session_id, message_id)
    }

    /// Drop the session's history.
    pub fn clear(&mut self) -> usize {
        self.store.inner.store.write().clear_session(&self.session_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
