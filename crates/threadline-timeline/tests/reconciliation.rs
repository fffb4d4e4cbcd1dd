#![allow(missing_docs)]

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use threadline_core::SessionId;
use threadline_settings::HydrationSettings;
use threadline_timeline::adapters::{adapt_live, adapt_row_value, LiveAdapter, RowContent, StoredRow};
use threadline_timeline::sqlite::{new_file, ConnectionConfig, SqliteRowSource};
use threadline_timeline::{
    merge_events, pair_tool_interactions, CheckpointDiff, CheckpointResolver, DiffBase,
    EventKind, Hydrator, InsertOutcome, InteractionStatus, PendingReason, SharedStore,
    SourceControl, SourceControlError, TimelineEntry,
};
use tokio_util::sync::CancellationToken;

fn sid() -> SessionId {
    SessionId::from("s1")
}

/// Source control that records its calls and answers from fixed data.
#[derive(Default)]
struct RecordingSourceControl {
    diffs: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SourceControl for RecordingSourceControl {
    async fn diff(
        &self,
        _project_path: &Path,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<String, SourceControlError> {
        self.diffs
            .lock()
            .push((from_commit.to_string(), to_commit.to_string()));
        Ok(format!("diff {from_commit}..{to_commit}"))
    }

    async fn base_commit(
        &self,
        _session_id: &str,
        _project_path: &Path,
    ) -> Result<String, SourceControlError> {
        Ok("base0".into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live + stored reconciliation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_and_stored_copies_render_once() {
    let store = SharedStore::new();
    let adapter = LiveAdapter::default();

    // Live channel: user message, tool call and result, completion.
    for raw in [
        json!({"type": "message", "sessionId": "s1", "id": "r1", "timestamp": 1_700_000_000_000i64,
               "data": {"content": "list files"}}),
        json!({"type": "tool_call", "sessionId": "s1", "messageId": "m2", "id": "r2:0",
               "timestamp": 1_700_000_001_000i64,
               "data": {"tool_call": {"id": "call_9", "name": "ls", "arguments": {}}}}),
        json!({"type": "tool_result", "sessionId": "s1", "id": "r3", "timestamp": 1_700_000_002_000i64,
               "data": {"tool_call_id": "call_9", "output": "{\"files\": 3}"}}),
        json!({"type": "done", "sessionId": "s1", "messageId": "m2", "timestamp": 1_700_000_003_000i64}),
    ] {
        let _ = store.ingest_live(&adapter, &raw).await.unwrap();
    }
    let live_len = store.len();

    // The same facts arrive again from the relational store.
    let rows = [
        json!({"id": "r1", "session_id": "s1", "role": "user", "content": "list files",
               "created_at": 1_700_000_000}),
        json!({"id": "r2", "session_id": "s1", "role": "assistant", "message_id": "m2",
               "created_at": 1_700_000_001,
               "content": [{"type": "tool_call", "id": "call_9", "name": "ls", "arguments": {}}]}),
        json!({"id": "r3", "session_id": "s1", "role": "tool", "tool_call_id": "call_9",
               "content": "{\"files\": 3}", "created_at": 1_700_000_002}),
    ];
    let events: Vec<_> = rows.iter().flat_map(adapt_row_value).collect();
    let outcome = store.lock_session(&sid()).await.insert_batch(events).unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(store.len(), live_len);

    let timeline = store.timeline(&sid());
    let interactions: Vec<_> = timeline.iter().filter_map(TimelineEntry::as_interaction).collect();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].status, InteractionStatus::Completed);
    assert_eq!(interactions[0].result.as_ref().unwrap().content, json!({"files": 3}));
    assert!(timeline.windows(2).all(|w| w[0].created_at() <= w[1].created_at()));
}

#[test]
fn chunk_then_complete_content_keeps_both() {
    let chunk = adapt_live(&json!({"type": "chunk", "sessionId": "s1", "timestamp": 1, "delta": "Hel"}))
        .unwrap();
    let complete = adapt_live(&json!({"type": "chunk", "sessionId": "s1", "timestamp": 2,
                                      "data": {"content": "Hello"}}))
    .unwrap();
    assert_eq!(complete.kind(), EventKind::Message);
    assert_ne!(complete.id, chunk.id);

    let merged = merge_events(vec![chunk, complete]);
    let kinds: Vec<_> = merged.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, [EventKind::Chunk, EventKind::Message]);
}

#[test]
fn tool_row_pairs_with_its_call() {
    let result = adapt_row_value(&json!({
        "id": "r1", "session_id": "s1", "role": "tool", "content": "ok",
        "tool_call_id": "call_9", "created_at": 1_700_000_000
    }));
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].as_tool_result().unwrap().tool_call_id.as_str(), "call_9");
    assert_eq!(result[0].as_tool_result().unwrap().content, json!("ok"));

    // Alone it renders as a stub call.
    let timeline = pair_tool_interactions(&result);
    let stub = timeline[0].as_interaction().unwrap();
    assert!(stub.synthesized_call);
    assert_eq!(stub.call.name, "unknown");
}

#[test]
fn unanswered_call_is_running() {
    let call = adapt_live(&json!({
        "type": "tool_call", "sessionId": "s1", "timestamp": 1,
        "data": {"tool_call": {"id": "call_1", "name": "bash", "arguments": {"cmd": "ls"}}}
    }))
    .unwrap();
    let timeline = pair_tool_interactions(&merge_events(vec![call]));
    let interaction = timeline[0].as_interaction().unwrap();
    assert_eq!(interaction.call.call_id.as_str(), "call_1");
    assert_eq!(interaction.result, None);
    assert_eq!(interaction.status, InteractionStatus::Running);
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkpoint chain
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkpoint_chain_diffs_against_predecessors() {
    let store = SharedStore::new();
    let adapter = LiveAdapter::default();
    for (i, id) in ["c1", "c2", "c3"].iter().enumerate() {
        let raw = json!({"type": "checkpoint", "sessionId": "s1", "id": id,
                         "timestamp": 1_700_000_000_000i64 + i as i64, "data": {"phase": "end"}});
        assert_eq!(
            store.ingest_live(&adapter, &raw).await.unwrap(),
            Some(InsertOutcome::Inserted)
        );
    }

    let resolver = CheckpointResolver::new(RecordingSourceControl::default());
    let project = Path::new("/work/project");

    // No commits yet.
    let pending = resolver.diff_in_store(&store, &sid(), project, "c2").await.unwrap();
    assert_eq!(
        pending,
        CheckpointDiff::Pending {
            reason: PendingReason::TargetCommitMissing
        }
    );

    {
        let mut writer = store.lock_session(&sid()).await;
        writer.attach_commit_hash("c2", "bbb").unwrap();
        writer.attach_commit_hash("c3", "ccc").unwrap();
    }
    let pending = resolver.diff_in_store(&store, &sid(), project, "c2").await.unwrap();
    assert_eq!(
        pending,
        CheckpointDiff::Pending {
            reason: PendingReason::PreviousCommitMissing
        }
    );

    store
        .lock_session(&sid())
        .await
        .attach_commit_hash("c1", "aaa")
        .unwrap();

    let first = resolver.diff_in_store(&store, &sid(), project, "c1").await.unwrap();
    assert!(matches!(
        first,
        CheckpointDiff::Ready { base: DiffBase::SessionBase, ref from_commit, .. } if from_commit == "base0"
    ));
    let third = resolver.diff_in_store(&store, &sid(), project, "c3").await.unwrap();
    assert!(matches!(
        third,
        CheckpointDiff::Ready { base: DiffBase::Commit(ref prev), ref diff, .. }
            if prev == "bbb" && diff == "diff bbb..ccc"
    ));
    assert_eq!(
        *resolver.source_control().diffs.lock(),
        vec![
            ("base0".to_string(), "aaa".to_string()),
            ("bbb".to_string(), "ccc".to_string())
        ]
    );
}

#[tokio::test]
async fn redelivered_checkpoint_envelope_attaches_commit() {
    let store = SharedStore::new();
    let adapter = LiveAdapter::default();
    let envelope = |hash: Option<&str>| {
        json!({"type": "checkpoint", "sessionId": "s1", "id": "cp1",
               "timestamp": 1_700_000_000_000i64, "data": {"phase": "end", "commit_hash": hash}})
    };

    let outcomes = [
        store.ingest_live(&adapter, &envelope(None)).await.unwrap(),
        store.ingest_live(&adapter, &envelope(Some("abc123"))).await.unwrap(),
    ];
    assert_eq!(
        outcomes,
        [Some(InsertOutcome::Inserted), Some(InsertOutcome::CommitAttached)]
    );
    assert_eq!(store.len(), 1);
    let stored = store.get(&sid(), "cp1").unwrap();
    assert_eq!(stored.as_checkpoint().and_then(|cp| cp.commit()), Some("abc123"));

    let resolver = CheckpointResolver::new(RecordingSourceControl::default());
    let diff = resolver
        .diff_in_store(&store, &sid(), Path::new("/work/project"), "cp1")
        .await
        .unwrap();
    assert!(matches!(
        diff,
        CheckpointDiff::Ready { ref target_commit, .. } if target_commit == "abc123"
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Hydration from SQLite
// ─────────────────────────────────────────────────────────────────────────────

fn seeded_source(dir: &tempfile::TempDir, count: i64) -> SqliteRowSource {
    let path = dir.path().join("threadline.db");
    let pool = new_file(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
    let source = SqliteRowSource::new(pool);
    source.ensure_schema().unwrap();
    for i in 0..count {
        source
            .upsert_row(&StoredRow {
                id: format!("r{i:03}"),
                session_id: "s1".into(),
                role: if i % 2 == 0 { "user" } else { "assistant" }.into(),
                content: RowContent::Text(format!("message {i}")),
                created_at: (1_700_000_000 + i).into(),
                message_id: None,
                tool_call_id: None,
            })
            .unwrap();
    }
    source
}

#[tokio::test]
async fn hydrates_session_from_sqlite_and_converges() {
    let dir = tempfile::tempdir().unwrap();
    let store = SharedStore::new();
    let settings = HydrationSettings {
        page_size: 50,
        max_pages: None,
    };
    let hydrator = Hydrator::with_settings(seeded_source(&dir, 120), store.clone(), &settings);

    let report = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.rows, 120);
    assert_eq!(report.inserted, 120);
    assert!(!report.cancelled);

    let again = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(store.len(), 120);

    let events = store.session_events(&sid());
    assert_eq!(events.first().unwrap().id.as_str(), "r000");
    assert_eq!(events.last().unwrap().id.as_str(), "r119");
}

#[tokio::test]
async fn cancelled_hydration_stops_and_releases_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = SharedStore::new();
    let hydrator = Hydrator::new(seeded_source(&dir, 10), store.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = hydrator.hydrate(&sid(), &cancel).await.unwrap();
    assert!(report.cancelled);
    assert!(store.is_empty());

    // Live ingest for the session proceeds afterwards.
    let raw = json!({"type": "message", "sessionId": "s1", "data": {"content": "hi"}});
    let out = store.ingest_live(&LiveAdapter::default(), &raw).await.unwrap();
    assert_eq!(out, Some(InsertOutcome::Inserted));
}
