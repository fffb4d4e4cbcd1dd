//! Paged hydration from the relational store.
//!
//! A [`Hydrator`] pulls one session's rows page by page from a
//! [`RowPageSource`], adapts them and merges each page into the store as one
//! batch. It owns the session's writer for the whole run, so live inserts for
//! that session wait until hydration finishes or is cancelled.
//!
//! Cancellation is checked between pages and while a fetch is in flight.
//! Pages merged before cancellation stay merged; running again later simply
//! converges.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_core::SessionId;
use threadline_settings::HydrationSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::{log_reject, try_adapt_row_value};
use crate::errors::{RejectReason, Result};
use crate::store::SharedStore;

/// One page of raw rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    /// Raw row objects, oldest first.
    pub rows: Vec<Value>,
    /// Cursor for the next page; `None` when the source is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Source of relational rows, fetched one page at a time.
#[async_trait]
pub trait RowPageSource: Send + Sync {
    /// Fetch up to `limit` rows of `session_id` after `cursor`.
    async fn fetch_page(
        &self,
        session_id: &SessionId,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RowPage>;
}

/// What a hydration run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationReport {
    /// Pages fetched and merged.
    pub pages: usize,
    /// Raw rows received.
    pub rows: usize,
    /// Events newly stored.
    pub inserted: usize,
    /// Events already present.
    pub duplicates: usize,
    /// Rows dropped by the adapter.
    pub rejected: usize,
    /// Whether the run stopped on cancellation.
    pub cancelled: bool,
}

/// Drives paged hydration of sessions into a [`SharedStore`].
pub struct Hydrator<P> {
    source: P,
    store: SharedStore,
    page_size: usize,
    max_pages: Option<usize>,
}

impl<P: RowPageSource> Hydrator<P> {
    /// Hydrator with default page settings.
    pub fn new(source: P, store: SharedStore) -> Self {
        Self::with_settings(source, store, &HydrationSettings::default())
    }

    /// Hydrator using the `hydration` settings section.
    pub fn with_settings(source: P, store: SharedStore, settings: &HydrationSettings) -> Self {
        Self {
            source,
            store,
            page_size: settings.page_size.max(1),
            max_pages: settings.max_pages,
        }
    }

    /// The row source.
    pub fn source(&self) -> &P {
        &self.source
    }

    /// Hydrate one session until the source is exhausted, the page limit is
    /// reached, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Propagates row source failures. Pages merged before the failure are
    /// kept.
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn hydrate(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<HydrationReport> {
        let mut report = HydrationReport::default();

        let mut writer = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
            writer = self.store.lock_session(session_id) => writer,
        };

        let mut cursor: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.max_pages.is_some_and(|max| report.pages >= max) {
                debug!(pages = report.pages, "page limit reached");
                break;
            }

            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                page = self.source.fetch_page(session_id, cursor.as_deref(), self.page_size) => page?,
            };
            if page.rows.is_empty() {
                break;
            }

            report.pages += 1;
            report.rows += page.rows.len();

            let mut events = Vec::with_capacity(page.rows.len());
            for raw in &page.rows {
                match try_adapt_row_value(raw) {
                    Ok(adapted) if adapted.iter().all(|e| e.session_id == *session_id) => {
                        events.extend(adapted);
                    }
                    Ok(_) => {
                        report.rejected += 1;
                        log_reject(
                            RejectReason::MalformedRow,
                            Some(session_id.as_str()),
                            "row belongs to another session",
                        );
                    }
                    Err(reason) => {
                        report.rejected += 1;
                        let id = raw.get("id").and_then(Value::as_str).unwrap_or("<no id>");
                        log_reject(reason, Some(session_id.as_str()), &format!("row {id}"));
                    }
                }
            }

            let outcome = writer.insert_batch(events)?;
            report.inserted += outcome.inserted;
            report.duplicates += outcome.duplicates;
            debug!(
                page = report.pages,
                rows = page.rows.len(),
                inserted = outcome.inserted,
                "page merged"
            );

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            pages = report.pages,
            rows = report.rows,
            inserted = report.inserted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            cancelled = report.cancelled,
            "hydration finished"
        );
        Ok(report)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TimelineError;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    /// In-memory source paging over a fixed row list by offset.
    #[derive(Default)]
    struct VecSource {
        rows: Vec<Value>,
        calls: Mutex<Vec<Option<String>>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl RowPageSource for VecSource {
        async fn fetch_page(
            &self,
            _session_id: &SessionId,
            cursor: Option<&str>,
            limit: usize,
        ) -> Result<RowPage> {
            let call = {
                let mut calls = self.calls.lock();
                calls.push(cursor.map(String::from));
                calls.len()
            };
            if self.fail_at == Some(call) {
                return Err(TimelineError::RowSource("connection reset".into()));
            }
            let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
            let end = (start + limit).min(self.rows.len());
            Ok(RowPage {
                rows: self.rows[start..end].to_vec(),
                next_cursor: (end < self.rows.len()).then(|| end.to_string()),
            })
        }
    }

    /// Source that never answers.
    struct StalledSource;

    #[async_trait]
    impl RowPageSource for StalledSource {
        async fn fetch_page(&self, _: &SessionId, _: Option<&str>, _: usize) -> Result<RowPage> {
            std::future::pending().await
        }
    }

    fn row(i: usize) -> Value {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        json!({
            "id": format!("r{i}"),
            "session_id": "s1",
            "role": role,
            "content": format!("message {i}"),
            "created_at": 1_700_000_000 + i as i64
        })
    }

    fn settings(page_size: usize, max_pages: Option<usize>) -> HydrationSettings {
        HydrationSettings {
            page_size,
            max_pages,
        }
    }

    fn sid() -> SessionId {
        SessionId::from("s1")
    }

    #[tokio::test]
    async fn hydrates_all_pages_in_order() {
        let store = SharedStore::new();
        let source = VecSource {
            rows: (0..7).map(row).collect(),
            ..Default::default()
        };
        let hydrator = Hydrator::with_settings(source, store.clone(), &settings(3, None));
        let report = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.rows, 7);
        assert_eq!(report.inserted, 7);
        assert!(!report.cancelled);
        assert_eq!(
            *hydrator.source().calls.lock(),
            vec![None, Some("3".to_string()), Some("6".to_string())]
        );
        let ids: Vec<_> = store.session_events(&sid()).iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, (0..7).map(|i| format!("r{i}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn redundant_hydration_converges() {
        let store = SharedStore::new();
        let source = VecSource {
            rows: (0..5).map(row).collect(),
            ..Default::default()
        };
        let hydrator = Hydrator::with_settings(source, store.clone(), &settings(2, None));
        let _ = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
        let before = store.session_events(&sid());

        let again = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 5);
        assert_eq!(store.session_events(&sid()), before);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let store = SharedStore::new();
        let source = VecSource {
            rows: (0..10).map(row).collect(),
            ..Default::default()
        };
        let hydrator = Hydrator::with_settings(source, store.clone(), &settings(2, Some(2)));
        let report = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn rejected_rows_are_counted() {
        let store = SharedStore::new();
        let mut rows: Vec<Value> = (0..3).map(row).collect();
        rows.push(json!({"id": "bad", "session_id": "s1", "role": "system", "content": "x", "created_at": 1}));
        rows.push(json!({"id": "other", "session_id": "s2", "role": "user", "content": "x", "created_at": 1}));
        let source = VecSource {
            rows,
            ..Default::default()
        };
        let hydrator = Hydrator::new(source, store.clone());
        let report = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.rejected, 2);
        assert_eq!(report.inserted, 3);
        assert!(store.session_events(&"s2".into()).is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let store = SharedStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let hydrator = Hydrator::new(StalledSource, store.clone());
        let report = hydrator.hydrate(&sid(), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.pages, 0);
    }

    #[tokio::test]
    async fn cancel_interrupts_in_flight_fetch() {
        let store = SharedStore::new();
        let cancel = CancellationToken::new();
        let hydrator = Arc::new(Hydrator::new(StalledSource, store.clone()));

        let task = {
            let hydrator = Arc::clone(&hydrator);
            let cancel = cancel.clone();
            tokio::spawn(async move { hydrator.hydrate(&sid(), &cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        let report = task.await.unwrap().unwrap();
        assert!(report.cancelled);
        // The session writer was released.
        let _writer = store.lock_session(&sid()).await;
    }

    #[tokio::test]
    async fn source_error_keeps_merged_pages() {
        let store = SharedStore::new();
        let source = VecSource {
            rows: (0..6).map(row).collect(),
            fail_at: Some(2),
            ..Default::default()
        };
        let hydrator = Hydrator::with_settings(source, store.clone(), &settings(3, None));
        let err = hydrator.hydrate(&sid(), &CancellationToken::new()).await.unwrap_err();
        assert_matches!(err, TimelineError::RowSource(_));
        assert_eq!(store.len(), 3);
    }
}
