//! [`RowPageSource`] over a `messages` table.
//!
//! Pages are keyset-paginated on `(created_at, id)`, so rows inserted while a
//! hydration is running never shift page boundaries. The cursor is the JSON
//! array `[created_at, id]` of the last row returned.
//!
//! `content` holds either plain text or a JSON array of content parts.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use threadline_core::SessionId;
use tracing::debug;

use super::connection::{ConnectionPool, PooledConnection};
use crate::adapters::StoredRow;
use crate::errors::{Result, TimelineError};
use crate::hydrate::{RowPage, RowPageSource};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL,
    role         TEXT NOT NULL,
    content      TEXT NOT NULL,
    created_at   NOT NULL,
    message_id   TEXT,
    tool_call_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_session_order
    ON messages (session_id, created_at, id);
";

/// Relational row source backed by `SQLite`.
#[derive(Clone)]
pub struct SqliteRowSource {
    pool: ConnectionPool,
}

impl SqliteRowSource {
    /// Source over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Create the `messages` table and its ordering index if missing.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert or replace one row.
    pub fn upsert_row(&self, row: &StoredRow) -> Result<()> {
        let content = match serde_json::to_value(&row.content)? {
            Value::String(text) => text,
            parts => serde_json::to_string(&parts)?,
        };
        let created_at = json_to_sql(&serde_json::to_value(&row.created_at)?)
            .ok_or_else(|| TimelineError::InvalidOperation(format!("row {}: bad created_at", row.id)))?;
        let _ = self.conn()?.execute(
            "INSERT OR REPLACE INTO messages
             (id, session_id, role, content, created_at, message_id, tool_call_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.session_id,
                row.role,
                content,
                created_at,
                row.message_id,
                row.tool_call_id
            ],
        )?;
        Ok(())
    }

    /// Fetch one page synchronously.
    pub fn fetch_page_blocking(
        &self,
        session_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RowPage> {
        let conn = self.conn()?;
        let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);
        let mut rows = match cursor {
            None => query_rows(
                &conn,
                "WHERE session_id = ?1 ORDER BY created_at, id LIMIT ?2",
                params![session_id, fetch],
            )?,
            Some(cursor) => {
                let (after_at, after_id) = decode_cursor(cursor)?;
                query_rows(
                    &conn,
                    "WHERE session_id = ?1
                       AND (created_at > ?2 OR (created_at = ?2 AND id > ?3))
                     ORDER BY created_at, id LIMIT ?4",
                    params![session_id, after_at, after_id, fetch],
                )?
            }
        };

        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(encode_cursor)
        } else {
            None
        };
        debug!(session_id, rows = rows.len(), more = next_cursor.is_some(), "row page fetched");
        Ok(RowPage { rows, next_cursor })
    }
}

#[async_trait]
impl RowPageSource for SqliteRowSource {
    async fn fetch_page(
        &self,
        session_id: &SessionId,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<RowPage> {
        let source = self.clone();
        let session_id = session_id.to_string();
        let cursor = cursor.map(String::from);
        tokio::task::spawn_blocking(move || {
            source.fetch_page_blocking(&session_id, cursor.as_deref(), limit)
        })
        .await
        .map_err(|e| TimelineError::RowSource(e.to_string()))?
    }
}

fn query_rows(conn: &Connection, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Value>> {
    let sql = format!(
        "SELECT id, session_id, role, content, created_at, message_id, tool_call_id
         FROM messages {filter}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, |row| {
            let content: String = row.get(3)?;
            let created_at: SqlValue = row.get(4)?;
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "session_id": row.get::<_, String>(1)?,
                "role": row.get::<_, String>(2)?,
                "content": decode_content(content),
                "created_at": sql_to_json(created_at),
                "message_id": row.get::<_, Option<String>>(5)?,
                "tool_call_id": row.get::<_, Option<String>>(6)?,
            }))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A JSON array of typed parts becomes a part list; anything else is text.
fn decode_content(content: String) -> Value {
    if content.trim_start().starts_with('[') {
        if let Ok(Value::Array(parts)) = serde_json::from_str::<Value>(&content) {
            let typed = !parts.is_empty()
                && parts
                    .iter()
                    .all(|p| p.get("type").and_then(Value::as_str).is_some());
            if typed {
                return Value::Array(parts);
            }
        }
    }
    Value::String(content)
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Integer(n) => json!(n),
        SqlValue::Real(f) => json!(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Null | SqlValue::Blob(_) => Value::Null,
    }
}

fn json_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        _ => None,
    }
}

fn encode_cursor(row: &Value) -> String {
    let created_at = row.get("created_at").cloned().unwrap_or(Value::Null);
    let id = row.get("id").cloned().unwrap_or(Value::Null);
    Value::Array(vec![created_at, id]).to_string()
}

fn decode_cursor(cursor: &str) -> Result<(SqlValue, String)> {
    let invalid = || TimelineError::RowSource(format!("invalid cursor: {cursor}"));
    let parsed: (Value, String) = serde_json::from_str(cursor).map_err(|_| invalid())?;
    let created_at = json_to_sql(&parsed.0).ok_or_else(invalid)?;
    Ok((created_at, parsed.1))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
