//! Error types for the timeline engine.
//!
//! Two families live here:
//!
//! - [`TimelineError`]: returned by fallible store, resolver and hydration
//!   operations.
//! - [`RejectReason`]: why an adapter dropped a raw payload. Rejections are
//!   logged and counted, never raised, so one malformed event cannot
//!   interrupt a stream.

use std::fmt;

use thiserror::Error;

use crate::source_control::SourceControlError;

/// Errors that can occur during timeline operations.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The session has no events in the store.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The requested checkpoint is not part of the session.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// The event exists but is not a checkpoint.
    #[error("event is not a checkpoint: {0}")]
    NotACheckpoint(String),

    /// Invalid operation on the store.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The source control capability failed.
    #[error("source control error: {0}")]
    SourceControl(#[from] SourceControlError),

    /// A row page could not be fetched.
    #[error("row source error: {0}")]
    RowSource(String),

    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience type alias for timeline results.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Why an adapter rejected a raw payload (a shape mismatch).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Payload is not a JSON object or lacks a type tag.
    MalformedEnvelope,
    /// Type tag is not one the live adapter understands.
    UnrecognizedType,
    /// No session id on the envelope or row.
    MissingSessionId,
    /// Chunk carries neither a delta nor complete content.
    EmptyChunk,
    /// `tool_call` without `data.tool_call`.
    MissingToolCall,
    /// Tool call without a usable name.
    MissingToolName,
    /// Tool result without any call id to pair against.
    MissingToolCallId,
    /// No tool-result extraction strategy matched.
    UnrecognizedToolResult,
    /// Checkpoint payload failed to decode.
    MalformedCheckpoint,
    /// Message payload without text content.
    MissingContent,
    /// Row failed to decode.
    MalformedRow,
    /// Row role is not user/assistant/tool.
    UnknownRole,
    /// Rich content part with an unknown type.
    UnknownContentPart,
    /// Timestamp present but unparseable.
    InvalidTimestamp,
}

impl RejectReason {
    /// Stable reason code used in logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedEnvelope => "malformed_envelope",
            Self::UnrecognizedType => "unrecognized_type",
            Self::MissingSessionId => "missing_session_id",
            Self::EmptyChunk => "empty_chunk",
            Self::MissingToolCall => "missing_tool_call",
            Self::MissingToolName => "missing_tool_name",
            Self::MissingToolCallId => "missing_tool_call_id",
            Self::UnrecognizedToolResult => "unrecognized_tool_result",
            Self::MalformedCheckpoint => "malformed_checkpoint",
            Self::MissingContent => "missing_content",
            Self::MalformedRow => "malformed_row",
            Self::UnknownRole => "unknown_role",
            Self::UnknownContentPart => "unknown_content_part",
            Self::InvalidTimestamp => "invalid_timestamp",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
