//! # threadline-timeline
//!
//! Event reconciliation for agent chat sessions. Turns payloads from a live
//! push channel and a relational store into one ordered, deduplicated
//! timeline per session.
//!
//! - **Canonical events**: source-agnostic `CanonicalEvent` with a payload enum per kind
//! - **Source adapters**: live envelopes, relational rows, in-memory messages
//! - **Merge**: owner repair, dedup by identity precedence, stable ordering
//! - **Pairing**: tool calls matched with their results for rendering
//! - **Checkpoints**: diff base resolution along the commit chain
//! - **Store**: session-indexed canonical store with a single writer per session
//! - **Hydration**: cancellable paged loading from a `RowPageSource`, with a `SQLite` implementation
//! - **Streams**: running text of still-streaming messages

#![deny(unsafe_code)]

pub mod adapters;
pub mod checkpoint;
pub mod errors;
pub mod hydrate;
pub mod merge;
pub mod pairing;
pub mod source_control;
pub mod sqlite;
pub mod store;
pub mod stream;
pub mod types;

pub use checkpoint::{
    resolve_diff_base, CheckpointDiff, CheckpointResolver, DiffBase, DiffPlan, PendingReason,
};
pub use errors::{RejectReason, Result, TimelineError};
pub use hydrate::{HydrationReport, Hydrator, RowPage, RowPageSource};
pub use merge::{dedup_key, merge_events};
pub use pairing::{pair_tool_interactions, UNKNOWN_TOOL_NAME};
pub use source_control::{SourceControl, SourceControlError};
pub use store::{BatchOutcome, CanonicalStore, InsertOutcome, SessionWriter, SharedStore};
pub use stream::{assemble_streams, stream_text, StreamingText};
pub use types::{
    CanonicalEvent, EventBody, EventKind, InteractionStatus, Role, Source, TimelineEntry,
    ToolInteraction,
};
