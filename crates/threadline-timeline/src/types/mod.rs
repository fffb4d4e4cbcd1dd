//! Canonical event model.
//!
//! - [`CanonicalEvent`]: the source-agnostic unit of the timeline.
//! - [`EventBody`]: kind-specific payload; the event kind is derived from it.
//! - [`EventKind`], [`Role`], [`Source`]: discriminators.
//! - [`ToolInteraction`], [`TimelineEntry`]: derived render views, never stored.

pub mod event;
pub mod interaction;
pub mod kind;
pub mod payloads;

pub use event::{CanonicalEvent, EventBody};
pub use interaction::{InteractionStatus, TimelineEntry, ToolInteraction};
pub use kind::{EventKind, Role, Source};
pub use payloads::{
    Checkpoint, CheckpointPhase, CheckpointStats, CompletionReason, ToolCall, ToolResult,
};
