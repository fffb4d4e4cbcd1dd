//! # threadline-core
//!
//! Foundation types shared by the threadline crates:
//!
//! - **Branded IDs**: `EventId`, `SessionId`, `MessageId`, `ToolCallId` newtypes
//! - **Timestamps**: normalization of the mixed timestamp shapes sources send
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod time;

pub use ids::{EventId, MessageId, SessionId, ToolCallId};
pub use time::{now_millis, Timestamp};
