//! The Canonical Store.
//!
//! [`CanonicalStore`] is the only mutable state in the engine: an arena of
//! canonical events plus a per-session ordered index. It is a plain value
//! with no global instance. [`SharedStore`] wraps it for concurrent use and
//! enforces a single writer per session.

mod canonical_store;
mod shared;

pub use canonical_store::*;
pub use shared::*;
