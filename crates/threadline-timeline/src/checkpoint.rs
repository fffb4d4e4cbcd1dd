//! Checkpoint diff-chain resolution.
//!
//! Checkpoints never record their predecessor. The diff base of a checkpoint
//! is derived from its position in the session's ordered checkpoint list:
//! the first checkpoint diffs against the session's base commit, every later
//! one against the nearest preceding checkpoint's commit.
//!
//! [`resolve_diff_base`] is the pure part; [`CheckpointResolver`] adds the
//! two [`SourceControl`] calls.

use std::path::Path;

use tracing::debug;

use crate::errors::{Result, TimelineError};
use crate::source_control::SourceControl;
use crate::store::SharedStore;
use crate::types::{CanonicalEvent, Checkpoint};
use threadline_core::SessionId;

/// What a checkpoint is compared against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffBase {
    /// The commit the session started from; resolved through source control.
    SessionBase,
    /// The nearest preceding checkpoint's commit.
    Commit(String),
}

/// Why a checkpoint cannot be diffed yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingReason {
    /// The target checkpoint has no commit attached yet.
    TargetCommitMissing,
    /// The preceding checkpoint has no commit attached yet.
    PreviousCommitMissing,
}

/// Outcome of diff-base resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffPlan {
    /// Both ends are known.
    Ready {
        /// Diff start.
        base: DiffBase,
        /// The target checkpoint's commit.
        target_commit: String,
    },
    /// Not diffable yet. Not an error.
    Pending {
        /// What is missing.
        reason: PendingReason,
    },
}

/// Outcome of a full diff request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointDiff {
    /// Diff produced by source control.
    Ready {
        /// How the base was chosen.
        base: DiffBase,
        /// Concrete commit the diff starts from.
        from_commit: String,
        /// The target checkpoint's commit.
        target_commit: String,
        /// Textual diff.
        diff: String,
    },
    /// Not diffable yet.
    Pending {
        /// What is missing.
        reason: PendingReason,
    },
}

impl CheckpointDiff {
    /// Whether the diff is still waiting on a commit.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Resolve the diff base of `target` within one session's events.
///
/// `events` is the session's stored sequence; non-checkpoint events are
/// ignored when locating the predecessor.
///
/// # Errors
///
/// - [`TimelineError::CheckpointNotFound`] if no event has id `target`.
/// - [`TimelineError::NotACheckpoint`] if that event is not a checkpoint.
pub fn resolve_diff_base(events: &[CanonicalEvent], target: &str) -> Result<DiffPlan> {
    let mut previous: Option<&Checkpoint> = None;
    for event in events {
        let Some(checkpoint) = event.as_checkpoint() else {
            if event.id.as_str() == target {
                return Err(TimelineError::NotACheckpoint(target.to_string()));
            }
            continue;
        };
        if event.id.as_str() != target {
            previous = Some(checkpoint);
            continue;
        }

        let Some(target_commit) = checkpoint.commit() else {
            return Ok(DiffPlan::Pending {
                reason: PendingReason::TargetCommitMissing,
            });
        };
        let base = match previous {
            None => DiffBase::SessionBase,
            Some(prev) => match prev.commit() {
                Some(hash) => DiffBase::Commit(hash.to_string()),
                None => {
                    return Ok(DiffPlan::Pending {
                        reason: PendingReason::PreviousCommitMissing,
                    });
                }
            },
        };
        return Ok(DiffPlan::Ready {
            base,
            target_commit: target_commit.to_string(),
        });
    }
    Err(TimelineError::CheckpointNotFound(target.to_string()))
}

/// Produces checkpoint diffs through a [`SourceControl`] capability.
pub struct CheckpointResolver<S> {
    source_control: S,
}

impl<S: SourceControl> CheckpointResolver<S> {
    /// Resolver backed by `source_control`.
    pub fn new(source_control: S) -> Self {
        Self { source_control }
    }

    /// The wrapped capability.
    pub fn source_control(&self) -> &S {
        &self.source_control
    }

    /// Diff `target` against its base, given the session's events.
    #[tracing::instrument(skip_all, fields(session_id = %session_id, checkpoint = target))]
    pub async fn diff(
        &self,
        session_id: &SessionId,
        project_path: &Path,
        events: &[CanonicalEvent],
        target: &str,
    ) -> Result<CheckpointDiff> {
        let (base, target_commit) = match resolve_diff_base(events, target)? {
            DiffPlan::Pending { reason } => {
                debug!(?reason, "checkpoint diff pending");
                return Ok(CheckpointDiff::Pending { reason });
            }
            DiffPlan::Ready {
                base,
                target_commit,
            } => (base, target_commit),
        };

        let from_commit = match &base {
            DiffBase::SessionBase => {
                self.source_control
                    .base_commit(session_id.as_str(), project_path)
                    .await?
            }
            DiffBase::Commit(hash) => hash.clone(),
        };
        let diff = self
            .source_control
            .diff(project_path, &from_commit, &target_commit)
            .await?;

        Ok(CheckpointDiff::Ready {
            base,
            from_commit,
            target_commit,
            diff,
        })
    }

    /// Diff `target` using a snapshot of the session from `store`.
    pub async fn diff_in_store(
        &self,
        store: &SharedStore,
        session_id: &SessionId,
        project_path: &Path,
        target: &str,
    ) -> Result<CheckpointDiff> {
        let events = store.session_events(session_id);
        self.diff(session_id, project_path, &events, target).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
