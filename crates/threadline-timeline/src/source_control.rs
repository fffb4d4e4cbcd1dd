//! The Source Control capability.
//!
//! The checkpoint resolver never runs a version-control tool itself. Whatever
//! embeds the engine provides an implementation of [`SourceControl`] (a git
//! CLI wrapper, a libgit binding, a remote service) and the resolver only
//! calls these two operations.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a [`SourceControl`] implementation.
#[derive(Debug, Error)]
pub enum SourceControlError {
    /// The session has no recorded base commit.
    #[error("no base commit recorded for session {0}")]
    NoBaseCommit(String),

    /// A commit referenced by a checkpoint does not exist.
    #[error("unknown commit: {0}")]
    UnknownCommit(String),

    /// The project path is not a repository.
    #[error("not a repository: {0}")]
    NotARepository(String),

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Narrow interface to the version-control system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Textual diff between two commits of the project.
    async fn diff(
        &self,
        project_path: &Path,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<String, SourceControlError>;

    /// Commit the session started from.
    async fn base_commit(
        &self,
        session_id: &str,
        project_path: &Path,
    ) -> Result<String, SourceControlError>;
}
