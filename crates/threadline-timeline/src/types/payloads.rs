//! Kind-specific payloads carried by canonical events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use threadline_core::ToolCallId;

/// A tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Invocation id; results reference it as `toolCallId`.
    pub call_id: ToolCallId,
    /// Tool name.
    pub name: String,
    /// Tool arguments as sent by the model.
    #[serde(default)]
    pub arguments: Value,
}

/// The outcome of a tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// The call this result answers.
    pub tool_call_id: ToolCallId,
    /// Result content. JSON-looking strings have already been parsed.
    pub content: Value,
    /// Success flag reported by the source (defaults to `true`).
    pub ok: bool,
    /// Error text reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Whether this result represents a failed invocation.
    pub fn is_failure(&self) -> bool {
        !self.ok || self.error.is_some()
    }
}

/// Why a completion signal was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// A message stream finished.
    Done,
    /// The agent reported the session idle.
    Idle,
}

/// Start or end of a unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPhase {
    /// Work unit (or save point) started.
    Start,
    /// Work unit ended.
    End,
}

/// Change statistics recorded with a checkpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointStats {
    /// Number of files touched.
    #[serde(alias = "files_changed")]
    pub files_changed: u32,
    /// Lines added.
    #[serde(alias = "lines_added", alias = "insertions")]
    pub lines_added: u32,
    /// Lines removed.
    #[serde(alias = "lines_removed", alias = "deletions")]
    pub lines_removed: u32,
    /// Paths touched.
    #[serde(alias = "file_list", alias = "files")]
    pub file_list: Vec<String>,
}

/// A version-control save point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Which boundary this checkpoint marks.
    pub phase: CheckpointPhase,
    /// Commit hash, attached once the underlying commit completes.
    #[serde(default, alias = "commit_hash")]
    pub commit_hash: Option<String>,
    /// Change statistics.
    #[serde(default)]
    pub stats: CheckpointStats,
}

impl Checkpoint {
    /// Commit hash if attached and non-empty.
    pub fn commit(&self) -> Option<&str> {
        self.commit_hash.as_deref().filter(|h| !h.trim().is_empty())
    }

    /// Take `other`'s commit hash if this checkpoint has none yet.
    /// Returns whether a hash was filled in.
    pub fn adopt_commit(&mut self, other: &Checkpoint) -> bool {
        if self.commit().is_some() {
            return false;
        }
        let Some(hash) = other.commit() else {
            return false;
        };
        self.commit_hash = Some(hash.to_owned());
        true
    }
}
