//! Discriminator enums for canonical events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a canonical event represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A complete message.
    Message,
    /// An incremental fragment of a still-streaming message.
    Chunk,
    /// A tool invocation issued by the assistant.
    ToolCall,
    /// The outcome of a tool invocation.
    ToolResult,
    /// The agent finished a turn or went idle.
    CompletionSignal,
    /// A version-control save point.
    Checkpoint,
}

/// All event kinds, for exhaustive testing.
pub const ALL_EVENT_KINDS: &[EventKind] = &[
    EventKind::Message,
    EventKind::Chunk,
    EventKind::ToolCall,
    EventKind::ToolResult,
    EventKind::CompletionSignal,
    EventKind::Checkpoint,
];

impl EventKind {
    /// Wire string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Chunk => "chunk",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::CompletionSignal => "completion_signal",
            Self::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human.
    User,
    /// The agent.
    Assistant,
    /// Tool output.
    Tool,
}

impl Role {
    /// Parse a wire role. Unknown roles yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "agent" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// Provenance of an event. Diagnostics only; reconciliation never branches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Live push channel.
    Live,
    /// Backing relational store.
    Stored,
    /// In-memory, not yet persisted message.
    Memory,
}
