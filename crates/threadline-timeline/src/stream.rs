//! Streaming text view.
//!
//! Chunk events are retained individually by the merge; this module folds
//! them back into one running text per message for display. Groups appear in
//! the order their first chunk appears. Chunks without a message id share one
//! anonymous group.

use serde::Serialize;
use threadline_core::MessageId;

use crate::types::{CanonicalEvent, EventBody};

/// Text assembled from the chunks of one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingText {
    /// Message the chunks belong to; `None` for the anonymous group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Concatenated deltas.
    pub text: String,
    /// Whether any chunk is still partial.
    pub partial: bool,
    /// Timestamp of the first chunk.
    pub first_at: i64,
    /// Timestamp of the last chunk.
    pub last_at: i64,
    /// Number of chunks folded in.
    pub chunks: usize,
}

/// Fold chunk deltas into one [`StreamingText`] per message.
///
/// Expects events in timeline order; deltas are concatenated in the order
/// given.
pub fn assemble_streams(events: &[CanonicalEvent]) -> Vec<StreamingText> {
    let mut streams: Vec<StreamingText> = Vec::new();
    for event in events {
        let EventBody::Chunk { delta } = &event.body else {
            continue;
        };
        match streams
            .iter_mut()
            .find(|s| s.message_id == event.message_id)
        {
            Some(stream) => {
                stream.text.push_str(delta);
                stream.partial |= event.partial;
                stream.first_at = stream.first_at.min(event.created_at);
                stream.last_at = stream.last_at.max(event.created_at);
                stream.chunks += 1;
            }
            None => streams.push(StreamingText {
                message_id: event.message_id.clone(),
                text: delta.clone(),
                partial: event.partial,
                first_at: event.created_at,
                last_at: event.created_at,
                chunks: 1,
            }),
        }
    }
    streams
}

/// Running text of one message, or `None` when it has no chunks.
pub fn stream_text(events: &[CanonicalEvent], message_id: &MessageId) -> Option<String> {
    let mut text: Option<String> = None;
    for event in events
        .iter()
        .filter(|e| e.message_id.as_ref() == Some(message_id))
    {
        if let EventBody::Chunk { delta } = &event.body {
            text.get_or_insert_with(String::new).push_str(delta);
        }
    }
    text
}
