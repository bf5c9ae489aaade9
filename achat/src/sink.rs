//! Callback contract between a generation run and whoever displays it.
//!
//! A run calls [`ChatSink::on_chunk`] zero or more times, then exactly one of
//! [`ChatSink::on_done`], [`ChatSink::on_error`], or [`ChatSink::on_aborted`]. Native and
//! synthetic streaming look identical from here.

use acommon::{MessageId, SessionId};

use crate::ChatError;

/// One forwarded increment, tagged with the message it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDelta {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub content: String,
    pub reasoning: String,
}

pub trait ChatSink: Send {
    fn on_chunk(&mut self, delta: &ChunkDelta);

    fn on_done(&mut self, final_text: &str, final_reasoning: &str);

    fn on_error(&mut self, error: &ChatError);

    fn on_aborted(&mut self, partial_text: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Chunk(ChunkDelta),
    Done { text: String, reasoning: String },
    Error(ChatError),
    Aborted { partial_text: String },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }
}

/// Records every callback in order.
impl ChatSink for Vec<ChatEvent> {
    fn on_chunk(&mut self, delta: &ChunkDelta) {
        self.push(ChatEvent::Chunk(delta.clone()));
    }

    fn on_done(&mut self, final_text: &str, final_reasoning: &str) {
        self.push(ChatEvent::Done {
            text: final_text.to_string(),
            reasoning: final_reasoning.to_string(),
        });
    }

    fn on_error(&mut self, error: &ChatError) {
        self.push(ChatEvent::Error(error.clone()));
    }

    fn on_aborted(&mut self, partial_text: &str) {
        self.push(ChatEvent::Aborted {
            partial_text: partial_text.to_string(),
        });
    }
}

/// Concatenated content of every chunk event.
pub fn streamed_content(events: &[ChatEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            ChatEvent::Chunk(delta) => Some(delta.content.as_str()),
            _ => None,
        })
        .collect()
}
