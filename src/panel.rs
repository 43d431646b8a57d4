//! Feedback panels and the chat transcript.
//!
//! Panel items carry an explicit [`ItemEvent`] describing what a click on
//! them means; the workspace looks the record up at click time.

use serde::{Deserialize, Serialize};

use crate::palette::{color_for_index, Rgb};

/// Shown in place of the feedback list when a request fails.
pub const FEEDBACK_FALLBACK: &str = "Error processing feedback.";

/// One role/content pair of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// What clicking a panel item does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    /// Evaluation feedback: start a focused conversation about it.
    Discuss {
        question_id: String,
        feedback_text: String,
        fragment_index: usize,
    },
    /// A routed chat reply: seed the chat input with `[target] text`.
    SeedChat { target: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelItem {
    pub label: String,
    pub color: Rgb,
    pub event: ItemEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackPanel {
    pub items: Vec<PanelItem>,
    /// Status text shown instead of (or above) the items.
    pub notice: Option<String>,
    /// Loading indicator visibility.
    pub loading: bool,
}

impl FeedbackPanel {
    /// Replace the panel content with one clickable item per feedback string.
    pub fn render(&mut self, question_id: &str, feedback: &[String]) {
        self.items = feedback
            .iter()
            .enumerate()
            .map(|(i, text)| PanelItem {
                label: text.clone(),
                color: color_for_index(i),
                event: ItemEvent::Discuss {
                    question_id: question_id.to_string(),
                    feedback_text: text.clone(),
                    fragment_index: i,
                },
            })
            .collect();
        self.notice = None;
    }

    /// Append a routed reply. Its color continues the panel's index sequence.
    pub fn append_routed(&mut self, target: &str, text: &str) {
        let color = color_for_index(self.items.len());
        self.items.push(PanelItem {
            label: text.to_string(),
            color,
            event: ItemEvent::SeedChat {
                target: target.to_string(),
                text: text.to_string(),
            },
        });
    }

    /// Drop all items and replace them with the failure notice.
    pub fn show_fallback(&mut self) {
        self.items.clear();
        self.notice = Some(FEEDBACK_FALLBACK.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.notice = None;
    }
}

/// One rendered line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Message(ChatMessage),
    /// An outgoing message shown side by side with its reply.
    Exchange { sent: String, response: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    pub entries: Vec<TranscriptEntry>,
    pub loading: bool,
}

impl ChatTranscript {
    /// Replace the whole transcript with a conversation.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.entries = messages.into_iter().map(TranscriptEntry::Message).collect();
    }

    pub fn push_exchange(&mut self, sent: &str, response: &str) {
        self.entries.push(TranscriptEntry::Exchange {
            sent: sent.to_string(),
            response: response.to_string(),
        });
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.entries.push(TranscriptEntry::Message(message));
    }
}
