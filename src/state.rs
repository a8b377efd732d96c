//! Chat transcript types
//!
//! The transcript is append-only. The one mutation allowed after a bubble
//! is appended is resolving a pending placeholder, and that happens once.

use serde::{Deserialize, Serialize};

/// Text shown in an incoming bubble while its reply is in flight
pub const PLACEHOLDER_TEXT: &str = "Thinking...";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// Typed by the user
    Outgoing,
    /// Sent back by the chat endpoint
    Incoming,
}

/// A single bubble in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub pending: bool,
}

/// Refers to a bubble so its text can be filled in later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleHandle(usize);

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: ChatRole, text: &str) -> BubbleHandle {
        self.push(ChatMessage {
            role,
            text: text.to_string(),
            pending: false,
        })
    }

    /// Append an incoming bubble that waits for its reply
    pub fn append_placeholder(&mut self) -> BubbleHandle {
        self.push(ChatMessage {
            role: ChatRole::Incoming,
            text: PLACEHOLDER_TEXT.to_string(),
            pending: true,
        })
    }

    /// Replace a pending bubble's text. Returns false if the handle is
    /// unknown or the bubble was already resolved.
    pub fn resolve(&mut self, handle: BubbleHandle, text: &str) -> bool {
        match self.messages.get_mut(handle.0) {
            Some(msg) if msg.pending => {
                msg.text = text.to_string();
                msg.pending = false;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, handle: BubbleHandle) -> Option<&ChatMessage> {
        self.messages.get(handle.0)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.pending)
    }

    fn push(&mut self, msg: ChatMessage) -> BubbleHandle {
        self.messages.push(msg);
        BubbleHandle(self.messages.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_sequential_handles() {
        let mut transcript = Transcript::new();
        let first = transcript.append(ChatRole::Outgoing, "hello");
        let second = transcript.append_placeholder();

        assert_ne!(first, second);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.get(first).unwrap().text, "hello");
        assert_eq!(transcript.get(second).unwrap().text, PLACEHOLDER_TEXT);
        assert_eq!(transcript.get(second).unwrap().role, ChatRole::Incoming);
    }

    #[test]
    fn test_placeholder_resolves_once() {
        let mut transcript = Transcript::new();
        let handle = transcript.append_placeholder();
        assert!(transcript.has_pending());

        assert!(transcript.resolve(handle, "Hi"));
        assert!(!transcript.resolve(handle, "again"));

        let msg = transcript.get(handle).unwrap();
        assert_eq!(msg.text, "Hi");
        assert!(!msg.pending);
        assert!(!transcript.has_pending());
    }

    #[test]
    fn test_plain_bubbles_cannot_be_resolved() {
        let mut transcript = Transcript::new();
        let handle = transcript.append(ChatRole::Outgoing, "hello");
        assert!(!transcript.resolve(handle, "changed"));
        assert_eq!(transcript.get(handle).unwrap().text, "hello");
    }
}
