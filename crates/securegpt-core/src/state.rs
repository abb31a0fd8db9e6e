//! UI-agnostic chat data types
//!
//! These are the records owned by [`crate::store::ChatStore`] and shared with
//! whichever front end renders them. The serde shape matches the JSON the
//! chat history has always been persisted in.

use serde::{Deserialize, Serialize};

/// Content shown in an assistant message while its answer is pending
pub const THINKING_PLACEHOLDER: &str = "Thinking";

/// Shown in place of an answer when the model could not be reached
pub const INFERENCE_ERROR_MESSAGE: &str =
    "I encountered an error while generating a response. Please try again.";

/// A chat message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(rename = "isThinking", default, skip_serializing_if = "is_false")]
    pub is_thinking: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            is_thinking: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_thinking: false,
        }
    }

    /// Assistant placeholder inserted while waiting on the model
    pub fn thinking() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: THINKING_PLACEHOLDER.to_string(),
            is_thinking: true,
        }
    }
}

/// Fields overwritten on the last message of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: String,
    pub is_thinking: bool,
}

impl MessagePatch {
    /// A final, non-pending answer
    pub fn resolved(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_thinking: false,
        }
    }
}

/// A named, ordered sequence of messages with a stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let json = serde_json::to_string(&ChatMessage::thinking()).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Thinking","isThinking":true}"#);

        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_missing_thinking_flag_defaults_to_false() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).unwrap();
        assert!(!msg.is_thinking);
        assert_eq!(msg.role, ChatRole::Assistant);
    }

    #[test]
    fn test_new_conversations_get_distinct_ids() {
        let a = Conversation::new("a");
        let b = Conversation::new("b");
        assert_ne!(a.id, b.id);
        assert!(a.messages.is_empty());
    }
}
