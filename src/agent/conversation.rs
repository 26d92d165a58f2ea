//! Conversation messages and session input
//!
//! [`SessionInput`] is what sits in a session's input queue. An agent only
//! understands two conversational roles, so [`SessionInput::to_conversation_message`]
//! is the one place an injection is flattened into a user message.

use serde::{Deserialize, Serialize};

use crate::injection::Injection;

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    /// The user (prompts and injected watcher messages)
    User,
    /// The agent
    Assistant,
}

/// One message of a two-role conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Speaker
    pub role: ConversationRole,
    /// Message text
    pub content: String,
}

impl ConversationMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content: content.into(),
        }
    }

    /// The injection this message carries, if it is an injected user message
    #[must_use]
    pub fn as_injection(&self) -> Option<Injection> {
        match self.role {
            ConversationRole::User => Injection::decode_wire(&self.content),
            ConversationRole::Assistant => None,
        }
    }
}

/// Item of a session's input queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Prompt from the session's own user
    Prompt(String),
    /// Message from a watcher
    Injection(Injection),
}

impl SessionInput {
    /// Encode into the two-role form handed to an agent
    #[must_use]
    pub fn to_conversation_message(&self) -> ConversationMessage {
        match self {
            Self::Prompt(text) => ConversationMessage::user(text.clone()),
            Self::Injection(injection) => ConversationMessage::user(injection.encode_wire()),
        }
    }

    /// Short label for log lines
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Prompt(_) => "prompt",
            Self::Injection(_) => "injection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RoleAuthority, SessionId};

    #[test]
    fn injection_encoded_only_at_conversation_boundary() {
        let injection = Injection::new(
            SessionId::new(),
            "reviewer",
            RoleAuthority::Supervisor,
            "add a test",
            false,
        )
        .unwrap();
        let input = SessionInput::Injection(injection.clone());

        let message = input.to_conversation_message();
        assert_eq!(message.role, ConversationRole::User);
        assert!(message.content.starts_with("[WATCHER: reviewer | Authority: Supervisor"));

        let seen = message.as_injection().unwrap();
        assert_eq!(seen.watcher_id, injection.watcher_id);
        assert_eq!(seen.content, "add a test");
    }

    #[test]
    fn prompts_pass_through_unchanged() {
        let message = SessionInput::Prompt("hello".into()).to_conversation_message();
        assert_eq!(message, ConversationMessage::user("hello"));
        assert_eq!(message.as_injection(), None);
        assert_eq!(ConversationMessage::assistant("[WATCHER: x").as_injection(), None);
    }
}
