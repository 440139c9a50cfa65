//! Conversation messages

use super::Citation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One turn half. Message order in history is insertion order and is the sole
/// source of truth for the conversation; history is never reordered or
/// deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub citations_used: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: content.into(),
            citations_used: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, citations_used: Vec<Citation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: content.into(),
            citations_used,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        let user = Message::user("what were net sales?");
        assert_eq!(user.role, MessageRole::User);
        assert!(user.citations_used.is_empty());

        let assistant = Message::assistant("Net sales were $100M.", Vec::new());
        assert_eq!(assistant.role, MessageRole::Assistant);
    }
}
