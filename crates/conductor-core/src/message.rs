//! Chat message types.

use crate::sanitize::{ContentError, sanitize_content};
use serde::{Deserialize, Serialize};

/// Message role. The set is closed; unknown roles fail deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation message. Immutable once appended to a history.
///
/// Content is sanitized at construction; see [`crate::sanitize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, ContentError> {
        Ok(Self {
            role,
            content: sanitize_content(&content.into())?,
        })
    }

    pub fn system(content: impl Into<String>) -> Result<Self, ContentError> {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Result<Self, ContentError> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, ContentError> {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Result<Self, ContentError> {
        Self::new(Role::Tool, content)
    }

    /// Content length in Unicode code points.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Whitespace-separated word count.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
        assert_eq!(
            serde_json::from_str::<Role>(r#""tool""#).unwrap(),
            Role::Tool
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>(r#""moderator""#).is_err());
    }

    #[test]
    fn constructors_sanitize_content() {
        let msg = ChatMessage::user("hi\u{0000}there").unwrap();
        assert_eq!(msg.content, "hithere");
        assert!(ChatMessage::user("<script>x</script>").is_err());
    }

    #[test]
    fn stored_message_round_trips() {
        let msg = ChatMessage::assistant("Résumé: tout va bien.").unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        let reloaded: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, msg);
    }
}
