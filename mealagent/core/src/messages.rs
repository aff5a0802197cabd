//! Conversation Messages
//!
//! The message log shared by every workflow node and sent to the model
//! backends. Messages are role-tagged and carry one or more content parts;
//! a part is either text or an inline base64 image tagged with its media
//! type.
//!
//! The log is append-only: the workflow state exposes no way to remove or
//! rewrite an entry once it has been pushed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::images::ImageData;

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversation thread identifier
///
/// Scopes one workflow run's suspend/resume state. Supplied by the caller;
/// [`ThreadId::new`] generates a fresh one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// Generate a new unique thread ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Fixed instructions for the model
    System,
    /// The person using the assistant
    Human,
    /// The model
    Assistant,
}

impl MessageRole {
    /// Role name as most chat APIs spell it
    #[must_use]
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One piece of message content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Inline image payload
    Image {
        /// Encoded image
        image: ImageData,
    },
}

/// A message in the conversation log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Ordered content parts
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    /// Create a message from explicit parts
    pub fn new(role: MessageRole, parts: Vec<ContentPart>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            parts,
        }
    }

    /// System message with a single text part
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentPart::Text { text: text.into() }])
    }

    /// Human message with a single text part
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, vec![ContentPart::Text { text: text.into() }])
    }

    /// Assistant message with a single text part
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Assistant,
            vec![ContentPart::Text { text: text.into() }],
        )
    }

    /// Attach an image part
    #[must_use]
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.parts.push(ContentPart::Image { image });
        self
    }

    /// All text parts joined with newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Image parts in order
    pub fn images(&self) -> impl Iterator<Item = &ImageData> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::Image { image } => Some(image),
            ContentPart::Text { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
        assert!(id1.0.starts_with("msg_"));
    }

    #[test]
    fn test_thread_id_unique() {
        assert_ne!(ThreadId::new(), ThreadId::new());
        assert_eq!(ThreadId::from("kitchen").to_string(), "kitchen");
    }

    #[test]
    fn test_text_skips_images() {
        let msg = ChatMessage::human("look at this")
            .with_image(ImageData::new("image/png", "AAAA"));

        assert_eq!(msg.text(), "look at this");
        assert_eq!(msg.images().count(), 1);
        assert_eq!(msg.role.api_name(), "user");
    }

    #[test]
    fn test_content_part_serde_tag() {
        let part = ContentPart::Text {
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");
    }
}
