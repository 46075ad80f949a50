//! Chat message types
//!
//! A `Message` is created only by a message store on successful persistence
//! and is never mutated afterwards. The transport only carries copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a study circle (the addressing unit for chat traffic)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircleId(String);

impl CircleId {
    /// Create a circle id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for CircleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CircleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CircleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a persisted message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id (e.g. one read back from a client cursor)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub circle_id: CircleId,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message draft as submitted by a poster, before validation and persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub circle_id: CircleId,
    pub sender_id: String,
    pub content: String,
}

impl NewMessage {
    pub fn new(
        circle_id: impl Into<CircleId>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            circle_id: circle_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message {
            id: MessageId::new("m1"),
            circle_id: CircleId::new("c1"),
            sender_id: "u1".into(),
            content: "hello".into(),
            created_at: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["id"], "m1");
        assert_eq!(value["circleId"], "c1");
        assert_eq!(value["senderId"], "u1");
        assert_eq!(value["content"], "hello");
        assert_eq!(value["createdAt"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_circle_id_blank() {
        assert!(CircleId::new("").is_blank());
        assert!(CircleId::new("  ").is_blank());
        assert!(!CircleId::new("c1").is_blank());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }
}
