//! In-memory message store

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::model::{CircleId, Message, MessageId, NewMessage};
use super::store::{MessageStore, StoreError};

/// Message store backed by a per-circle `Vec`
///
/// Commit order is the order in which `append` acquires the write lock.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    circles: RwLock<HashMap<CircleId, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across all circles
    pub async fn len(&self) -> usize {
        self.circles.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl MessageStore for InMemoryMessageStore {
    async fn append(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let message = Message {
            id: MessageId::generate(),
            circle_id: draft.circle_id,
            sender_id: draft.sender_id,
            content: draft.content,
            created_at: Utc::now(),
        };

        let mut circles = self.circles.write().await;
        circles
            .entry(message.circle_id.clone())
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn list_since(
        &self,
        circle: &CircleId,
        cursor: Option<&MessageId>,
    ) -> Result<Vec<Message>, StoreError> {
        let circles = self.circles.read().await;
        let Some(messages) = circles.get(circle) else {
            return match cursor {
                Some(cursor) => Err(StoreError::UnknownCursor {
                    circle: circle.clone(),
                    cursor: cursor.clone(),
                }),
                None => Ok(Vec::new()),
            };
        };

        let start = match cursor {
            None => 0,
            Some(cursor) => {
                let pos = messages
                    .iter()
                    .position(|m| &m.id == cursor)
                    .ok_or_else(|| StoreError::UnknownCursor {
                        circle: circle.clone(),
                        cursor: cursor.clone(),
                    })?;
                pos + 1
            }
        };

        Ok(messages[start..].to_vec())
    }
}
