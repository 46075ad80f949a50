//! Ingest path
//!
//! Validates a draft, persists it, then queues the stored message for
//! broadcast. Persist and enqueue happen under one lock so the dispatch order
//! equals the store's commit order. The caller gets the stored message back
//! as soon as it is queued; fan-out completes later.

use tokio::sync::Mutex;

use crate::broadcast::DispatchQueue;
use crate::message::{CircleId, Message, MessageId, MessageStore, NewMessage, StoreError};

/// Ingest configuration options
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum message length in characters
    pub max_content_len: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_content_len: 4000,
        }
    }
}

impl IngestConfig {
    pub fn max_content_len(mut self, len: usize) -> Self {
        self.max_content_len = len;
        self
    }
}

/// Why a draft was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("circleId is required")]
    MissingCircle,
    #[error("senderId is required")]
    MissingSender,
    #[error("content is empty")]
    EmptyContent,
    #[error("content is {len} characters, limit is {max}")]
    ContentTooLong { len: usize, max: usize },
    #[error("failed to persist message: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the error is the poster's fault (as opposed to the store's)
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}

/// Check a draft before it reaches the store
pub fn validate(draft: &NewMessage, config: &IngestConfig) -> Result<(), IngestError> {
    if draft.circle_id.is_blank() {
        return Err(IngestError::MissingCircle);
    }
    if draft.sender_id.trim().is_empty() {
        return Err(IngestError::MissingSender);
    }
    if draft.content.trim().is_empty() {
        return Err(IngestError::EmptyContent);
    }
    let len = draft.content.chars().count();
    if len > config.max_content_len {
        return Err(IngestError::ContentTooLong {
            len,
            max: config.max_content_len,
        });
    }
    Ok(())
}

/// Validate, persist, then hand off to the dispatch queue
pub struct Ingest<S: MessageStore> {
    store: S,
    dispatch: DispatchQueue,
    config: IngestConfig,
    /// Serializes append + enqueue
    order: Mutex<()>,
}

impl<S: MessageStore> Ingest<S> {
    pub fn new(store: S, dispatch: DispatchQueue, config: IngestConfig) -> Self {
        Self {
            store,
            dispatch,
            config,
            order: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Accept a message from a poster
    ///
    /// On success the message is persisted and queued for broadcast. On
    /// failure nothing is broadcast.
    pub async fn post_message(&self, draft: NewMessage) -> Result<Message, IngestError> {
        validate(&draft, &self.config)?;

        let _order = self.order.lock().await;

        let message = self.store.append(draft).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to persist message");
            IngestError::Store(e)
        })?;

        tracing::debug!(
            circle = %message.circle_id,
            message_id = %message.id,
            sender = %message.sender_id,
            "Message persisted"
        );

        self.on_message_persisted(message.clone());
        Ok(message)
    }

    /// Queue an already-persisted message for broadcast
    ///
    /// For messages persisted outside `post_message`. Must be called exactly
    /// once per message; ordering relative to `post_message` follows call order.
    pub fn on_message_persisted(&self, message: Message) {
        self.dispatch.enqueue(message);
    }

    /// Full history of a circle in commit order
    pub async fn history(&self, circle: &CircleId) -> Result<Vec<Message>, StoreError> {
        self.store.list_since(circle, None).await
    }

    /// Messages committed after `cursor`, for reconnect recovery
    pub async fn history_since(
        &self,
        circle: &CircleId,
        cursor: &MessageId,
    ) -> Result<Vec<Message>, StoreError> {
        self.store.list_since(circle, Some(cursor)).await
    }
}
