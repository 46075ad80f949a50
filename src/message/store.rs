//! Message store interface
//!
//! The store is the durable record behind live delivery. Anything that was
//! missed on the live channel is recovered from here.

use std::future::Future;

use super::model::{CircleId, Message, MessageId, NewMessage};

/// Error returned by message store implementations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the write
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The history cursor does not name a message in this circle
    #[error("unknown cursor {cursor} for circle {circle}")]
    UnknownCursor { circle: CircleId, cursor: MessageId },
}

/// Append-only message record keyed by circle
///
/// Implementations assign `id` and `created_at`. Messages returned by
/// `list_since` are in commit order.
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a validated draft and return the stored message
    fn append(&self, draft: NewMessage) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Messages for `circle` committed after `cursor`, or all of them when
    /// `cursor` is `None`
    fn list_since(
        &self,
        circle: &CircleId,
        cursor: Option<&MessageId>,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;
}
