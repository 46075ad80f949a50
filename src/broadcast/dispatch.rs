//! Dispatch queue
//!
//! Persisted messages are handed to a single dispatcher task through one FIFO
//! queue. The task broadcasts them one at a time, so the order messages enter
//! the queue is the order every connection receives them.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::channel::BroadcastChannel;
use crate::message::Message;

/// Sending side of the dispatch queue
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Message>,
}

impl DispatchQueue {
    /// Spawn the dispatcher task for `channel`
    ///
    /// The task ends when every `DispatchQueue` clone has been dropped and the
    /// queue is drained.
    pub fn spawn(channel: BroadcastChannel) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                channel.broadcast(&message).await;
            }
            tracing::debug!("Dispatch queue closed");
        });

        (Self { tx }, handle)
    }

    /// Queue a persisted message for broadcast without waiting for fan-out
    ///
    /// Returns false if the dispatcher has stopped.
    pub fn enqueue(&self, message: Message) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                tracing::warn!(
                    message_id = %message.id,
                    circle = %message.circle_id,
                    "Dispatcher stopped, message not broadcast"
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
