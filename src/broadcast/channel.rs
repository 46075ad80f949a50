//! Broadcast channel
//!
//! Delivers one persisted message to every open connection joined to its
//! circle. Each push is an independent attempt: a failure on one connection
//! is recorded and the loop moves on.

use std::sync::Arc;

use crate::message::{CircleId, Message, MessageId};
use crate::protocol::PushFrame;
use crate::registry::{ConnectionId, ConnectionRegistry, PushError};
use crate::stats::HubStats;

/// One failed push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub connection_id: ConnectionId,
    pub error: PushError,
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub message_id: MessageId,
    pub circle_id: CircleId,
    /// Connections in the interest snapshot
    pub attempted: usize,
    /// Connections whose outbound queue accepted the frame
    pub delivered: Vec<ConnectionId>,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    fn empty(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            circle_id: message.circle_id.clone(),
            attempted: 0,
            delivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Fan-out of persisted messages to interested connections
#[derive(Clone)]
pub struct BroadcastChannel {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<HubStats>,
}

impl BroadcastChannel {
    pub fn new(registry: Arc<ConnectionRegistry>, stats: Arc<HubStats>) -> Self {
        Self { registry, stats }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Push `message` to every connection currently joined to its circle
    ///
    /// The frame is encoded once and shared by all pushes. Never fails as a
    /// whole; per-connection failures are listed in the report.
    pub async fn broadcast(&self, message: &Message) -> DeliveryReport {
        let mut report = DeliveryReport::empty(message);

        let frame = match PushFrame::for_message(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    error = %e,
                    "Failed to encode push frame"
                );
                return report;
            }
        };

        let snapshot = self.registry.interested_in(&message.circle_id).await;
        report.attempted = snapshot.len();

        for connection in &snapshot {
            match connection.push(frame.clone()) {
                Ok(()) => report.delivered.push(connection.id()),
                Err(error) => {
                    match &error {
                        PushError::QueueFull(_) => tracing::warn!(
                            connection_id = connection.id(),
                            message_id = %message.id,
                            "Outbound queue full, dropping push"
                        ),
                        _ => tracing::debug!(
                            connection_id = connection.id(),
                            message_id = %message.id,
                            error = %error,
                            "Push failed"
                        ),
                    }
                    report.failures.push(DeliveryFailure {
                        connection_id: connection.id(),
                        error,
                    });
                }
            }
        }

        self.stats
            .broadcast_completed(report.delivered_count(), report.failed_count());

        tracing::debug!(
            circle = %message.circle_id,
            message_id = %message.id,
            attempted = report.attempted,
            delivered = report.delivered_count(),
            failed = report.failed_count(),
            "Broadcast complete"
        );

        report
    }
}
