//! Join protocol
//!
//! Interprets inbound control frames as declarations of circle interest.
//! Joins are additive and there is no leave frame: a connection keeps every
//! circle it joined until it closes. Binary frames carrying UTF-8 text are
//! read the same way as text frames. Anything that is not a well-formed join
//! is dropped without a reply and the connection stays open.

use std::sync::Arc;

use super::frame::{ClientFrame, FrameError};
use crate::message::CircleId;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::stats::HubStats;

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Join applied; `new` is false when the circle was already joined
    Joined { circle_id: CircleId, new: bool },
    /// Frame had a type this server does not handle
    Unrecognized { kind: String },
    /// Frame could not be parsed
    Malformed(FrameError),
}

/// Applies inbound frames to the registry
#[derive(Clone)]
pub struct JoinProtocol {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<HubStats>,
}

impl JoinProtocol {
    pub fn new(registry: Arc<ConnectionRegistry>, stats: Arc<HubStats>) -> Self {
        Self { registry, stats }
    }

    /// Handle a text frame received on `connection_id`
    pub async fn on_text(&self, connection_id: ConnectionId, raw: &str) -> FrameOutcome {
        self.stats.frame_received();

        match ClientFrame::parse(raw) {
            Ok(ClientFrame::Join { circle_id }) => {
                let new = self.registry.join(connection_id, &circle_id).await;
                if new {
                    self.stats.joined();
                }
                FrameOutcome::Joined { circle_id, new }
            }
            Ok(ClientFrame::Unrecognized { kind }) => {
                self.stats.frame_dropped();
                tracing::debug!(connection_id, kind = %kind, "Ignoring unrecognized frame");
                FrameOutcome::Unrecognized { kind }
            }
            Err(e) => self.malformed(connection_id, e),
        }
    }

    /// Handle a binary frame received on `connection_id`
    pub async fn on_binary(&self, connection_id: ConnectionId, data: &[u8]) -> FrameOutcome {
        match std::str::from_utf8(data) {
            Ok(raw) => self.on_text(connection_id, raw).await,
            Err(_) => {
                self.stats.frame_received();
                tracing::debug!(connection_id, len = data.len(), "Binary frame is not UTF-8");
                self.malformed(connection_id, FrameError::NotUtf8)
            }
        }
    }

    fn malformed(&self, connection_id: ConnectionId, error: FrameError) -> FrameOutcome {
        self.stats.frame_dropped();
        tracing::debug!(connection_id, error = %error, "Dropping malformed frame");
        FrameOutcome::Malformed(error)
    }
}
