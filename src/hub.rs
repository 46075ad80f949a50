//! Chat hub
//!
//! The object the transport and the REST layer talk to. It owns the registry,
//! the broadcast channel, the dispatch queue and the ingest path, and exposes
//! the events each outer layer forwards in:
//!
//! - transport: `on_connection_opened`, `on_frame_received`,
//!   `on_binary_received`, `on_connection_closed`
//! - REST layer: `post_message`, `on_message_persisted`, `history`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::broadcast::{BroadcastChannel, DispatchQueue};
use crate::ingest::{Ingest, IngestConfig, IngestError};
use crate::message::{CircleId, Message, MessageId, MessageStore, NewMessage, StoreError};
use crate::protocol::{FrameOutcome, JoinProtocol};
use crate::registry::{
    Connection, ConnectionId, ConnectionRegistry, Departure, Outbox, RegistryConfig,
};
use crate::stats::{HubStats, StatsSnapshot};

/// Real-time chat core for one server process
pub struct ChatHub<S: MessageStore> {
    registry: Arc<ConnectionRegistry>,
    broadcast: BroadcastChannel,
    join: JoinProtocol,
    ingest: Ingest<S>,
    stats: Arc<HubStats>,
    next_connection_id: AtomicU64,
    dispatcher: JoinHandle<()>,
}

impl<S: MessageStore> ChatHub<S> {
    /// Create a hub with default configuration
    ///
    /// Spawns the dispatcher task, so this must be called inside a Tokio
    /// runtime.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default(), IngestConfig::default())
    }

    pub fn with_config(
        store: S,
        registry_config: RegistryConfig,
        ingest_config: IngestConfig,
    ) -> Self {
        let stats = Arc::new(HubStats::new());
        let registry = Arc::new(ConnectionRegistry::with_config(registry_config));
        let broadcast = BroadcastChannel::new(Arc::clone(&registry), Arc::clone(&stats));
        let join = JoinProtocol::new(Arc::clone(&registry), Arc::clone(&stats));
        let (dispatch, dispatcher) = DispatchQueue::spawn(broadcast.clone());

        Self {
            registry,
            broadcast,
            join,
            ingest: Ingest::new(store, dispatch, ingest_config),
            stats,
            next_connection_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Direct access to fan-out, bypassing the dispatch queue
    pub fn broadcast_channel(&self) -> &BroadcastChannel {
        &self.broadcast
    }

    pub fn store(&self) -> &S {
        self.ingest.store()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// A transport session completed its handshake
    ///
    /// Registers a new connection and returns it with the outbox the
    /// transport's writer drains. If the registry refuses it, the returned
    /// connection is already closed and its outbox yields nothing.
    pub async fn on_connection_opened(&self, peer_addr: Option<SocketAddr>) -> (Connection, Outbox) {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.admit(id, peer_addr).await
    }

    async fn admit(&self, id: ConnectionId, peer_addr: Option<SocketAddr>) -> (Connection, Outbox) {
        let (connection, outbox) = self.registry.open_connection(id, peer_addr);

        if !self.registry.register(connection.clone()).await {
            connection.close();
            tracing::warn!(
                connection_id = id,
                peer = ?peer_addr,
                "Connection refused by registry"
            );
            return (connection, outbox);
        }
        self.stats.connection_opened();

        tracing::info!(
            connection_id = id,
            peer = ?peer_addr,
            "Connection opened"
        );

        (connection, outbox)
    }

    /// A text frame arrived on a connection
    pub async fn on_frame_received(&self, connection_id: ConnectionId, raw: &str) -> FrameOutcome {
        self.join.on_text(connection_id, raw).await
    }

    /// A binary frame arrived on a connection
    pub async fn on_binary_received(&self, connection_id: ConnectionId, data: &[u8]) -> FrameOutcome {
        self.join.on_binary(connection_id, data).await
    }

    /// A transport session closed or errored
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub async fn on_connection_closed(&self, connection_id: ConnectionId) -> Option<Departure> {
        let departure = self.registry.unregister(connection_id).await?;
        self.stats.connection_closed();

        tracing::info!(
            connection_id,
            circles = departure.circles.len(),
            duration_secs = departure.registered_for.as_secs(),
            "Connection closed"
        );

        Some(departure)
    }

    /// Validate, persist and queue a message for broadcast
    pub async fn post_message(&self, draft: NewMessage) -> Result<Message, IngestError> {
        let message = self.ingest.post_message(draft).await?;
        self.stats.message_ingested();
        Ok(message)
    }

    /// Queue a message persisted elsewhere for broadcast
    pub fn on_message_persisted(&self, message: Message) {
        self.ingest.on_message_persisted(message);
    }

    pub async fn history(&self, circle: &CircleId) -> Result<Vec<Message>, StoreError> {
        self.ingest.history(circle).await
    }

    pub async fn history_since(
        &self,
        circle: &CircleId,
        cursor: &MessageId,
    ) -> Result<Vec<Message>, StoreError> {
        self.ingest.history_since(circle, cursor).await
    }
}

impl<S: MessageStore> Drop for ChatHub<S> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
