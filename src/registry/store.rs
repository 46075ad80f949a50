//! Connection registry implementation
//!
//! Single source of truth for which connections exist and which circles each
//! has joined. Every mutation and every interest snapshot goes through the one
//! `RwLock` below.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::connection::{Connection, ConnectionId, ConnectionState, Outbox};
use crate::message::CircleId;

/// Registry bookkeeping for one connection
struct RegistryEntry {
    connection: Connection,
    circles: HashSet<CircleId>,
    registered_at: Instant,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, RegistryEntry>,
    /// circle → connections that joined it
    interest: HashMap<CircleId, HashSet<ConnectionId>>,
}

/// Summary of a connection at the time it was unregistered
#[derive(Debug, Clone)]
pub struct Departure {
    pub connection_id: ConnectionId,
    pub circles: Vec<CircleId>,
    pub registered_for: Duration,
}

/// Point-in-time registry counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered connections
    pub connections: usize,
    /// Circles with at least one interested connection
    pub circles: usize,
    /// Total (connection, circle) interest pairs
    pub interests: usize,
}

/// Registry of live connections and their circle interests
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create a connection handle sized by this registry's configuration
    ///
    /// The connection is not registered yet.
    pub fn open_connection(
        &self,
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
    ) -> (Connection, Outbox) {
        Connection::open(id, peer_addr, self.config.outbound_capacity)
    }

    /// Add a newly opened connection with an empty interest set
    ///
    /// Returns false (and leaves the registry untouched) if the id is already
    /// registered or the connection is no longer open.
    pub async fn register(&self, connection: Connection) -> bool {
        let id = connection.id();
        if connection.state() != ConnectionState::Open {
            tracing::debug!(connection_id = id, "Ignoring registration of closed connection");
            return false;
        }

        let mut inner = self.inner.write().await;
        if inner.connections.contains_key(&id) {
            tracing::warn!(connection_id = id, "Connection already registered");
            return false;
        }

        inner.connections.insert(
            id,
            RegistryEntry {
                connection,
                circles: HashSet::new(),
                registered_at: Instant::now(),
            },
        );

        tracing::debug!(
            connection_id = id,
            connections = inner.connections.len(),
            "Connection registered"
        );
        true
    }

    /// Add `circle` to a connection's interest set
    ///
    /// Returns true if the interest is new. Joining twice is a no-op, as is
    /// joining on an unknown or closed connection.
    pub async fn join(&self, id: ConnectionId, circle: &CircleId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.connections.get_mut(&id) else {
            tracing::debug!(connection_id = id, circle = %circle, "Join on unknown connection");
            return false;
        };

        if !entry.connection.is_open() || !entry.circles.insert(circle.clone()) {
            return false;
        }

        inner
            .interest
            .entry(circle.clone())
            .or_default()
            .insert(id);

        tracing::info!(connection_id = id, circle = %circle, "Joined circle");
        true
    }

    /// Remove a connection from every interest set and from the registry
    ///
    /// The connection passes through `Closing` and ends `Closed` before the
    /// write lock is released. Unknown ids return `None`.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Departure> {
        let mut inner = self.inner.write().await;

        let entry = inner.connections.remove(&id)?;
        entry.connection.begin_close();

        for circle in &entry.circles {
            if let Some(members) = inner.interest.get_mut(circle) {
                members.remove(&id);
                if members.is_empty() {
                    inner.interest.remove(circle);
                }
            }
        }

        entry.connection.finish_close();

        let mut circles: Vec<CircleId> = entry.circles.into_iter().collect();
        circles.sort();

        tracing::debug!(
            connection_id = id,
            circles = circles.len(),
            connections = inner.connections.len(),
            "Connection unregistered"
        );

        Some(Departure {
            connection_id: id,
            circles,
            registered_for: entry.registered_at.elapsed(),
        })
    }

    /// Snapshot of open connections currently joined to `circle`
    ///
    /// The returned handles are copies; later registry changes do not affect
    /// the snapshot, but a handle closed afterwards refuses pushes.
    pub async fn interested_in(&self, circle: &CircleId) -> Vec<Connection> {
        let inner = self.inner.read().await;

        let Some(members) = inner.interest.get(circle) else {
            return Vec::new();
        };

        let mut snapshot: Vec<Connection> = members
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .map(|entry| &entry.connection)
            .filter(|conn| conn.is_open())
            .cloned()
            .collect();

        // Sorted by id
        snapshot.sort_by_key(Connection::id);
        snapshot
    }

    /// Circles a connection has joined, sorted
    pub async fn circles_of(&self, id: ConnectionId) -> Option<Vec<CircleId>> {
        let inner = self.inner.read().await;
        inner.connections.get(&id).map(|entry| {
            let mut circles: Vec<CircleId> = entry.circles.iter().cloned().collect();
            circles.sort();
            circles
        })
    }

    pub async fn is_registered(&self, id: ConnectionId) -> bool {
        self.inner.read().await.connections.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Number of circles with at least one interested connection
    pub async fn circle_count(&self) -> usize {
        self.inner.read().await.interest.len()
    }

    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().await;
        RegistryStats {
            connections: inner.connections.len(),
            circles: inner.interest.len(),
            interests: inner.interest.values().map(HashSet::len).sum(),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
