//! Statistics for the chat hub
//!
//! Lock-free atomic counters; read them through `snapshot()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Hub-wide counters
#[derive(Debug)]
pub struct HubStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    joins: AtomicU64,
    messages_ingested: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Plain copy of the counters at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections ever opened
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Inbound frames received
    pub frames_received: u64,
    /// Inbound frames dropped as malformed or unrecognized
    pub frames_dropped: u64,
    /// Joins that added a new interest
    pub joins: u64,
    /// Messages persisted through the ingest path
    pub messages_ingested: u64,
    /// Broadcasts performed
    pub broadcasts: u64,
    /// Successful pushes
    pub deliveries: u64,
    /// Failed pushes
    pub delivery_failures: u64,
    /// Time since the stats were created
    pub uptime: Duration,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            joins: AtomicU64::new(0),
            messages_ingested: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturating: a close without a matching open must not wrap
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn joined(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_ingested(&self) {
        self.messages_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one broadcast and its outcome
    pub fn broadcast_completed(&self, delivered: usize, failed: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            messages_ingested: self.messages_ingested.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = HubStats::new().snapshot();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.broadcasts, 0);
        assert_eq!(stats.deliveries, 0);
    }

    #[test]
    fn test_connection_counters() {
        let stats = HubStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 2);
        assert_eq!(snap.active_connections, 1);
    }

    #[test]
    fn test_unmatched_close_does_not_wrap() {
        let stats = HubStats::new();
        stats.connection_closed();
        assert_eq!(stats.snapshot().active_connections, 0);
    }

    #[test]
    fn test_broadcast_counters() {
        let stats = HubStats::new();
        stats.broadcast_completed(3, 1);
        stats.broadcast_completed(0, 0);

        let snap = stats.snapshot();
        assert_eq!(snap.broadcasts, 2);
        assert_eq!(snap.deliveries, 3);
        assert_eq!(snap.delivery_failures, 1);
    }

    #[test]
    fn test_frame_counters() {
        let stats = HubStats::new();
        stats.frame_received();
        stats.frame_received();
        stats.frame_dropped();
        stats.joined();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.frames_dropped, 1);
        assert_eq!(snap.joins, 1);
    }
}
