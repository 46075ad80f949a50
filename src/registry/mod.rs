//! Connection registry
//!
//! Tracks live connections and the circles each has joined, and hands out
//! snapshots of the interested set for a circle.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ connections: HashMap<Id,     │
//!                  │   RegistryEntry {            │
//!                  │     connection, circles,     │
//!                  │   }>                         │
//!                  │ interest: HashMap<CircleId,  │
//!                  │   HashSet<Id>>               │
//!                  └──────────────┬───────────────┘
//!                                 │ interested_in(circle)
//!                                 ▼
//!                      [Connection] [Connection] ...
//!                       push() ──► mpsc ──► Outbox ──► socket writer
//! ```
//!
//! Both maps are behind one lock, so a snapshot never sees a connection
//! half-registered or half-removed.

pub mod config;
pub mod connection;
pub mod store;

pub use config::RegistryConfig;
pub use connection::{Connection, ConnectionId, ConnectionState, Outbox, PushError};
pub use store::{ConnectionRegistry, Departure, RegistryStats};
