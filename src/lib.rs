//! Real-time chat fan-out for study circles
//!
//! Clients hold a WebSocket open, declare interest in one or more circles
//! with `{"type":"join","circleId":"..."}`, and receive a
//! `{"type":"message","circleId":"...","message":{...}}` push for every
//! message persisted to those circles afterwards. Delivery is live-only:
//! anything missed while disconnected is read back through circle history.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hub_chat::{ChatHub, ChatServer, InMemoryMessageStore, NewMessage, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> hub_chat::Result<()> {
//!     let hub = Arc::new(ChatHub::new(InMemoryMessageStore::new()));
//!     let server = ChatServer::new(ServerConfig::from_env()?, Arc::clone(&hub));
//!
//!     tokio::spawn(async move {
//!         let _ = hub.post_message(NewMessage::new("c1", "u1", "hello")).await;
//!     });
//!
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```

pub mod broadcast;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::ChatHub;
pub use ingest::{IngestConfig, IngestError};
pub use message::{CircleId, InMemoryMessageStore, Message, MessageId, MessageStore, NewMessage};
pub use registry::{ConnectionId, RegistryConfig};
pub use server::{ChatServer, ServerConfig};
pub use stats::StatsSnapshot;
