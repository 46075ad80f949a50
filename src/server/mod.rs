//! WebSocket transport
//!
//! ```text
//!   TcpListener ──accept──► WsConnection task (one per socket)
//!                              │   ▲
//!            inbound frames    │   │  outbox (PushFrame)
//!                              ▼   │
//!                            ChatHub
//! ```

pub mod config;
mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::ChatServer;
