//! Crate-level error types
//!
//! Component errors (`StoreError`, `IngestError`, `PushError`) live next to
//! the code that produces them; this module ties them together for the
//! server surface.

use crate::ingest::IngestError;

/// Result alias used by the server and transport layers
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket level failure (bind, accept, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message rejected or not persisted
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// WebSocket handshake did not complete in time
    #[error("handshake timed out")]
    HandshakeTimeout,
}
