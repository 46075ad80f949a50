//! Live fan-out of persisted messages
//!
//! ```text
//!   ingest ──► DispatchQueue ──► dispatcher task ──► BroadcastChannel
//!                  (FIFO)                                 │
//!                                     registry.interested_in(circle)
//!                                                         │
//!                                        ┌────────────────┼────────────────┐
//!                                        ▼                ▼                ▼
//!                                   conn.push()      conn.push()      conn.push()
//! ```
//!
//! Delivery is best effort: a connection that is not live (or not joined)
//! at broadcast time recovers the message from circle history instead.

pub mod channel;
pub mod dispatch;

pub use channel::{BroadcastChannel, DeliveryFailure, DeliveryReport};
pub use dispatch::DispatchQueue;
