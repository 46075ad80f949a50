//! Chat wire protocol
//!
//! - [`frame`]: JSON control frames (client → server) and push frames
//!   (server → client)
//! - [`join`]: applies control frames to the connection registry

pub mod frame;
pub mod join;

pub use frame::{ClientFrame, FrameError, PushFrame, ServerFrame};
pub use join::{FrameOutcome, JoinProtocol};
