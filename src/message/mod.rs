//! Chat messages and their durable store

pub mod memory;
pub mod model;
pub mod store;

pub use memory::InMemoryMessageStore;
pub use model::{CircleId, Message, MessageId, NewMessage};
pub use store::{MessageStore, StoreError};
