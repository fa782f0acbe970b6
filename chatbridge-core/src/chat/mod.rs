//! Chats, their persisted turns and the send-message loop.

mod error;
mod service;
mod store;


pub use error::ChatError;
pub use service::ChatService;
pub use store::{InMemoryStore, MessageStore, StoreError};
