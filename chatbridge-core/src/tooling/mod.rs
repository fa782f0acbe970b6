//! # Tooling
//!
//! Supervised links to MCP tool servers.
//!
//! - [`ToolServerConnection`] owns one transport, its status and the cached
//!   tool and resource lists of one server.
//! - [`ConnectionManager`] owns every connection, builds them from the
//!   tool-server map and routes tool calls to them.
//! - [`transport`] holds the subprocess and HTTP event-stream transports.

mod connection;
mod error;
mod interface;
mod manager;
mod rpc;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionSnapshot, ConnectionStatus, ToolServerConnection};
pub use error::{ConnectionError, ToolInvokeError};
pub use interface::ToolServerInterface;
pub use manager::ConnectionManager;
