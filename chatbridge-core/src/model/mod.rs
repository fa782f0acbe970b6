//! Model infrastructure module
//!
//! # Structure
//! - `types` - Request, Response, Error types
//! - `gateway` - ModelGateway trait and the config-driven DynamicModelGateway
//! - `adapter` - Message and tool format adapters
//! - `factory` - ProviderClient, one variant per wire format
//! - `clients` - Individual client implementations

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod gateway;
pub mod types;

pub use factory::ProviderClient;
pub use gateway::{DynamicModelGateway, ModelGateway};
pub use types::{ModelError, ModelRequest, ModelResponse};
