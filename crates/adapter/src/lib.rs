//! MCP adapter exposing an external items API as agent tools.
//!
//! Layers, outermost first: [`server`] (MCP surface) → [`dispatcher`] (validation and routing)
//! → [`service`] (one function per operation) → [`records`] (external → internal conversion),
//! with [`unrelated_http_tools`] carrying requests to the wire.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod records;
pub mod server;
pub mod service;

pub use config::Configuration;
pub use dispatcher::{Operation, OperationResult, ToolDispatcher, ToolFailure};
pub use error::{AdapterError, ErrorCategory, Result};
pub use records::{Item, ItemSummary};
pub use server::AdapterServer;
pub use service::{ItemFilter, ItemService, NewItem};
