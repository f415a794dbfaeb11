//! Authenticated HTTP transport shared by Unrelated API adapters.
//!
//! This crate owns everything between a typed request and the wire: auth, status
//! classification, retries for safe calls, and pagination. It knows nothing about tools or
//! records.

pub mod client;
pub mod pagination;
pub mod request;
pub mod response;
pub mod retry;
pub mod safety;
pub mod semantics;
pub mod transport;

pub use reqwest::Method;

pub use client::{ClientOptions, HttpClient};
pub use pagination::PageLimits;
pub use request::{ApiRequest, encode_path_segment};
pub use response::{RawResponse, TransportError};
pub use retry::RetryPolicy;
pub use transport::Transport;
