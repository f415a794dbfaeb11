use crate::pagination::{PageLimits, collect_pages};
use crate::request::ApiRequest;
use crate::response::{RawResponse, Result};
use async_trait::async_trait;
use serde_json::Value;

/// The single seam between business logic and the network.
///
/// [`crate::client::HttpClient`] is the real implementation; tests substitute in-memory fakes.
/// Implementations must be safe to share across concurrently running invocations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one logical call and classify its outcome.
    async fn call(&self, request: ApiRequest) -> Result<RawResponse>;

    fn page_limits(&self) -> PageLimits {
        PageLimits::default()
    }

    /// Fetch every item of a paginated collection as one logical call.
    async fn call_paginated(&self, request: ApiRequest) -> Result<Vec<Value>> {
        collect_pages(self, request, self.page_limits()).await
    }
}
