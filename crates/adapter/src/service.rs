//! Service layer: one function per logical operation.
//!
//! Each operation issues its transport call(s), converts external records with
//! [`Item::from_external`], applies filtering, and re-tags transport failures into the adapter's
//! error taxonomy.

use crate::config::Configuration;
use crate::error::{AdapterError, Result};
use crate::records::{Item, ItemSummary};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;
use unrelated_http_tools::{ApiRequest, HttpClient, Transport, TransportError, encode_path_segment};

/// Filters for listing items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Exact status; pushed down to the API and re-checked locally.
    pub status: Option<String>,
    /// Tag that must be present (case-insensitive).
    pub tag: Option<String>,
    /// Free text matched against title and description (case-insensitive).
    pub text: Option<String>,
    /// Maximum number of items returned.
    pub limit: Option<usize>,
}

/// Fields for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone)]
pub struct ItemService {
    transport: Arc<dyn Transport>,
}

impl ItemService {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Acquire a real HTTP client for `config` and wrap it.
    ///
    /// The returned client handle is the caller's to close when serving ends.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the client cannot be built from `config`.
    pub fn connect(config: &Configuration) -> Result<(Self, HttpClient)> {
        let client = HttpClient::open(config.client_options())
            .map_err(|e| AdapterError::configuration(format!("cannot open HTTP client: {e}")))?;
        Ok((Self::new(Arc::new(client.clone())), client))
    }

    /// All items matching `filter`, across every page.
    ///
    /// # Errors
    ///
    /// Returns the re-tagged transport failure, or [`AdapterError::ExternalService`] if a record
    /// cannot be converted.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let mut request = ApiRequest::get("/items");
        if let Some(status) = &filter.status {
            request = request.with_query("status", status.clone());
        }

        let records = self
            .transport
            .call_paginated(request)
            .await
            .map_err(map_transport_error)?;
        let fetched = records.len();

        let text = filter.text.as_deref().map(str::to_lowercase);
        let mut items = Vec::new();
        for record in &records {
            let item = Item::from_external(record, None)?;
            if filter.status.as_deref().is_some_and(|s| item.status != s) {
                continue;
            }
            if filter.tag.as_deref().is_some_and(|t| !item.has_tag(t)) {
                continue;
            }
            if text.as_deref().is_some_and(|t| !item.matches_text(t)) {
                continue;
            }
            items.push(item);
            if filter.limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
        }

        debug!(fetched, matched = items.len(), "listed items");
        Ok(items)
    }

    /// One item by id.
    ///
    /// # Errors
    ///
    /// Returns the re-tagged transport failure (a missing item is a `UserInput` 404), or
    /// [`AdapterError::ExternalService`] if the record cannot be converted.
    pub async fn get_item(&self, id: &str) -> Result<Item> {
        let request = ApiRequest::get(format!("/items/{}", encode_path_segment(id)));
        let resp = self
            .transport
            .call(request)
            .await
            .map_err(map_transport_error)?;
        Item::from_external(unwrap_envelope(&resp.body), Some(resp.status))
    }

    /// Free-text search across all items.
    ///
    /// # Errors
    ///
    /// Same as [`ItemService::list_items`].
    pub async fn search_items(&self, query: &str, limit: Option<usize>) -> Result<Vec<Item>> {
        self.list_items(&ItemFilter {
            text: Some(query.to_string()),
            limit,
            ..ItemFilter::default()
        })
        .await
    }

    /// Create an item. Issued exactly once; never retried.
    ///
    /// # Errors
    ///
    /// Returns the re-tagged transport failure, or [`AdapterError::ExternalService`] if the
    /// created record cannot be converted.
    pub async fn create_item(&self, new_item: &NewItem) -> Result<Item> {
        let mut body = json!({ "title": new_item.title });
        if let Some(description) = &new_item.description {
            body["description"] = json!(description);
        }
        if !new_item.tags.is_empty() {
            body["tags"] = json!(new_item.tags);
        }

        let resp = self
            .transport
            .call(ApiRequest::post("/items", body))
            .await
            .map_err(map_transport_error)?;
        Item::from_external(unwrap_envelope(&resp.body), Some(resp.status))
    }

    /// Counts by status and tag over all items (optionally of one status).
    ///
    /// # Errors
    ///
    /// Same as [`ItemService::list_items`].
    pub async fn summarize_items(&self, status: Option<&str>) -> Result<ItemSummary> {
        let items = self
            .list_items(&ItemFilter {
                status: status.map(str::to_string),
                ..ItemFilter::default()
            })
            .await?;
        Ok(ItemSummary::from_items(&items))
    }
}

/// Single-record endpoints may wrap the record as `{ "data": {...} }`.
fn unwrap_envelope(body: &Value) -> &Value {
    if body.get("id").is_none()
        && let Some(inner) = body.get("data")
        && inner.is_object()
    {
        return inner;
    }
    body
}

/// Re-tag a transport failure into the adapter taxonomy, keeping status and message.
///
/// 4xx responses are split by what the status says about the cause:
/// - 401/403/407 (credential) and 429 (quota) are not the caller's fault → `ExternalService`;
/// - every other 4xx rejects the request itself → `UserInput`.
#[must_use]
pub fn map_transport_error(e: TransportError) -> AdapterError {
    match e {
        TransportError::ClientError { status, message } => {
            if matches!(status, 401 | 403 | 407 | 429) {
                AdapterError::ExternalService {
                    status: Some(status),
                    message,
                }
            } else {
                AdapterError::UserInput {
                    status: Some(status),
                    message,
                }
            }
        }
        TransportError::ServerError { status, message }
        | TransportError::UnexpectedPayload { status, message } => AdapterError::ExternalService {
            status: Some(status),
            message,
        },
        e @ (TransportError::Transport { .. } | TransportError::Closed) => {
            AdapterError::Transport {
                status: None,
                message: e.to_string(),
            }
        }
    }
}
