//! Tool dispatcher: the only surface visible to the agent runtime.
//!
//! `invoke(name, params)` validates the parameters into a typed request, calls exactly one
//! service operation, and returns either a JSON payload or a [`ToolFailure`]. Validation failures
//! never reach the service (and therefore never reach the network).

use crate::error::{AdapterError, ErrorCategory, Result};
use crate::records::Item;
use crate::service::{ItemFilter, ItemService, NewItem};
use rmcp::model::{ErrorCode, ErrorData, JsonObject, Tool};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument as _, debug, info_span, warn};
use unrelated_http_tools::Method;
use unrelated_http_tools::semantics::annotations_for_method;

/// Upper bound for caller-supplied `limit`.
pub const MAX_LIMIT: usize = 1000;

/// The operations exposed as tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListItems,
    GetItem,
    SearchItems,
    CreateItem,
    SummarizeItems,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::ListItems,
        Operation::GetItem,
        Operation::SearchItems,
        Operation::CreateItem,
        Operation::SummarizeItems,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ListItems => "list_items",
            Self::GetItem => "get_item",
            Self::SearchItems => "search_items",
            Self::CreateItem => "create_item",
            Self::SummarizeItems => "summarize_items",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// HTTP method of the underlying call; drives tool annotations.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::CreateItem => Method::POST,
            _ => Method::GET,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::ListItems => {
                "List items across all pages, optionally filtered by status and tag."
            }
            Self::GetItem => "Fetch a single item by id.",
            Self::SearchItems => {
                "Search items whose title or description contains the query (case-insensitive)."
            }
            Self::CreateItem => "Create a new item. Not retried automatically.",
            Self::SummarizeItems => "Count items by status and by tag.",
        }
    }

    fn input_schema(self) -> Value {
        let limit = json!({
            "type": "integer",
            "minimum": 1,
            "maximum": MAX_LIMIT,
            "description": "Maximum number of items to return."
        });
        let (properties, required) = match self {
            Self::ListItems => (
                json!({
                    "status": {"type": "string", "description": "Only items with this status."},
                    "tag": {"type": "string", "description": "Only items carrying this tag."},
                    "limit": limit,
                }),
                json!([]),
            ),
            Self::GetItem => (
                json!({ "id": {"type": "string", "description": "Item id."} }),
                json!(["id"]),
            ),
            Self::SearchItems => (
                json!({
                    "query": {"type": "string", "description": "Text to look for."},
                    "limit": limit,
                }),
                json!(["query"]),
            ),
            Self::CreateItem => (
                json!({
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                json!(["title"]),
            ),
            Self::SummarizeItems => (
                json!({
                    "status": {
                        "type": "string",
                        "description": "Only summarize items with this status."
                    },
                }),
                json!([]),
            ),
        };
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    fn tool(self) -> Tool {
        let schema = match self.input_schema() {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        let mut tool = Tool::new(self.name(), self.description(), Arc::new(schema));
        tool.annotations = Some(annotations_for_method(&self.method()));
        tool
    }
}

// ============================================================================
// Operation requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListItemsRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetItemRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchItemsRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizeItemsRequest {
    #[serde(default)]
    pub status: Option<String>,
}

fn non_blank(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::user_input(format!("`{field}` must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_non_blank(field: &str, value: Option<&String>) -> Result<Option<String>> {
    value.map(|v| non_blank(field, v)).transpose()
}

fn checked_limit(limit: Option<usize>) -> Result<Option<usize>> {
    match limit {
        Some(n) if n == 0 || n > MAX_LIMIT => Err(AdapterError::user_input(format!(
            "`limit` must be between 1 and {MAX_LIMIT}, got {n}"
        ))),
        other => Ok(other),
    }
}

impl ListItemsRequest {
    fn into_filter(self) -> Result<ItemFilter> {
        Ok(ItemFilter {
            status: optional_non_blank("status", self.status.as_ref())?,
            tag: optional_non_blank("tag", self.tag.as_ref())?,
            text: None,
            limit: checked_limit(self.limit)?,
        })
    }
}

impl GetItemRequest {
    fn validated_id(&self) -> Result<String> {
        let id = non_blank("id", &self.id)?;
        if id == "." || id == ".." {
            return Err(AdapterError::user_input(format!("`id` '{id}' is not a valid item id")));
        }
        Ok(id)
    }
}

impl CreateItemRequest {
    fn into_new_item(self) -> Result<NewItem> {
        let tags = self
            .tags
            .iter()
            .map(|t| non_blank("tags[]", t))
            .collect::<Result<Vec<_>>>()?;
        Ok(NewItem {
            title: non_blank("title", &self.title)?,
            description: self.description.filter(|d| !d.trim().is_empty()),
            tags,
        })
    }
}

// ============================================================================
// Boundary results
// ============================================================================

/// A categorized failure as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ToolFailure {
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

impl From<AdapterError> for ToolFailure {
    fn from(e: AdapterError) -> Self {
        Self {
            category: e.category(),
            status: e.status(),
            message: e.message().to_string(),
        }
    }
}

impl From<ToolFailure> for ErrorData {
    fn from(f: ToolFailure) -> Self {
        let code = match f.category {
            ErrorCategory::UserInputError => ErrorCode::INVALID_PARAMS,
            ErrorCategory::ConfigurationError
            | ErrorCategory::ExternalServiceError
            | ErrorCategory::TransportError => ErrorCode::INTERNAL_ERROR,
        };
        let data = json!({ "category": f.category, "status": f.status });
        ErrorData::new(code, f.message, Some(data))
    }
}

/// Exactly one of a success payload or a categorized failure.
pub type OperationResult = std::result::Result<Value, ToolFailure>;

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Clone)]
pub struct ToolDispatcher {
    service: ItemService,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(service: ItemService) -> Self {
        Self { service }
    }

    /// Every exposed tool with its input schema and annotations.
    #[must_use]
    pub fn tools() -> Vec<Tool> {
        Operation::ALL.into_iter().map(Operation::tool).collect()
    }

    /// Run one tool invocation.
    pub async fn invoke(&self, name: &str, params: Value) -> OperationResult {
        let span = info_span!("tool_call", tool = %name);
        async {
            match self.dispatch(name, params).await {
                Ok(payload) => {
                    debug!("tool call succeeded");
                    Ok(payload)
                }
                Err(e) => {
                    warn!(
                        category = %e.category(),
                        status = ?e.status(),
                        error = %e,
                        "tool call failed"
                    );
                    Err(ToolFailure::from(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, name: &str, params: Value) -> Result<Value> {
        let op = Operation::from_name(name)
            .ok_or_else(|| AdapterError::user_input(format!("unknown tool: {name}")))?;

        match op {
            Operation::ListItems => {
                let filter = parse_params::<ListItemsRequest>(op, params)?.into_filter()?;
                let items = self.service.list_items(&filter).await?;
                Ok(items_payload(&items))
            }
            Operation::GetItem => {
                let id = parse_params::<GetItemRequest>(op, params)?.validated_id()?;
                let item = self.service.get_item(&id).await?;
                Ok(json!({ "item": item }))
            }
            Operation::SearchItems => {
                let req = parse_params::<SearchItemsRequest>(op, params)?;
                let query = non_blank("query", &req.query)?;
                let limit = checked_limit(req.limit)?;
                let items = self.service.search_items(&query, limit).await?;
                Ok(items_payload(&items))
            }
            Operation::CreateItem => {
                let new_item = parse_params::<CreateItemRequest>(op, params)?.into_new_item()?;
                let item = self.service.create_item(&new_item).await?;
                Ok(json!({ "item": item }))
            }
            Operation::SummarizeItems => {
                let req = parse_params::<SummarizeItemsRequest>(op, params)?;
                let status = optional_non_blank("status", req.status.as_ref())?;
                let summary = self.service.summarize_items(status.as_deref()).await?;
                Ok(json!(summary))
            }
        }
    }
}

fn items_payload(items: &[Item]) -> Value {
    json!({ "items": items, "count": items.len() })
}

/// Deserialize tool arguments into a typed request. `null` means "no arguments".
fn parse_params<T: DeserializeOwned>(op: Operation, params: Value) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(JsonObject::new()),
        obj @ Value::Object(_) => obj,
        other => {
            return Err(AdapterError::user_input(format!(
                "invalid arguments for tool '{}': expected an object, got {}",
                op.name(),
                json_type_name(&other)
            )));
        }
    };
    serde_json::from_value(params).map_err(|e| {
        AdapterError::user_input(format!("invalid arguments for tool '{}': {e}", op.name()))
    })
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
