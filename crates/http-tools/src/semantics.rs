//! HTTP method semantics.
//!
//! Two consumers care about what a method promises (RFC 9110 §9.2):
//! - the transport, which only retries *safe* methods automatically;
//! - the tool surface, which advertises MCP `ToolAnnotations` per operation.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Whether `method` is safe (read-only) and therefore eligible for transparent retries.
///
/// `PUT` and `DELETE` are idempotent but still mutate the external system; retrying them is a
/// caller decision, so they are not considered safe here.
#[must_use]
pub fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

/// MCP tool annotations for a tool backed by a single HTTP `method`.
///
/// `openWorldHint` is always `true`: every tool talks to an external system.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = if is_safe_method(method) {
        (Some(true), Some(false), Some(true))
    } else if method == Method::POST {
        (Some(false), Some(false), Some(false))
    } else if method == Method::PUT || method == Method::DELETE {
        (Some(false), Some(true), Some(true))
    } else if method == Method::PATCH {
        // PATCH may or may not be idempotent; do not guess.
        (Some(false), Some(true), None)
    } else {
        (None, None, None)
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
