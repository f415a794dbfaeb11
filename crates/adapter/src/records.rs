//! Internal records and their conversion from external API payloads.
//!
//! External records are untyped JSON owned by the API (`snake_case`, nested assignee). They are
//! converted in exactly one place, [`Item::from_external`], and never travel further.

use crate::error::{AdapterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use unrelated_http_tools::safety::truncate_for_message;

/// Status assigned when the external record carries none.
pub const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Convert one external record.
    ///
    /// Field mapping (external → internal):
    ///
    /// | external | internal | when absent |
    /// |---|---|---|
    /// | `id` (string or integer) | `id` | **error** |
    /// | `title` | `title` | `""` |
    /// | `description` | `description` | `None` |
    /// | `status` | `status` | `"unknown"` |
    /// | `tags` (array of strings) | `tags` | `[]` |
    /// | `assignee.login` or `assignee` (string) | `assignee` | `None` |
    /// | `html_url` | `web_url` | `None` |
    /// | `created_at` / `updated_at` (RFC 3339) | `created_at` / `updated_at` | `None` |
    ///
    /// Present-but-mistyped optional fields fall back to their default as well; only the
    /// identifier is essential. `status` is the HTTP status the record arrived with, when known;
    /// it is carried into conversion errors.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::ExternalService`] if the payload is not an object or has no usable
    /// `id`.
    pub fn from_external(record: &Value, status: Option<u16>) -> Result<Self> {
        let Some(obj) = record.as_object() else {
            return Err(AdapterError::external(
                status,
                format!(
                    "external system returned a non-object record: {}",
                    truncate_for_message(&record.to_string(), 200)
                ),
            ));
        };

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(AdapterError::external(
                    status,
                    "external system returned a record without `id`",
                ));
            }
        };

        Ok(Self {
            id,
            title: string_field(obj, "title").unwrap_or_default(),
            description: string_field(obj, "description"),
            status: string_field(obj, "status").unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            tags: obj
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            assignee: match obj.get("assignee") {
                Some(Value::Object(a)) => string_field(a, "login"),
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            },
            web_url: string_field(obj, "html_url"),
            created_at: timestamp_field(obj, "created_at"),
            updated_at: timestamp_field(obj, "updated_at"),
        })
    }

    /// Case-insensitive substring match on title and description.
    #[must_use]
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle_lower))
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Aggregate counts over a set of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_tag: BTreeMap<String, usize>,
}

impl ItemSummary {
    #[must_use]
    pub fn from_items(items: &[Item]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            *summary.by_status.entry(item.status.clone()).or_default() += 1;
            for tag in &item.tags {
                *summary.by_tag.entry(tag.clone()).or_default() += 1;
            }
        }
        summary
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn timestamp_field(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key).and_then(Value::as_str)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(field = key, value = raw, error = %e, "ignoring unparsable timestamp");
            None
        }
    }
}
