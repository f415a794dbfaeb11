//! Page walking for collection endpoints.
//!
//! Supported page shapes:
//! - a bare JSON array (the last page is the first one shorter than `per_page`);
//! - `{ "data": [...], "next_page": <n> | null }` (an absent `next_page` falls back to the
//!   short-page rule).

use crate::request::ApiRequest;
use crate::response::{Result, TransportError};
use crate::safety::truncate_for_message;
use crate::transport::Transport;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Sent as `per_page`.
    pub page_size: u32,
    /// Upper bound on pages fetched for one logical call.
    pub max_pages: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
        }
    }
}

#[derive(Debug)]
enum NextPage {
    Explicit(Option<u64>),
    Unknown,
}

#[derive(Debug)]
struct Page {
    items: Vec<Value>,
    next: NextPage,
}

/// Walk `page=1..` until the collection is exhausted or `limits.max_pages` is reached.
///
/// Hitting `max_pages` is not an error: the items collected so far are returned and a warning is
/// logged.
///
/// # Errors
///
/// Returns the first failing page's error, or [`TransportError::UnexpectedPayload`] if a page has
/// no recognizable shape.
pub async fn collect_pages<T: Transport + ?Sized>(
    transport: &T,
    request: ApiRequest,
    limits: PageLimits,
) -> Result<Vec<Value>> {
    let page_size = limits.page_size.max(1);
    let max_pages = limits.max_pages.max(1);
    let label = request.label();

    let mut out = Vec::new();
    let mut page: u64 = 1;
    let mut fetched: u32 = 0;

    loop {
        let req = request
            .clone()
            .with_query("page", page.to_string())
            .with_query("per_page", page_size.to_string());
        let resp = transport.call(req).await?;
        let Page { items, next } = parse_page(resp.body, resp.status, &label)?;
        fetched += 1;

        let count = items.len();
        out.extend(items);
        debug!(call = %label, page, count, "fetched page");

        if count == 0 {
            break;
        }
        let next_page = match next {
            NextPage::Explicit(None) => break,
            // A non-advancing cursor would loop forever.
            NextPage::Explicit(Some(n)) if n <= page => break,
            NextPage::Explicit(Some(n)) => n,
            NextPage::Unknown if count < page_size as usize => break,
            NextPage::Unknown => page + 1,
        };

        if fetched >= max_pages {
            warn!(
                call = %label,
                max_pages,
                collected = out.len(),
                "pagination stopped at page limit; results are truncated"
            );
            break;
        }
        page = next_page;
    }

    Ok(out)
}

fn parse_page(body: Value, status: u16, label: &str) -> Result<Page> {
    match body {
        Value::Array(items) => Ok(Page {
            items,
            next: NextPage::Unknown,
        }),
        Value::Object(mut map) => {
            let Some(Value::Array(items)) = map.remove("data") else {
                return Err(TransportError::UnexpectedPayload {
                    status,
                    message: format!("{label} returned a page without a `data` array"),
                });
            };
            let next = match map.get("next_page") {
                None => NextPage::Unknown,
                Some(Value::Null) => NextPage::Explicit(None),
                Some(v) => match v.as_u64() {
                    Some(n) => NextPage::Explicit(Some(n)),
                    None => {
                        return Err(TransportError::UnexpectedPayload {
                            status,
                            message: format!(
                                "{label} returned a page with a non-integer `next_page`: {}",
                                truncate_for_message(&v.to_string(), 200)
                            ),
                        });
                    }
                },
            };
            Ok(Page { items, next })
        }
        other => Err(TransportError::UnexpectedPayload {
            status,
            message: format!(
                "{label} returned an unexpected page body: {}",
                truncate_for_message(&other.to_string(), 200)
            ),
        }),
    }
}
