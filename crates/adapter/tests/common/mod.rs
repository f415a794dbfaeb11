#![allow(dead_code)]

use anyhow::Context as _;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use unrelated_api_adapter::config::{
    API_BASE_URL, API_RETRY_INITIAL_INTERVAL_MS, API_RETRY_MAX_INTERVAL_MS, API_TOKEN,
};
use unrelated_api_adapter::{Configuration, ItemService, ToolDispatcher};
use unrelated_env::MapEnv;
use unrelated_http_tools::HttpClient;

pub use unrelated_test_support::MockApi;

pub const TOKEN: &str = "integration-secret-token";

/// State behind the fake items API.
#[derive(Default)]
pub struct ItemsApi {
    pub items: Mutex<Vec<Value>>,
    pub list_hits: AtomicUsize,
    pub get_hits: AtomicUsize,
    pub create_hits: AtomicUsize,
    /// When set, every route answers with this status and body.
    pub fail_with: Mutex<Option<(StatusCode, String)>>,
}

impl ItemsApi {
    pub fn with_items(count: usize) -> Arc<Self> {
        let items = (1..=count)
            .map(|i| {
                json!({
                    "id": i,
                    "title": format!("Item {i}"),
                    "status": if i % 2 == 0 { "closed" } else { "open" },
                    "tags": if i % 3 == 0 { json!(["triage"]) } else { json!([]) },
                    "html_url": format!("https://tracker.example.com/items/{i}"),
                })
            })
            .collect();
        Arc::new(Self {
            items: Mutex::new(items),
            ..Self::default()
        })
    }

    pub fn fail_with(&self, status: StatusCode, body: &str) {
        *self.fail_with.lock() = Some((status, body.to_string()));
    }

    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: usize,
    per_page: usize,
    status: Option<String>,
}

type Reply = (StatusCode, Json<Value>);

fn authorize(headers: &HeaderMap) -> Result<(), Reply> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "bad credentials"})),
        )),
    }
}

fn injected_failure(api: &ItemsApi) -> Option<Reply> {
    api.fail_with
        .lock()
        .as_ref()
        .map(|(status, body)| (*status, Json(json!(body))))
}

async fn list_items(
    State(api): State<Arc<ItemsApi>>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> Reply {
    api.list_hits.fetch_add(1, Ordering::SeqCst);
    if let Err(reply) = authorize(&headers) {
        return reply;
    }
    if let Some(reply) = injected_failure(&api) {
        return reply;
    }

    let items = api.items.lock();
    let matching: Vec<&Value> = items
        .iter()
        .filter(|item| q.status.as_deref().is_none_or(|s| item["status"] == s))
        .collect();
    let start = (q.page.saturating_sub(1)) * q.per_page;
    let data: Vec<Value> = matching
        .iter()
        .skip(start)
        .take(q.per_page)
        .map(|v| (*v).clone())
        .collect();
    let next_page = if start + q.per_page < matching.len() {
        json!(q.page + 1)
    } else {
        Value::Null
    };
    (
        StatusCode::OK,
        Json(json!({ "data": data, "next_page": next_page })),
    )
}

async fn get_item(
    State(api): State<Arc<ItemsApi>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    api.get_hits.fetch_add(1, Ordering::SeqCst);
    if let Err(reply) = authorize(&headers) {
        return reply;
    }
    if let Some(reply) = injected_failure(&api) {
        return reply;
    }
    let items = api.items.lock();
    match items.iter().find(|item| item["id"].to_string() == id) {
        Some(item) => (StatusCode::OK, Json(item.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "item not found"})),
        ),
    }
}

async fn create_item(
    State(api): State<Arc<ItemsApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    api.create_hits.fetch_add(1, Ordering::SeqCst);
    if let Err(reply) = authorize(&headers) {
        return reply;
    }
    if let Some(reply) = injected_failure(&api) {
        return reply;
    }
    let mut items = api.items.lock();
    let mut item = body;
    item["id"] = json!(items.len() + 1);
    item["status"] = json!("open");
    items.push(item.clone());
    (StatusCode::CREATED, Json(item))
}

pub fn router(api: Arc<ItemsApi>) -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item))
        .with_state(api)
}

pub async fn start_api(api: Arc<ItemsApi>) -> anyhow::Result<MockApi> {
    MockApi::start(router(api)).await.context("start items api")
}

/// Environment pointing at `base_url`, with fast retries.
pub fn env_for(base_url: &str) -> MapEnv {
    MapEnv::new()
        .with(API_BASE_URL, base_url)
        .with(API_TOKEN, TOKEN)
        .with(API_RETRY_INITIAL_INTERVAL_MS, "1")
        .with(API_RETRY_MAX_INTERVAL_MS, "5")
}

pub fn dispatcher_for(env: &MapEnv) -> anyhow::Result<(ToolDispatcher, HttpClient)> {
    let config = Configuration::from_source(env).context("resolve configuration")?;
    let (service, client) = ItemService::connect(&config).context("connect")?;
    Ok((ToolDispatcher::new(service), client))
}
