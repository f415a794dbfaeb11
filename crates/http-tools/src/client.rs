//! Authenticated HTTP client for one external API.
//!
//! The client is acquired once per process (or per test) and shared by every invocation. It is
//! `Clone`; clones share one connection pool and one lifecycle.

use crate::pagination::PageLimits;
use crate::request::ApiRequest;
use crate::response::{RawResponse, Result, TransportError, classify, decode_body};
use crate::retry::{RetryPolicy, is_retryable};
use crate::safety::{redact_secret, sanitize_reqwest_error};
use crate::semantics::is_safe_method;
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Everything needed to acquire an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL; request paths are appended to it.
    pub base_url: Url,
    /// Bearer credential attached to every request.
    pub bearer_token: String,
    /// Per-request timeout. `None` disables it.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub page_limits: PageLimits,
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

struct HttpClientInner {
    options: ClientOptions,
    /// `None` once the client is closed.
    client: RwLock<Option<Client>>,
    /// The credential currently baked into `client`; kept for message redaction.
    token: RwLock<String>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.options.base_url.as_str())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Acquire a client: build the connection pool with auth attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not `http(s)` or the credential cannot be used as a
    /// header value.
    pub fn open(options: ClientOptions) -> Result<Self> {
        let scheme = options.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(TransportError::Transport {
                message: format!("unsupported URL scheme '{scheme}'"),
            });
        }

        let client = build_client(&options, &options.bearer_token)?;
        let token = options.bearer_token.clone();
        debug!(base_url = %crate::safety::redact_url(&options.base_url), "http client opened");

        Ok(Self {
            inner: Arc::new(HttpClientInner {
                options,
                client: RwLock::new(Some(client)),
                token: RwLock::new(token),
            }),
        })
    }

    /// Acquire a client, run `f` with it, and release it on every exit path.
    ///
    /// The client is also closed if `f` panics or the returned future is dropped mid-call.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be acquired; otherwise returns whatever `f` returns.
    pub async fn scoped<F, Fut, T, E>(options: ClientOptions, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(HttpClient) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<TransportError>,
    {
        let client = Self::open(options)?;
        let guard = CloseOnDrop(client.clone());
        let out = f(client).await;
        drop(guard);
        out
    }

    /// Release the connection pool. Safe to call any number of times.
    pub fn close(&self) {
        if self.inner.client.write().take().is_some() {
            debug!("http client closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.client.read().is_none()
    }

    /// Replace the bearer credential. In-flight calls finish with the old one.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the client was released, or an error if the token is
    /// not a valid header value.
    pub fn rotate_credential(&self, token: &str) -> Result<()> {
        let rebuilt = build_client(&self.inner.options, token)?;
        let mut slot = self.inner.client.write();
        if slot.is_none() {
            return Err(TransportError::Closed);
        }
        *slot = Some(rebuilt);
        *self.inner.token.write() = token.to_string();
        debug!("http client credential rotated");
        Ok(())
    }

    fn current(&self) -> Result<Client> {
        self.inner.client.read().clone().ok_or(TransportError::Closed)
    }

    /// Base path + request path; a query already on the base URL is kept ahead of the
    /// request's own pairs.
    fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.inner.options.base_url.clone();
        if url.cannot_be_a_base() {
            return Err(TransportError::Transport {
                message: format!("invalid request URL for {}", request.label()),
            });
        }
        let path = format!("{}{}", url.path().trim_end_matches('/'), request.path);
        url.set_path(&path);
        url.set_fragment(None);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    async fn attempt(&self, request: &ApiRequest, url: &Url) -> Result<RawResponse> {
        let client = self.current()?;
        let label = request.label();

        let mut builder = client.request(request.method.clone(), url.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let body = decode_body(&bytes);

        classify(status, body, &label).map_err(|e| self.scrub(e))
    }

    fn transport_error(&self, e: &reqwest::Error) -> TransportError {
        let message = if e.is_timeout() {
            format!("request timed out: {}", sanitize_reqwest_error(e))
        } else if e.is_connect() {
            format!("connection failed: {}", sanitize_reqwest_error(e))
        } else {
            sanitize_reqwest_error(e)
        };
        TransportError::Transport {
            message: redact_secret(&message, &self.inner.token.read()),
        }
    }

    fn scrub(&self, e: TransportError) -> TransportError {
        let token = self.inner.token.read();
        match e {
            TransportError::ClientError { status, message } => TransportError::ClientError {
                status,
                message: redact_secret(&message, &token),
            },
            TransportError::ServerError { status, message } => TransportError::ServerError {
                status,
                message: redact_secret(&message, &token),
            },
            other => other,
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn call(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = self.build_url(&request)?;
        let max_attempts = if is_safe_method(&request.method) {
            self.inner.options.retry.max_attempts()
        } else {
            1
        };

        let mut attempt: u32 = 1;
        loop {
            debug!(method = %request.method, path = %request.path, attempt, "http call");
            match self.attempt(&request, &url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.inner.options.retry.delay_after(attempt);
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        attempt,
                        status = e.status(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying http call"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
            attempt = attempt.saturating_add(1);
        }
    }

    fn page_limits(&self) -> PageLimits {
        self.inner.options.page_limits
    }
}

impl Drop for HttpClientInner {
    fn drop(&mut self) {
        if self.client.get_mut().take().is_some() {
            debug!("http client released");
        }
    }
}

struct CloseOnDrop(HttpClient);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn build_client(options: &ClientOptions, token: &str) -> Result<Client> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        TransportError::Transport {
            message: "credential is not a valid HTTP header value".to_string(),
        }
    })?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    let mut builder = Client::builder()
        .default_headers(headers)
        .user_agent(options.user_agent.clone());
    if let Some(t) = options.timeout {
        builder = builder.timeout(t);
    }
    builder.build().map_err(|e| TransportError::Transport {
        message: format!("failed to build http client: {}", sanitize_reqwest_error(&e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unrelated_test_support::{MockApi, pick_unused_port};

    fn options(base_url: &str) -> ClientOptions {
        ClientOptions {
            base_url: Url::parse(base_url).expect("url"),
            bearer_token: "test-token".to_string(),
            timeout: Some(Duration::from_secs(5)),
            user_agent: "unrelated-http-tools-test".to_string(),
            retry: RetryPolicy {
                maximum_attempts: 3,
                initial_interval_ms: 1,
                backoff_coefficient: 1.0,
                maximum_interval_ms: None,
            },
            page_limits: PageLimits::default(),
        }
    }

    #[tokio::test]
    async fn attaches_bearer_and_user_agent() {
        async fn echo(headers: HeaderMap) -> axum::Json<Value> {
            axum::Json(json!({
                "auth": headers.get("authorization").and_then(|v| v.to_str().ok()),
                "ua": headers.get("user-agent").and_then(|v| v.to_str().ok()),
            }))
        }
        let api = MockApi::start(Router::new().route("/whoami", get(echo)))
            .await
            .expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let resp = client.call(ApiRequest::get("/whoami")).await.expect("call");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["auth"], "Bearer test-token");
        assert_eq!(resp.body["ua"], "unrelated-http-tools-test");
    }

    #[tokio::test]
    async fn base_url_path_prefix_and_query_are_kept() {
        async fn echo(uri: axum::http::Uri) -> axum::Json<Value> {
            axum::Json(json!({ "path": uri.path(), "query": uri.query() }))
        }
        let api = MockApi::start(Router::new().route("/v1/items", get(echo)))
            .await
            .expect("mock api");

        let client = HttpClient::open(options(&format!("{}/v1/", api.base_url()))).expect("open");
        let resp = client
            .call(ApiRequest::get("/items").with_query("status", "in progress"))
            .await
            .expect("call");
        assert_eq!(resp.body["path"], "/v1/items");
        assert_eq!(resp.body["query"], "status=in+progress");
    }

    #[tokio::test]
    async fn base_url_query_stays_in_the_query() {
        async fn echo(uri: axum::http::Uri) -> axum::Json<Value> {
            axum::Json(json!({ "path": uri.path(), "query": uri.query() }))
        }
        let api = MockApi::start(Router::new().route("/items/{id}", get(echo)))
            .await
            .expect("mock api");

        let client =
            HttpClient::open(options(&format!("{}/?tenant=acme", api.base_url()))).expect("open");
        let resp = client
            .call(ApiRequest::get("/items/1").with_query("expand", "tags"))
            .await
            .expect("call");
        assert_eq!(resp.body["path"], "/items/1");
        assert_eq!(resp.body["query"], "tenant=acme&expand=tags");
    }

    #[tokio::test]
    async fn reads_retry_server_errors_then_succeed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/flaky",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, "try later")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }),
            )
            .with_state(hits.clone());
        let api = MockApi::start(app).await.expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let resp = client.call(ApiRequest::get("/flaky")).await.expect("call");
        assert_eq!(resp.body, json!("ok"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reads_give_up_after_max_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/broken",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                }),
            )
            .with_state(hits.clone());
        let api = MockApi::start(app).await.expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let err = client.call(ApiRequest::get("/broken")).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().ends_with("internal error"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn writes_are_never_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/items",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::BAD_GATEWAY, "upstream down")
                }),
            )
            .with_state(hits.clone());
        let api = MockApi::start(app).await.expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let err = client
            .call(ApiRequest::post("/items", json!({"title": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ServerError { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/missing",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::NOT_FOUND, "nope")
                }),
            )
            .with_state(hits.clone());
        let api = MockApi::start(app).await.expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let err = client.call(ApiRequest::get("/missing")).await.unwrap_err();
        assert!(matches!(err, TransportError::ClientError { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let port = pick_unused_port().expect("port");
        let client = HttpClient::open(options(&format!("http://127.0.0.1:{port}"))).expect("open");
        let err = client.call(ApiRequest::get("/items")).await.unwrap_err();
        assert!(matches!(err, TransportError::Transport { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_calls() {
        let api = MockApi::start(Router::new().route("/ping", get(|| async { "pong" })))
            .await
            .expect("mock api");
        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let clone = client.clone();

        client.close();
        client.close();
        assert!(clone.is_closed());

        let err = clone.call(ApiRequest::get("/ping")).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
        assert_eq!(clone.rotate_credential("other"), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn scoped_releases_on_error_exit() {
        let api = MockApi::start(Router::new().route("/ping", get(|| async { "pong" })))
            .await
            .expect("mock api");

        let mut leaked: Option<HttpClient> = None;
        let out: std::result::Result<(), TransportError> =
            HttpClient::scoped(options(&api.base_url()), |client| {
                leaked = Some(client.clone());
                async move {
                    client.call(ApiRequest::get("/ping")).await?;
                    Err(TransportError::Transport {
                        message: "boom".into(),
                    })
                }
            })
            .await;

        assert!(out.is_err());
        assert!(leaked.expect("client handed out").is_closed());
    }

    #[tokio::test]
    async fn rotated_credential_is_used_for_later_calls() {
        async fn echo(headers: HeaderMap) -> String {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        }
        let api = MockApi::start(Router::new().route("/whoami", get(echo)))
            .await
            .expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        client.rotate_credential("rotated-token").expect("rotate");
        let resp = client.call(ApiRequest::get("/whoami")).await.expect("call");
        assert_eq!(resp.body, json!("Bearer rotated-token"));
    }

    #[tokio::test]
    async fn credential_is_scrubbed_from_error_bodies() {
        async fn leak(headers: HeaderMap) -> (StatusCode, String) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            (StatusCode::UNAUTHORIZED, format!("rejected {auth}"))
        }
        let api = MockApi::start(Router::new().route("/secure", get(leak)))
            .await
            .expect("mock api");

        let client = HttpClient::open(options(&api.base_url())).expect("open");
        let err = client.call(ApiRequest::get("/secure")).await.unwrap_err();
        assert!(!err.to_string().contains("test-token"));
        assert!(err.to_string().contains("[redacted]"));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let err = HttpClient::open(options("ftp://example.com")).unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }
}
