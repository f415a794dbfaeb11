//! MCP server surface for the dispatcher.

use crate::dispatcher::ToolDispatcher;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use serde_json::Value;

const INSTRUCTIONS: &str = "Tools for reading and creating items in the configured external \
API. Read tools are safe to call repeatedly; create_item is not idempotent.";

#[derive(Clone)]
pub struct AdapterServer {
    dispatcher: ToolDispatcher,
}

impl AdapterServer {
    #[must_use]
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run one call and shape the payload as an MCP result.
    ///
    /// # Errors
    ///
    /// Returns the categorized failure converted to [`ErrorData`].
    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let payload = self.dispatcher.invoke(name, arguments).await?;
        let text = serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string());
        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(payload),
            is_error: Some(false),
            meta: None,
        })
    }
}

impl ServerHandler for AdapterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: ToolDispatcher::tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map_or(Value::Null, Value::Object);
        self.call(&request.name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ItemService;
    use async_trait::async_trait;
    use rmcp::model::ErrorCode;
    use serde_json::json;
    use std::sync::Arc;
    use unrelated_http_tools::response::Result as TransportResult;
    use unrelated_http_tools::{ApiRequest, RawResponse, Transport, TransportError};

    struct Canned(std::result::Result<Value, TransportError>);

    #[async_trait]
    impl Transport for Canned {
        async fn call(&self, _request: ApiRequest) -> TransportResult<RawResponse> {
            self.0.clone().map(|body| RawResponse { status: 200, body })
        }
    }

    fn server(reply: std::result::Result<Value, TransportError>) -> AdapterServer {
        AdapterServer::new(ToolDispatcher::new(ItemService::new(Arc::new(Canned(reply)))))
    }

    #[test]
    fn advertises_tools_capability() {
        let info = server(Ok(Value::Null)).get_info();
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn success_carries_structured_and_text_content() {
        let s = server(Ok(json!({"id": 5, "title": "t"})));
        let result = s.call("get_item", json!({"id": "5"})).await.expect("ok");
        let structured = result.structured_content.expect("structured");
        assert_eq!(structured["item"]["id"], "5");
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn failures_become_error_data() {
        let s = server(Err(TransportError::ServerError {
            status: 502,
            message: "GET /items/5 returned 502 Bad Gateway: upstream".into(),
        }));
        let err = s.call("get_item", json!({"id": "5"})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert!(err.message.contains("502"));
        assert_eq!(err.data.expect("data")["status"], 502);
    }
}
