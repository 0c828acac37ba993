//! Subprocess bridge for request/response platforms.
//!
//! Each platform event carrying a JSON-RPC message gets a fresh child process
//! speaking MCP over stdio: spawn, handshake, relay one request, tear down.
//! Nothing is kept between events, which matches runtimes that freeze or
//! recycle the process between invocations.
//!
//! Events use the API-Gateway proxy shape (`httpMethod`, `path`, `headers`,
//! `body`, `isBase64Encoded`). [`router`] is a local axum binding that turns
//! plain HTTP requests into such events.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rmcp::ErrorData as McpError;
use rmcp::RoleClient;
use rmcp::model::{CallToolRequestParams, ErrorCode, ListToolsResult};
use rmcp::service::RunningService;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::BridgeConfig;
use crate::error::ClimaError;
use crate::server::child::spawn_and_handshake;

/// Incoming platform request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEvent {
    pub http_method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl PlatformEvent {
    /// JSON-RPC POST with a plain-text body.
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            http_method: "POST".to_string(),
            path: "/".to_string(),
            headers: None,
            body: Some(body.into()),
            is_base64_encoded: false,
        }
    }

    /// Body as text, decoding base64 when the platform flagged it.
    pub fn decoded_body(&self) -> crate::Result<String> {
        let Some(body) = &self.body else {
            return Ok(String::new());
        };
        if !self.is_base64_encoded {
            return Ok(body.clone());
        }
        let bytes = BASE64
            .decode(body)
            .map_err(|e| ClimaError::MalformedPayload(format!("invalid base64 body: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ClimaError::MalformedPayload(format!("body is not UTF-8: {}", e)))
    }
}

/// Outgoing platform response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl PlatformResponse {
    fn new(status_code: u16, body: String) -> Self {
        let headers = [
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "POST, OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            status_code,
            headers,
            body,
        }
    }

    fn empty(status_code: u16) -> Self {
        Self::new(status_code, String::new())
    }

    fn json(status_code: u16, body: &Value) -> Self {
        Self::new(status_code, body.to_string())
    }

    /// JSON-RPC error response. `id` is `null` when the request could not be read.
    fn rpc_error(status_code: u16, id: Value, error: McpError) -> Self {
        Self::json(
            status_code,
            &json!({"jsonrpc": "2.0", "id": id, "error": error}),
        )
    }

    fn rpc_result(id: Value, result: Value) -> Self {
        Self::json(200, &json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }
}

/// JSON-RPC methods the bridge forwards to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
}

impl RelayMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "initialize" => Some(RelayMethod::Initialize),
            "ping" => Some(RelayMethod::Ping),
            "tools/list" => Some(RelayMethod::ToolsList),
            "tools/call" => Some(RelayMethod::ToolsCall),
            _ => None,
        }
    }
}

/// Forward one request to an already-initialized child session.
///
/// `initialize` is answered from the handshake the session already performed.
pub async fn relay(
    service: &RunningService<RoleClient, ()>,
    method: RelayMethod,
    params: Option<Value>,
    call_timeout: Duration,
) -> Result<Value, McpError> {
    let exchange = async {
        match method {
            RelayMethod::Initialize => {
                let info = service.peer_info().ok_or_else(|| {
                    McpError::internal_error("child did not report server info", None)
                })?;
                serde_json::to_value(info).map_err(|e| McpError::internal_error(e.to_string(), None))
            }
            RelayMethod::Ping => Ok(json!({})),
            RelayMethod::ToolsList => {
                let tools = service
                    .list_all_tools()
                    .await
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                let result = ListToolsResult {
                    tools,
                    next_cursor: None,
                    meta: None,
                };
                serde_json::to_value(result)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))
            }
            RelayMethod::ToolsCall => {
                let params: CallToolRequestParams =
                    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
                        McpError::invalid_params(format!("Invalid params: {}", e), None)
                    })?;
                let result = service
                    .call_tool(params)
                    .await
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                serde_json::to_value(result)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))
            }
        }
    };

    tokio::time::timeout(call_timeout, exchange)
        .await
        .unwrap_or_else(|_| {
            Err(McpError::internal_error(
                ClimaError::CallTimeout(call_timeout.as_secs()).to_string(),
                None,
            ))
        })
}

/// Platform adapter that spawns a child per event.
#[derive(Debug, Clone)]
pub struct SubprocessBridge {
    config: BridgeConfig,
}

impl SubprocessBridge {
    /// Build a bridge, rejecting unusable configuration up front.
    pub fn new(config: BridgeConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Handle one platform event end to end. Never fails: every problem becomes
    /// an HTTP status plus, where a message was read, a JSON-RPC error body.
    pub async fn handle(&self, event: PlatformEvent) -> PlatformResponse {
        let method = event.http_method.to_ascii_uppercase();
        if method == "OPTIONS" {
            return PlatformResponse::empty(200);
        }
        if method != "POST" {
            return PlatformResponse::json(
                405,
                &json!({"error": "Method not allowed", "allowed_methods": ["POST", "OPTIONS"]}),
            );
        }

        let message = match event
            .decoded_body()
            .and_then(|body| {
                serde_json::from_str::<Value>(&body)
                    .map_err(|e| ClimaError::MalformedPayload(e.to_string()))
            }) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "unreadable bridge request body");
                return PlatformResponse::rpc_error(
                    400,
                    Value::Null,
                    McpError::new(ErrorCode::PARSE_ERROR, format!("Parse error: {}", e), None),
                );
            }
        };

        let Some(rpc_method) = message.get("method").and_then(Value::as_str) else {
            return PlatformResponse::rpc_error(
                400,
                message.get("id").cloned().unwrap_or(Value::Null),
                McpError::new(
                    ErrorCode::INVALID_REQUEST,
                    "Invalid request: expected a single JSON-RPC message with a method",
                    None,
                ),
            );
        };

        let Some(id) = message.get("id").cloned() else {
            tracing::debug!(method = %rpc_method, "accepted notification");
            return PlatformResponse::empty(202);
        };

        let Some(relay_method) = RelayMethod::parse(rpc_method) else {
            return PlatformResponse::rpc_error(
                200,
                id,
                McpError::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Method not found: {}", rpc_method),
                    None,
                ),
            );
        };

        let session = match spawn_and_handshake(&self.config, &id.to_string()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(command = %self.config.command, error = %e, "failed to start bridge child");
                return PlatformResponse::rpc_error(
                    500,
                    id,
                    McpError::internal_error(e.to_string(), None),
                );
            }
        };
        tracing::debug!(pid = ?session.pid(), method = %rpc_method, "relaying request to child");

        let outcome = relay(
            &session.service,
            relay_method,
            message.get("params").cloned(),
            Duration::from_secs(self.config.call_timeout_secs),
        )
        .await;
        session.shutdown().await;

        match outcome {
            Ok(result) => PlatformResponse::rpc_result(id, result),
            Err(error) => {
                tracing::warn!(method = %rpc_method, error = %error.message, "relayed request failed");
                PlatformResponse::rpc_error(200, id, error)
            }
        }
    }
}

/// Local stand-in for the platform: every request becomes a [`PlatformEvent`].
pub fn router(bridge: SubprocessBridge) -> Router {
    Router::new()
        .fallback(forward_event)
        .with_state(Arc::new(bridge))
}

async fn forward_event(
    State(bridge): State<Arc<SubprocessBridge>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let (body, is_base64_encoded) = match std::str::from_utf8(&body) {
        _ if body.is_empty() => (None, false),
        Ok(text) => (Some(text.to_string()), false),
        Err(_) => (Some(BASE64.encode(&body)), true),
    };

    let event = PlatformEvent {
        http_method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: Some(headers),
        body,
        is_base64_encoded,
    };

    bridge.handle(event).await.into_response()
}

impl IntoResponse for PlatformResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connect_in_process;
    use crate::server::mcp::WeatherMcpServer;
    use crate::station::test_support::{Outcome, StubSource, neutral_reading};
    use crate::tools::ToolRegistry;
    use tower::ServiceExt;

    fn bridge_with_command(command: &str) -> SubprocessBridge {
        SubprocessBridge::new(BridgeConfig::new(command, vec![])).unwrap()
    }

    fn body_json(response: &PlatformResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[test]
    fn test_event_deserializes_from_platform_shape() {
        let event: PlatformEvent = serde_json::from_value(json!({
            "httpMethod": "POST",
            "path": "/mcp",
            "headers": null,
            "body": "eyJhIjoxfQ==",
            "isBase64Encoded": true
        }))
        .unwrap();
        assert_eq!(event.http_method, "POST");
        assert!(event.headers.is_none());
        assert_eq!(event.decoded_body().unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = PlatformResponse::empty(202);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 202);
        assert_eq!(value["headers"]["Access-Control-Allow-Origin"], "*");
        assert_eq!(value["body"], "");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SubprocessBridge::new(BridgeConfig::new("", vec![]));
        assert!(matches!(result, Err(ClimaError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_options_is_cors_preflight() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent {
                http_method: "OPTIONS".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert_eq!(
            response.headers["Access-Control-Allow-Methods"],
            "POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent {
                http_method: "GET".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(response.status_code, 405);
        assert_eq!(body_json(&response)["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_bad_json_is_parse_error() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge.handle(PlatformEvent::post("{not json")).await;
        assert_eq!(response.status_code, 400);
        let body = body_json(&response);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_bad_base64_is_parse_error() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent {
                is_base64_encoded: true,
                ..PlatformEvent::post("!!!")
            })
            .await;
        assert_eq!(response.status_code, 400);
        assert_eq!(body_json(&response)["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_missing_method_is_invalid_request() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent::post(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#))
            .await;
        assert_eq!(response.status_code, 400);
        assert_eq!(body_json(&response)["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_notification_is_accepted_without_spawning() {
        // The command does not exist, so any spawn attempt would produce a 500
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent::post(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await;
        assert_eq!(response.status_code, 202);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent::post(
                r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#,
            ))
            .await;
        assert_eq!(response.status_code, 200);
        let body = body_json(&response);
        assert_eq!(body["id"], 7);
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_internal_error() {
        let bridge = bridge_with_command("/this/command/does/not/exist-clima");
        let response = bridge
            .handle(PlatformEvent::post(
                r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#,
            ))
            .await;
        assert_eq!(response.status_code, 500);
        let body = body_json(&response);
        assert_eq!(body["id"], "a");
        assert_eq!(body["error"]["code"], -32603);
        assert!(body["error"]["message"].as_str().unwrap().contains("exist-clima"));
    }

    #[test]
    fn test_relay_method_parse() {
        assert_eq!(RelayMethod::parse("tools/call"), Some(RelayMethod::ToolsCall));
        assert_eq!(RelayMethod::parse("initialize"), Some(RelayMethod::Initialize));
        assert_eq!(RelayMethod::parse("prompts/list"), None);
    }

    #[tokio::test]
    async fn test_relay_against_in_process_server() {
        let server = WeatherMcpServer::new(ToolRegistry::new(StubSource::reading(
            neutral_reading(),
        )));
        let client = connect_in_process(server).await;
        let timeout = Duration::from_secs(5);

        let init = relay(&client, RelayMethod::Initialize, None, timeout)
            .await
            .unwrap();
        assert_eq!(init["serverInfo"]["name"], "clima-mcp");

        let ping = relay(&client, RelayMethod::Ping, None, timeout).await.unwrap();
        assert_eq!(ping, json!({}));

        let list = relay(&client, RelayMethod::ToolsList, None, timeout)
            .await
            .unwrap();
        assert_eq!(list["tools"].as_array().unwrap().len(), 4);

        let call = relay(
            &client,
            RelayMethod::ToolsCall,
            Some(json!({"name": "get_temperature", "arguments": {}})),
            timeout,
        )
        .await
        .unwrap();
        assert_ne!(call["isError"], json!(true));
        assert!(call["content"][0]["text"].as_str().unwrap().contains("18°C"));

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_upstream_failure_stays_in_envelope() {
        let server =
            WeatherMcpServer::new(ToolRegistry::new(StubSource::new(Outcome::Status(503))));
        let client = connect_in_process(server).await;

        let call = relay(
            &client,
            RelayMethod::ToolsCall,
            Some(json!({"name": "get_current_weather"})),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(call["isError"], json!(true));
        assert!(call["content"][0]["text"].as_str().unwrap().contains("503"));

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_bad_call_params_is_invalid_params() {
        let server = WeatherMcpServer::new(ToolRegistry::new(StubSource::reading(
            neutral_reading(),
        )));
        let client = connect_in_process(server).await;

        let error = relay(
            &client,
            RelayMethod::ToolsCall,
            Some(json!({"arguments": {}})),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_binding_converts_http_to_events() {
        let app = router(bridge_with_command("/this/command/does/not/exist-clima"));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/mcp")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
