//! WeatherMcpServer: rmcp ServerHandler backed by a ToolRegistry.
//!
//! Every transport that speaks MCP (stdio directly, the bridge through a child
//! process) ends up here. Tool calls run on their own task so a panicking
//! handler is reported as an error envelope instead of taking the session down.

use std::sync::Arc;

use rmcp::ErrorData as McpError;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};

use crate::server::lifecycle::Lifecycle;
use crate::station::STATION;
use crate::tools::ToolRegistry;

/// MCP server over the shared tool catalog.
///
/// Clones share the registry and the lifecycle tracker.
#[derive(Clone, Debug)]
pub struct WeatherMcpServer {
    registry: ToolRegistry,
    lifecycle: Arc<Lifecycle>,
}

impl WeatherMcpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }
}

impl ServerHandler for WeatherMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "clima-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some(format!("{} weather station", STATION.station)),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Live readings from the {} weather station in {}. \
                 Use get_current_weather for the full report, get_weather_parameter for a single value, \
                 or analyze_weather_conditions for a short interpretation.",
                STATION.station, STATION.location
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    /// Run the tool on its own task; tool failures come back as `isError` envelopes,
    /// never as protocol errors. Calls arriving after shutdown began are refused.
    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        let Some(_dispatch) = self.lifecycle.begin_dispatch() else {
            tracing::debug!(tool = %name, "refusing tool call while shutting down");
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Server is shutting down; {} was not run",
                name
            ))]));
        };
        tracing::debug!(tool = %name, "dispatching tool call");

        let registry = self.registry.clone();
        let tool = name.clone();
        let handle =
            tokio::spawn(async move { registry.invoke(&tool, request.arguments).await });

        match handle.await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(tool = %name, error = %e, "tool handler aborted");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Internal error while running {}",
                    name
                ))]))
            }
        }
    }
}
