//! Transport adapters over the shared tool registry.
//!
//! - `mcp`: the rmcp `ServerHandler`
//! - `stdio`: MCP over a byte-stream pair, with drain on shutdown
//! - `http`: plain JSON over GET
//! - `bridge`: platform events relayed to a child process
//! - `child`: spawning and handshaking that child
//! - `lifecycle`: adapter state tracking

pub mod bridge;
pub mod child;
pub mod http;
pub mod lifecycle;
pub mod mcp;
pub mod stdio;

#[cfg(test)]
use rmcp::service::RunningService;
#[cfg(test)]
use rmcp::{RoleClient, ServiceExt};

/// Connect an MCP client to `server` over an in-memory pipe.
#[cfg(test)]
pub(crate) async fn connect_in_process(
    server: mcp::WeatherMcpServer,
) -> RunningService<RoleClient, ()> {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    tokio::spawn(async move {
        match server.serve((server_read, server_write)).await {
            Ok(running) => {
                let _ = running.waiting().await;
            }
            Err(e) => tracing::debug!(error = %e, "in-process server ended during handshake"),
        }
    });
    let (client_read, client_write) = tokio::io::split(client_io);
    ().serve((client_read, client_write))
        .await
        .expect("in-process client handshake")
}
