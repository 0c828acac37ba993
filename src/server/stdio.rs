//! MCP over a pair of byte streams (stdin/stdout in production).
//!
//! stdout carries protocol frames only; diagnostics go through `tracing`, which
//! the binary points at stderr. Cancellation drains in-flight calls for up to
//! [`DRAIN_TIMEOUT`] before the transport is closed.

use std::time::Duration;

use rmcp::ServiceExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::ClimaError;
use crate::server::mcp::WeatherMcpServer;

/// Upper bound on waiting for in-flight calls once shutdown is requested.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve `server` over `reader`/`writer` until the peer disconnects or `cancel` fires.
///
/// The service gets its own token so that cancellation can drain first and only
/// then close the transport.
pub async fn run_stdio<R, W>(
    server: WeatherMcpServer,
    reader: R,
    writer: W,
    cancel: CancellationToken,
) -> crate::Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let lifecycle = server.lifecycle();
    let service_ct = CancellationToken::new();

    let running = tokio::select! {
        result = server.serve_with_ct((reader, writer), service_ct.clone()) => {
            result.map_err(|e| ClimaError::InitializationFailed(e.to_string()))?
        }
        _ = cancel.cancelled() => {
            tracing::info!("stdio transport cancelled before handshake");
            lifecycle.terminate();
            return Ok(());
        }
    };

    lifecycle.mark_ready();
    tracing::info!("stdio transport initialized, waiting for messages");

    let waiting = running.waiting();
    tokio::pin!(waiting);

    let outcome = tokio::select! {
        result = &mut waiting => result,
        _ = cancel.cancelled() => {
            lifecycle.begin_drain();
            tracing::info!(in_flight = lifecycle.in_flight(), "draining stdio transport");
            if !lifecycle.drained(DRAIN_TIMEOUT).await {
                tracing::warn!("closing stdio transport with calls still running");
            }
            service_ct.cancel();
            (&mut waiting).await
        }
    };

    lifecycle.terminate();

    match outcome {
        Ok(reason) => {
            tracing::info!(?reason, "stdio transport completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "stdio transport error");
            Err(ClimaError::Transport(e.to_string()))
        }
    }
}
