//! Child process running the stdio transport, used by the subprocess bridge.
//!
//! Uses raw `tokio::process::Command` instead of rmcp's `TokioChildProcess` so
//! stdout can be filtered: anything that is not a JSON line (banners, stray
//! prints) is dropped before it reaches the MCP client. stderr is drained into
//! `tracing`.

use std::time::Duration;

use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::ClimaError;

/// A connected MCP client session and the process behind it.
///
/// The `Child` is kept so the process is not reaped early; `shutdown` closes the
/// session and kills the process.
pub struct ChildSession {
    pub service: RunningService<RoleClient, ()>,
    child: Child,
    io_cancel: CancellationToken,
}

impl ChildSession {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Close the session and make sure the process is gone.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.service.cancel().await {
            tracing::debug!(error = %e, "child session task ended abnormally");
        }
        self.io_cancel.cancel();
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "child already exited");
        }
    }
}

/// Spawn the configured command with stdin, stdout, and stderr all piped.
fn spawn_child(config: &BridgeConfig) -> crate::Result<Child> {
    let mut cmd = Command::new(&config.command);

    if !config.args.is_empty() {
        cmd.args(&config.args);
    }

    if !config.env.is_empty() {
        cmd.envs(&config.env);
    }

    if let Some(ref cwd) = config.cwd {
        cmd.current_dir(cwd);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    cmd.spawn().map_err(|e| {
        ClimaError::Transport(format!("failed to spawn '{}': {}", config.command, e))
    })
}

/// True when a stdout line should reach the MCP client.
fn is_protocol_line(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line).is_ok()
}

/// True when a child stderr line is a warning or error from the child's own logger.
///
/// Only the leading tokens are checked, which is where the level sits in the
/// default `tracing-subscriber` format (possibly wrapped in ANSI colour codes).
fn is_child_warning(line: &str) -> bool {
    line.split_whitespace()
        .take(3)
        .any(|token| token.contains("WARN") || token.contains("ERROR"))
}

/// Forward JSON lines from the child's stdout into the returned reader.
fn start_stdout_filter(
    child_stdout: ChildStdout,
    request_id: String,
    cancel: CancellationToken,
) -> tokio::io::ReadHalf<tokio::io::DuplexStream> {
    let (client_side, server_side) = tokio::io::duplex(65536);
    let (reader, _client_writer) = tokio::io::split(client_side);
    let (_server_reader, mut writer) = tokio::io::split(server_side);

    tokio::spawn(async move {
        let mut lines = BufReader::new(child_stdout).lines();
        loop {
            tokio::select! {
                line_result = lines.next_line() => {
                    match line_result {
                        Ok(Some(line)) => {
                            if is_protocol_line(&line) {
                                let with_newline = format!("{}\n", line);
                                if writer.write_all(with_newline.as_bytes()).await.is_err() {
                                    break;
                                }
                            } else {
                                tracing::debug!(request_id = %request_id, line = %line, "discarding non-JSON child stdout line");
                            }
                        }
                        // EOF or read error; dropping the writer signals EOF downstream
                        Ok(None) | Err(_) => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });

    reader
}

/// Relay the child's stderr into our own log, tagged with the request it serves.
/// The child's warnings and errors surface at warn; everything else at debug.
fn start_stderr_drain(
    child_stderr: ChildStderr,
    pid: Option<u32>,
    request_id: String,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(child_stderr).lines();
        loop {
            tokio::select! {
                line_result = lines.next_line() => {
                    match line_result {
                        Ok(Some(line)) if is_child_warning(&line) => {
                            tracing::warn!(?pid, request_id = %request_id, line = %line, "bridge child reported a problem");
                        }
                        Ok(Some(line)) => {
                            tracing::debug!(?pid, request_id = %request_id, line = %line, "bridge child stderr");
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}

/// Spawn a child for one bridged request and perform the MCP handshake.
///
/// `request_id` is the JSON-RPC id of that request; it tags the child's log lines.
pub async fn spawn_and_handshake(
    config: &BridgeConfig,
    request_id: &str,
) -> crate::Result<ChildSession> {
    let mut child = spawn_child(config)?;
    let pid = child.id();

    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| ClimaError::Transport("failed to open stdin pipe".to_string()))?;
    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClimaError::Transport("failed to open stdout pipe".to_string()))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| ClimaError::Transport("failed to open stderr pipe".to_string()))?;

    let io_cancel = CancellationToken::new();
    let filtered_reader =
        start_stdout_filter(child_stdout, request_id.to_string(), io_cancel.clone());
    start_stderr_drain(child_stderr, pid, request_id.to_string(), io_cancel.clone());

    let transport = (filtered_reader, child_stdin);

    let timeout_secs = config.handshake_timeout_secs;
    let handshake_result = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        ().serve_with_ct(transport, io_cancel.child_token()),
    )
    .await;

    match handshake_result {
        Err(_elapsed) => {
            io_cancel.cancel();
            let _ = child.kill().await;
            Err(ClimaError::InitializationFailed(format!(
                "MCP handshake timed out after {}s",
                timeout_secs
            )))
        }
        Ok(Err(e)) => {
            io_cancel.cancel();
            let _ = child.kill().await;
            Err(ClimaError::InitializationFailed(e.to_string()))
        }
        Ok(Ok(service)) => {
            tracing::debug!(?pid, request_id = %request_id, "child handshake complete");
            Ok(ChildSession {
                service,
                child,
                io_cancel,
            })
        }
    }
}
