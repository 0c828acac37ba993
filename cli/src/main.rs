//! clima-mcp: UNLP weather station tools for MCP clients and plain HTTP.
//!
//! Three subcommands:
//! - `clima-mcp stdio`: MCP over stdin/stdout for Claude Desktop and other stdio clients
//! - `clima-mcp serve`: plain JSON weather endpoints over HTTP
//! - `clima-mcp bridge`: JSON-RPC over HTTP, each request relayed to a fresh stdio child

use anyhow::Result;

use clap::{Parser, Subcommand};
use clima_mcp::server::{bridge, http};
use clima_mcp::{
    BridgeConfig, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_PORT, SubprocessBridge, ToolRegistry,
    WeatherMcpServer, run_stdio,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// clima-mcp: UNLP weather station tools for MCP clients and plain HTTP.
#[derive(Parser)]
#[command(
    name = "clima-mcp",
    version,
    about = "UNLP Facultad de Informática weather station, served over MCP stdio, HTTP, or a subprocess bridge"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the weather tools over MCP stdio
    Stdio,
    /// Serve plain JSON weather endpoints over HTTP
    Serve {
        /// HTTP port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Accept JSON-RPC over HTTP and relay each request to a child stdio server
    Bridge {
        /// HTTP port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Child executable [default: this binary with the `stdio` subcommand]
        #[arg(long)]
        child_command: Option<String>,
        /// Argument passed to the child command (repeatable)
        #[arg(long = "child-arg", allow_hyphen_values = true)]
        child_args: Vec<String>,
        /// Seconds to wait for the child's MCP handshake
        #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_SECS)]
        handshake_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity; stdout stays reserved for protocol frames
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Stdio) {
        print_banner();
    }

    let cancel = CancellationToken::new();

    // Ctrl-C cancels the root token for graceful shutdown
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down clima-mcp...");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Stdio => run_stdio_command(cancel).await?,
        Commands::Serve { port, host } => run_serve(host, port, cancel).await?,
        Commands::Bridge {
            port,
            host,
            child_command,
            child_args,
            handshake_timeout,
        } => {
            let mut config = match child_command {
                Some(command) => BridgeConfig::new(command, child_args),
                None => BridgeConfig::for_current_exe()?,
            };
            config.handshake_timeout_secs = handshake_timeout;
            run_bridge(config, host, port, cancel).await?;
        }
    }

    Ok(())
}

/// Serve MCP over stdin/stdout until the client disconnects or Ctrl-C.
async fn run_stdio_command(cancel: CancellationToken) -> Result<()> {
    let registry = ToolRegistry::for_station()
        .map_err(|e| anyhow::anyhow!("Failed to build weather client: {}", e))?;
    let server = WeatherMcpServer::new(registry);

    run_stdio(server, tokio::io::stdin(), tokio::io::stdout(), cancel)
        .await
        .map_err(|e| anyhow::anyhow!("clima-mcp stdio transport error: {}", e))
}

/// Serve the plain JSON endpoints.
async fn run_serve(host: String, port: u16, cancel: CancellationToken) -> Result<()> {
    let registry = ToolRegistry::for_station()
        .map_err(|e| anyhow::anyhow!("Failed to build weather client: {}", e))?;
    let app = http::router(registry);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, "clima-mcp HTTP server listening");
    tracing::info!("Try http://{}:{}/current", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("clima-mcp HTTP server error: {}", e))?;

    tracing::info!("clima-mcp HTTP server stopped");
    Ok(())
}

/// Serve the subprocess bridge behind a local HTTP listener.
async fn run_bridge(
    config: BridgeConfig,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let command = config.command.clone();
    let bridge = SubprocessBridge::new(config)
        .map_err(|e| anyhow::anyhow!("Invalid bridge configuration: {}", e))?;
    let app = bridge::router(bridge);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, child = %command, "clima-mcp bridge listening");
    tracing::info!("POST JSON-RPC messages to http://{}:{}/", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("clima-mcp bridge error: {}", e))?;

    tracing::info!("clima-mcp bridge stopped");
    Ok(())
}

/// Print a one-line startup banner to stderr.
///
/// Sky-blue gradient across the name. Respects NO_COLOR and skips output when
/// stderr is not a terminal.
fn print_banner() {
    use std::fmt::Write;
    use std::io::IsTerminal;

    if !std::io::stderr().is_terminal() || std::env::var_os("NO_COLOR").is_some() {
        return;
    }

    let title = "☁  clima-mcp";
    let chars: Vec<char> = title.chars().collect();
    let last = chars.len().saturating_sub(1).max(1) as f32;

    // (r, g, b) at the left and right ends
    let (from, to) = ((90.0_f32, 170.0_f32, 230.0_f32), (200.0_f32, 230.0_f32, 255.0_f32));

    let mut buf = String::with_capacity(512);
    buf.push_str("\n    ");
    for (i, ch) in chars.iter().enumerate() {
        let t = i as f32 / last;
        let _ = write!(
            buf,
            "\x1b[1;38;2;{};{};{}m{}",
            (from.0 + t * (to.0 - from.0)) as u8,
            (from.1 + t * (to.1 - from.1)) as u8,
            (from.2 + t * (to.2 - from.2)) as u8,
            ch
        );
    }
    buf.push_str("\x1b[0m\n");
    let _ = writeln!(
        buf,
        "    \x1b[2;38;2;140;170;200mv{}  ·  Facultad de Informática UNLP, La Plata\x1b[0m\n",
        env!("CARGO_PKG_VERSION")
    );

    eprint!("{buf}");
}
