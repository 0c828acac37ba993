//! clima-mcp: MCP tools over the UNLP Facultad de Informática weather station.
//! One tool registry, reachable over MCP stdio, a plain HTTP router, and a
//! subprocess bridge for request/response platforms.

pub mod analysis;
pub mod config;
pub mod error;
pub mod format;
pub mod server;
pub mod station;
pub mod tools;

pub use config::{BridgeConfig, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_PORT};
pub use error::{ClimaError, Result};
pub use server::bridge::{PlatformEvent, PlatformResponse, SubprocessBridge};
pub use server::lifecycle::{AdapterState, Lifecycle};
pub use server::mcp::WeatherMcpServer;
pub use server::stdio::run_stdio;
pub use station::{ReadingSource, StationClient, WeatherReading};
pub use tools::{ToolRegistry, WeatherParameter};
