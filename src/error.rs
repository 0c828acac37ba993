//! Error types for clima-mcp operations.

use thiserror::Error;

/// Main error type for clima-mcp operations
#[derive(Error, Debug)]
pub enum ClimaError {
    /// The station endpoint could not be reached (connect failure, timeout, broken body)
    #[error("weather station unreachable: {0}")]
    UpstreamUnavailable(String),

    /// The station answered with a non-success status
    #[error("weather station returned HTTP status {0}")]
    UpstreamError(u16),

    /// The station body did not decode as a reading
    #[error("malformed weather payload: {0}")]
    MalformedPayload(String),

    /// Caller-supplied parameter outside the accepted set
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tool name not present in the registry
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Bridge configuration rejected before any child is spawned
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Child process I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// MCP handshake with the child process failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Relayed call exceeded its deadline
    #[error("call timed out after {0}s")]
    CallTimeout(u64),
}

/// Result type alias for clima-mcp operations
pub type Result<T> = std::result::Result<T, ClimaError>;
