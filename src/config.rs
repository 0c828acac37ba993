//! Bridge configuration: which child to spawn and how long to wait on it.

use crate::error::ClimaError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Listen port for `serve` and `bridge` when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// MCP handshake timeout for the bridge child.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Deadline for a single relayed request.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// How the subprocess bridge launches and talks to its child.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Executable speaking MCP over stdio.
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the child, on top of the inherited one.
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub handshake_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

impl BridgeConfig {
    /// Child that runs an arbitrary command with default timeouts.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }

    /// Child that re-executes this binary with the `stdio` subcommand.
    pub fn for_current_exe() -> crate::Result<Self> {
        let exe = std::env::current_exe().map_err(|e| {
            ClimaError::InvalidConfig(format!("cannot locate current executable: {}", e))
        })?;
        Ok(Self::new(
            exe.to_string_lossy().into_owned(),
            vec!["stdio".to_string()],
        ))
    }

    /// Fail fast on settings that could never produce a working child.
    pub fn validate(&self) -> crate::Result<()> {
        if self.command.trim().is_empty() {
            return Err(ClimaError::InvalidConfig(
                "bridge 'command' must not be empty".to_string(),
            ));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ClimaError::InvalidConfig(
                "'handshake_timeout_secs' must be greater than 0".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ClimaError::InvalidConfig(
                "'call_timeout_secs' must be greater than 0".to_string(),
            ));
        }
        if let Some(cwd) = self.cwd.as_ref().filter(|dir| !dir.is_dir()) {
            return Err(ClimaError::InvalidConfig(format!(
                "'cwd' {} is not a directory",
                cwd.display()
            )));
        }
        Ok(())
    }
}
