//! Error types for cloudbook-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a child process
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// The program is not installed or not on `PATH`
    #[error("program not found: {0}")]
    ProgramNotFound(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while waiting for the process
    #[error("I/O error: {0}")]
    IoError(String),

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}
