//! Local command execution using `tokio::process`

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::invocation::Invocation;
use crate::result::CommandResult;
use crate::traits::CommandRunner;

/// Local command executor
///
/// Spawns the program directly (no shell), so arguments are never re-parsed.
#[derive(Debug, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Internal method to execute an invocation
    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(command = %invocation, "executing local command");

        let child = Command::new(invocation.program())
            .args(invocation.arguments())
            .envs(invocation.environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExecError::ProgramNotFound(invocation.program().to_string()),
                _ => ExecError::SpawnError(e.to_string()),
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            command = %invocation,
            status = status,
            duration = ?duration,
            "command completed"
        );

        if !output.status.success() {
            debug!(
                command = %invocation,
                status = status,
                stderr = %stderr.trim(),
                "command failed"
            );
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalExecutor {
    #[instrument(skip(self), level = "debug", fields(command = %invocation))]
    async fn run(&self, invocation: &Invocation) -> Result<CommandResult, ExecError> {
        self.execute(invocation).await
    }

    #[instrument(skip(self), level = "debug", fields(command = %invocation))]
    async fn run_with_timeout(
        &self,
        invocation: &Invocation,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(timeout_duration, self.execute(invocation)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    command = %invocation,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn runner_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&Invocation::new("echo").arg("hello"))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&Invocation::new("sh").args(["-c", "exit 42"]))
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 42);
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(
                &Invocation::new("sh")
                    .args(["-c", "echo $CLOUDBOOK_TEST_VALUE"])
                    .env("CLOUDBOOK_TEST_VALUE", "scoped"),
            )
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), "scoped");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_expanded() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&Invocation::new("echo").arg("$HOME; exit 3"))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "$HOME; exit 3");
    }

    #[tokio::test]
    async fn test_program_not_found() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&Invocation::new("cloudbook-definitely-not-installed"))
            .await;

        assert!(matches!(result, Err(ExecError::ProgramNotFound(_))));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let executor = LocalExecutor::new();
        let result = executor
            .run_with_timeout(
                &Invocation::new("sleep").arg("5"),
                Duration::from_millis(100),
            )
            .await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }
}
