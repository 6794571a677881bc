//! Command runner trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::invocation::Invocation;
use crate::result::CommandResult;

/// Runs a fully described invocation and captures its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion
    async fn run(&self, invocation: &Invocation) -> Result<CommandResult, ExecError>;

    /// Run, giving up after `timeout`
    async fn run_with_timeout(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Short name used in logs
    fn runner_type(&self) -> &'static str;
}
