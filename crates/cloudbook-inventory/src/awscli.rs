//! AWS CLI backed provider
//!
//! Every call spawns `aws ... --output json`. Session credentials travel in the
//! child's environment only, so concurrent workers for different accounts never
//! see each other's credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudbook_exec::{CommandRunner, ExecError, Invocation};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::catalog::ProviderQuery;
use crate::error::ProviderError;
use crate::provider::{AssumeRoleRequest, CallerIdentity, CloudProvider};
use crate::types::{Credentials, Identity, SessionCredentials};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider that shells out to the `aws` command-line tool
pub struct AwsCliProvider {
    /// Process runner
    runner: Arc<dyn CommandRunner>,
    /// Program name or path
    program: String,
    /// Per-call timeout
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    credentials: RawCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityResponse {
    user_id: String,
    account: String,
    arn: String,
}

impl AwsCliProvider {
    /// Create a provider using `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "aws".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different program (a wrapper script, an absolute path)
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base invocation carrying the given credentials
    fn invocation(&self, credentials: &Credentials) -> Invocation {
        let invocation = Invocation::new(&self.program).env("AWS_PAGER", "");

        match credentials {
            Credentials::Ambient => invocation,
            Credentials::Session(session) => invocation
                .env("AWS_ACCESS_KEY_ID", &session.access_key_id)
                .env("AWS_SECRET_ACCESS_KEY", &session.secret_access_key)
                .env("AWS_SESSION_TOKEN", &session.session_token),
        }
    }

    /// Run and parse the JSON on stdout
    async fn invoke(&self, invocation: Invocation) -> Result<Value, ProviderError> {
        let invocation = invocation.args(["--output", "json"]);
        debug!(
            runner = self.runner.runner_type(),
            command = %invocation,
            "invoking provider tool"
        );

        let result = self
            .runner
            .run_with_timeout(&invocation, self.timeout)
            .await
            .map_err(|e| match e {
                ExecError::Timeout { timeout } => ProviderError::Timeout(timeout),
                ExecError::ProgramNotFound(program) => ProviderError::ToolNotFound(program),
                other => ProviderError::Transport(other.to_string()),
            })?;

        if !result.success() {
            return Err(ProviderError::classify(&result.stderr));
        }

        let stdout = result.stdout.trim();
        if stdout.is_empty() {
            debug!(command = %invocation, "empty response");
            return Ok(Value::Null);
        }

        serde_json::from_str(stdout).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl CloudProvider for AwsCliProvider {
    #[instrument(skip(self))]
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        let invocation = self
            .invocation(&Credentials::Ambient)
            .args(["sts", "get-caller-identity"]);

        let raw = self.invoke(invocation).await?;
        let response: CallerIdentityResponse = serde_json::from_value(raw)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(CallerIdentity {
            account_id: response.account,
            arn: response.arn,
            user_id: response.user_id,
        })
    }

    #[instrument(skip(self, request), fields(role = %request.role_arn))]
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, ProviderError> {
        let mut invocation = self
            .invocation(&Credentials::Ambient)
            .args(["sts", "assume-role", "--role-arn"])
            .arg(&request.role_arn)
            .arg("--role-session-name")
            .arg(&request.session_name)
            .arg("--duration-seconds")
            .arg(request.duration.as_secs().to_string());

        if let Some(external_id) = &request.external_id {
            invocation = invocation.arg("--external-id").arg(external_id);
        }
        if let Some(region) = &request.region {
            invocation = invocation.arg("--region").arg(region);
        }

        let response: AssumeRoleResponse = serde_json::from_value(self.invoke(invocation).await?)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let raw = response.credentials;

        Ok(Credentials::Session(SessionCredentials {
            access_key_id: raw.access_key_id,
            secret_access_key: raw.secret_access_key,
            session_token: raw.session_token,
            expiration: raw
                .expiration
                .and_then(|e| DateTime::parse_from_rfc3339(&e).ok())
                .map(|e| e.with_timezone(&Utc)),
        }))
    }

    #[instrument(
        skip(self, identity, query),
        fields(
            account = %identity.account_id,
            region = %identity.region,
            operation = %query.operation
        )
    )]
    async fn query(
        &self,
        identity: &Identity,
        query: &ProviderQuery,
    ) -> Result<Value, ProviderError> {
        let invocation = self
            .invocation(&identity.credentials)
            .arg(&query.service)
            .arg(&query.operation)
            .args(query.args.iter().cloned())
            .arg("--region")
            .arg(&identity.region);

        self.invoke(invocation).await
    }

    fn provider_type(&self) -> &'static str {
        "aws-cli"
    }
}
