//! Cloud provider abstraction

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ProviderQuery;
use crate::error::ProviderError;
use crate::types::{Credentials, Identity};

/// Principal the process itself runs as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Account of the caller
    pub account_id: String,
    /// ARN of the caller
    pub arn: String,
    /// Provider-specific user id
    pub user_id: String,
}

/// Request to exchange the ambient identity for credentials in another account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// Role to assume
    pub role_arn: String,
    /// Session name recorded in the target account's audit trail
    pub session_name: String,
    /// Shared secret required by the role's trust policy, if any
    pub external_id: Option<String>,
    /// Requested session length
    pub duration: Duration,
    /// Region whose credential-exchange endpoint to use
    pub region: Option<String>,
}

impl AssumeRoleRequest {
    /// Default session length
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(3600);

    /// Create a request for `role_arn`
    pub fn new(role_arn: impl Into<String>, session_name: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            session_name: session_name.into(),
            external_id: None,
            duration: Self::DEFAULT_DURATION,
            region: None,
        }
    }

    /// Set the external id
    #[must_use]
    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }

    /// Set the credential-exchange region
    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }
}

/// Read-only access to a cloud provider
///
/// Implementations must be safe to call concurrently from many workers; all
/// per-call state travels in the arguments.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Identify the ambient principal
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError>;

    /// Assume a role using the ambient principal
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, ProviderError>;

    /// Run one inventory query scoped to the identity's region
    async fn query(&self, identity: &Identity, query: &ProviderQuery)
    -> Result<Value, ProviderError>;

    /// Short name used in logs
    fn provider_type(&self) -> &'static str;
}
