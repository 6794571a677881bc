//! Error types for cloudbook-inventory

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a cloud provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The caller is not allowed to perform the call
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The service is not enabled, not subscribed or not offered in the region
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The call did not finish in time
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Network or process level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something that is not the expected JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider tool is not installed
    #[error("provider tool not found: {0}")]
    ToolNotFound(String),

    /// Any other provider-side failure
    #[error("provider call failed: {0}")]
    CommandFailed(String),
}

const ACCESS_MARKERS: &[&str] = &[
    "AccessDenied",
    "UnauthorizedOperation",
    "is not authorized",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "ExpiredToken",
    "AuthorizationError",
];

const TRANSPORT_MARKERS: &[&str] = &[
    "Could not connect to the endpoint URL",
    "Connect timeout on endpoint URL",
    "Read timeout on endpoint URL",
    "Connection was closed before we received a valid response",
    "SSL validation failed",
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "OptInRequired",
    "SubscriptionRequiredException",
    "not supported in this region",
    "AWSOrganizationsNotInUseException",
    "Invalid choice",
    "Unknown service",
];

impl ProviderError {
    /// Classify a failed provider call from its error output
    #[must_use]
    pub fn classify(stderr: &str) -> Self {
        let message = first_line(stderr);

        if ACCESS_MARKERS.iter().any(|m| stderr.contains(m)) {
            ProviderError::AccessDenied(message)
        } else if TRANSPORT_MARKERS.iter().any(|m| stderr.contains(m)) {
            ProviderError::Transport(message)
        } else if UNAVAILABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
            ProviderError::ServiceUnavailable(message)
        } else {
            ProviderError::CommandFailed(message)
        }
    }

    /// Denied or missing service; reported as unavailable rather than an error
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ProviderError::AccessDenied(_) | ProviderError::ServiceUnavailable(_)
        )
    }
}

/// First non-empty line of a multi-line message
fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output")
        .to_string()
}

/// Errors that can occur while defining or applying the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Response shape does not match the projection
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A requested resource kind is not in the catalog
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// Two catalog entries share a key
    #[error("duplicate resource kind: {0}")]
    DuplicateKind(String),

    /// A catalog entry is incomplete
    #[error("invalid resource kind `{key}`: {reason}")]
    InvalidSpec {
        /// Key of the offending entry
        key: String,
        /// What is wrong with it
        reason: String,
    },
}
