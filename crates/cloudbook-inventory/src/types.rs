//! Inventory type definitions

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ResourceQuerySpec;

// ============================================================================
// Credentials & Identity
// ============================================================================

/// Temporary session credentials obtained by assuming a role
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token
    pub session_token: String,
    /// When the provider will stop honouring these credentials
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Capability used to talk to the provider on behalf of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Whatever the provider's default credential chain resolves to
    Ambient,
    /// Explicit session credentials
    Session(SessionCredentials),
}

/// Credential and scope bundle for querying one account/region
#[derive(Debug, Clone)]
pub struct Identity {
    /// Target account id
    pub account_id: String,
    /// Target region
    pub region: String,
    /// Credentials, shared only between regions of the same account
    pub credentials: Arc<Credentials>,
}

impl Identity {
    /// Create a new identity
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            credentials,
        }
    }

    /// Same account and credentials, different region
    #[must_use]
    pub fn in_region(&self, region: impl Into<String>) -> Self {
        Self {
            account_id: self.account_id.clone(),
            region: region.into(),
            credentials: Arc::clone(&self.credentials),
        }
    }
}

// ============================================================================
// Collection results
// ============================================================================

/// One projected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Column header
    pub column: String,
    /// Raw JSON value (null when the field was absent)
    pub value: Value,
}

/// One table row, cells in the declared column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cells in column order
    pub cells: Vec<Cell>,
}

impl Row {
    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(column, value)| Cell {
                    column: column.into(),
                    value,
                })
                .collect(),
        }
    }

    /// Look up a value by column header
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|c| c.column == column)
            .map(|c| &c.value)
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Outcome of one resource query against one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Query succeeded (rows may be empty)
    Ok,
    /// Denied, or the service is not available to this identity
    Unavailable(String),
    /// Anything else: timeouts, malformed responses, transport failures
    Error(String),
}

impl CollectionStatus {
    /// Check if status is `Ok`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, CollectionStatus::Ok)
    }

    /// Reason for a non-ok status
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            CollectionStatus::Ok => None,
            CollectionStatus::Unavailable(r) | CollectionStatus::Error(r) => Some(r),
        }
    }
}

/// Rows (or the reason for their absence) for one (kind, account, region)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Catalog key of the resource kind
    pub kind: String,
    /// Account the rows belong to
    pub account_id: String,
    /// Region the rows belong to
    pub region: String,
    /// Declared column headers
    pub columns: Vec<String>,
    /// Projected rows; always empty unless status is `Ok`
    pub rows: Vec<Row>,
    /// Outcome
    pub status: CollectionStatus,
}

impl CollectionResult {
    fn new(
        spec: &ResourceQuerySpec,
        account_id: &str,
        region: &str,
        rows: Vec<Row>,
        status: CollectionStatus,
    ) -> Self {
        Self {
            kind: spec.key.clone(),
            account_id: account_id.to_string(),
            region: region.to_string(),
            columns: spec.projection.headers(),
            rows,
            status,
        }
    }

    /// Successful result
    #[must_use]
    pub fn ok(spec: &ResourceQuerySpec, account_id: &str, region: &str, rows: Vec<Row>) -> Self {
        Self::new(spec, account_id, region, rows, CollectionStatus::Ok)
    }

    /// Unavailable result with its reason
    #[must_use]
    pub fn unavailable(
        spec: &ResourceQuerySpec,
        account_id: &str,
        region: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            spec,
            account_id,
            region,
            Vec::new(),
            CollectionStatus::Unavailable(reason.into()),
        )
    }

    /// Error result with its reason
    #[must_use]
    pub fn error(
        spec: &ResourceQuerySpec,
        account_id: &str,
        region: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            spec,
            account_id,
            region,
            Vec::new(),
            CollectionStatus::Error(reason.into()),
        )
    }

    /// The (kind, account, region) triple this result belongs to
    #[must_use]
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.kind, &self.account_id, &self.region)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_session_credentials_debug_redacts_secrets() {
        let creds = SessionCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "topsecret".to_string(),
            session_token: "tokenvalue".to_string(),
            expiration: None,
        };

        let debug = format!("{creds:?}");
        assert!(debug.contains("ASIAEXAMPLE"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("tokenvalue"));
    }

    #[test]
    fn test_identity_in_region_shares_credentials() {
        let identity = Identity::new("111111111111", "us-east-1", Arc::new(Credentials::Ambient));
        let other = identity.in_region("eu-west-1");

        assert_eq!(other.account_id, "111111111111");
        assert_eq!(other.region, "eu-west-1");
        assert!(Arc::ptr_eq(&identity.credentials, &other.credentials));
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::from_pairs([("VpcId", json!("vpc-1")), ("Default", json!(false))]);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Default"), Some(&json!(false)));
        assert_eq!(row.get("Missing"), None);
    }

    #[test]
    fn test_status_serialization() {
        let status = CollectionStatus::Unavailable("denied".to_string());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, json!({"status": "unavailable", "reason": "denied"}));

        let ok = serde_json::to_value(CollectionStatus::Ok).unwrap();
        assert_eq!(ok, json!({"status": "ok"}));
    }
}
