//! Configuration types for targets and collection

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use cloudbook_inventory::ResourceQuerySpec;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::provision;

/// Role assumed in every target account unless overridden
pub const DEFAULT_ROLE_NAME: &str = "CloudbookInventoryRole";

/// Which accounts and regions to scan, and how to get into them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target account ids, in enumeration order
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Target regions, in enumeration order
    #[serde(default)]
    pub regions: Vec<String>,
    /// Name of the pre-provisioned cross-account role
    #[serde(default = "default_role_name")]
    pub role_name: String,
    /// External id required by the role's trust policy
    #[serde(default)]
    pub external_id: Option<String>,
    /// Provider partition used to build role ARNs
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Explicit role ARN per account, as produced by the provisioner
    #[serde(default)]
    pub role_arns: BTreeMap<String, String>,
    /// Skip role assumption and use the ambient credentials for every account
    #[serde(default)]
    pub use_ambient_credentials: bool,
    /// Region whose credential-exchange endpoint assumes roles (None = global)
    #[serde(default)]
    pub sts_region: Option<String>,
}

fn default_role_name() -> String {
    DEFAULT_ROLE_NAME.to_string()
}

fn default_partition() -> String {
    "aws".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            regions: Vec::new(),
            role_name: default_role_name(),
            external_id: None,
            partition: default_partition(),
            role_arns: BTreeMap::new(),
            use_ambient_credentials: false,
            sts_region: None,
        }
    }
}

impl TargetConfig {
    /// Role ARN to assume in `account`
    #[must_use]
    pub fn role_arn_for(&self, account: &str) -> String {
        self.role_arns
            .get(account)
            .cloned()
            .unwrap_or_else(|| provision::role_arn(&self.partition, account, &self.role_name))
    }

    /// Deduplicate accounts and regions, keeping first occurrences
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.accounts = dedup(self.accounts);
        self.regions = dedup(self.regions);
        self
    }

    /// Validate before any collection starts
    ///
    /// # Errors
    /// Returns `ConfigError` for an empty account or region list, a malformed
    /// account id, or an empty role name.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.accounts.is_empty() {
            return Err(CoreError::ConfigError(
                "no target accounts configured".to_string(),
            ));
        }
        if let Some(bad) = self.accounts.iter().find(|a| !is_account_id(a)) {
            return Err(CoreError::ConfigError(format!(
                "invalid account id `{bad}`: expected 12 digits"
            )));
        }
        if self.regions.is_empty() {
            return Err(CoreError::ConfigError(
                "no target regions configured".to_string(),
            ));
        }
        if !self.use_ambient_credentials && self.role_name.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "role name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How collection runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Maximum concurrent units of provider work
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-call timeout in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Whole-run timeout in seconds (0 disables it)
    #[serde(default)]
    pub run_timeout_secs: u64,
    /// Catalog keys to collect (empty = all)
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Additional resource kinds appended to the built-in catalog
    #[serde(default)]
    pub extra_kinds: Vec<ResourceQuerySpec>,
}

fn default_workers() -> usize {
    8
}

fn default_call_timeout_secs() -> u64 {
    30
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            call_timeout_secs: default_call_timeout_secs(),
            run_timeout_secs: 0,
            kinds: Vec::new(),
            extra_kinds: Vec::new(),
        }
    }
}

impl CollectionConfig {
    /// Per-call timeout
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    /// Whole-run timeout, if any
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    /// Validate
    ///
    /// # Errors
    /// Returns `ConfigError` when the worker count is zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.workers == 0 {
            return Err(CoreError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a newline-delimited account list
///
/// Blank lines and lines starting with `#` are ignored; surrounding whitespace
/// is trimmed and duplicates are dropped.
#[must_use]
pub fn parse_account_list(text: &str) -> Vec<String> {
    dedup(
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect(),
    )
}

/// Parse a comma-delimited region list
#[must_use]
pub fn parse_region_list(text: &str) -> Vec<String> {
    dedup(
        text.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn is_account_id(account: &str) -> bool {
    account.len() == 12 && account.bytes().all(|b| b.is_ascii_digit())
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
