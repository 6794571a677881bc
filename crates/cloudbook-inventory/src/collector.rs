//! Per-account-region collector

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::awscli::DEFAULT_TIMEOUT;
use crate::catalog::ResourceQuerySpec;
use crate::provider::CloudProvider;
use crate::types::{CollectionResult, Identity};

/// Inventory collector
///
/// Runs every catalog entry against one identity. A failing entry never stops
/// the others: each produces its own `CollectionResult`.
pub struct Collector {
    provider: Arc<dyn CloudProvider>,
    call_timeout: Duration,
}

impl Collector {
    /// Create a new collector
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            call_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Collect every spec for one identity, in spec order
    #[instrument(skip_all, fields(account = %identity.account_id, region = %identity.region))]
    pub async fn collect(
        &self,
        identity: &Identity,
        specs: &[ResourceQuerySpec],
    ) -> Vec<CollectionResult> {
        let mut results = Vec::with_capacity(specs.len());

        for spec in specs {
            results.push(self.collect_one(identity, spec).await);
        }

        let failed = results.iter().filter(|r| !r.status.is_ok()).count();
        info!(kinds = results.len(), failed, "region collected");

        results
    }

    /// Collect a single spec
    pub async fn collect_one(
        &self,
        identity: &Identity,
        spec: &ResourceQuerySpec,
    ) -> CollectionResult {
        let account = identity.account_id.as_str();
        let region = identity.region.as_str();

        let call = self.provider.query(identity, &spec.query);
        let response = match timeout(self.call_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_unavailable() => {
                debug!(kind = %spec.key, error = %e, "resource kind unavailable");
                return CollectionResult::unavailable(spec, account, region, e.to_string());
            }
            Ok(Err(e)) => {
                warn!(kind = %spec.key, error = %e, "resource query failed");
                return CollectionResult::error(spec, account, region, e.to_string());
            }
            Err(_) => {
                warn!(kind = %spec.key, timeout = ?self.call_timeout, "resource query timed out");
                return CollectionResult::error(
                    spec,
                    account,
                    region,
                    format!("call timed out after {:?}", self.call_timeout),
                );
            }
        };

        match spec.projection.apply(&response) {
            Ok(rows) => {
                debug!(kind = %spec.key, rows = rows.len(), "resource kind collected");
                CollectionResult::ok(spec, account, region, rows)
            }
            Err(e) => {
                warn!(kind = %spec.key, error = %e, "could not project response");
                CollectionResult::error(spec, account, region, e.to_string())
            }
        }
    }
}
