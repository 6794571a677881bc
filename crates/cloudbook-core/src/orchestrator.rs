//! Fan-out orchestrator
//!
//! One task per account assumes the account's role, then one unit per region
//! runs the collector. A semaphore bounds the provider work in flight; every
//! unit reports through a channel that is drained before the outcome is built.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cloudbook_inventory::{
    AssumeRoleRequest, CloudProvider, CollectionResult, Collector, Credentials, Identity,
    ResourceQuerySpec,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::{CollectionConfig, TargetConfig};
use crate::error::CoreError;

/// Reason recorded for combinations never attempted because of cancellation
pub const CANCELLED_REASON: &str = "not collected: run cancelled";

/// Reason recorded for combinations lost to a crashed task
pub const ABORTED_REASON: &str = "collection task aborted";

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One result per (kind, account, region), in no particular order
    pub results: Vec<CollectionResult>,
    /// Accounts attempted, in enumeration order
    pub accounts: Vec<String>,
    /// Whether the run was cancelled before finishing
    pub cancelled: bool,
}

impl RunOutcome {
    /// Accounts that were attempted and produced no `Ok` result, in
    /// enumeration order
    ///
    /// Combinations skipped by cancellation do not count as attempts.
    #[must_use]
    pub fn accounts_failed(&self) -> Vec<&str> {
        self.accounts
            .iter()
            .map(String::as_str)
            .filter(|account| self.account_failed(account))
            .collect()
    }

    /// Every account failed
    #[must_use]
    pub fn all_accounts_failed(&self) -> bool {
        !self.accounts.is_empty() && self.accounts_failed().len() == self.accounts.len()
    }

    fn account_failed(&self, account: &str) -> bool {
        let mut attempted = false;
        for result in self.results.iter().filter(|r| r.account_id == account) {
            if result.status.is_ok() {
                return false;
            }
            attempted |= result.status.reason() != Some(CANCELLED_REASON);
        }
        attempted
    }

    /// Some result set is not `Ok`
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.status.is_ok())
    }
}

/// Fleet-wide collection driver
pub struct Orchestrator {
    /// Provider shared by every worker
    provider: Arc<dyn CloudProvider>,
    /// Role naming and credential policy
    targets: TargetConfig,
    /// Maximum concurrent units
    workers: usize,
    /// Per-call timeout
    call_timeout: Duration,
    /// Run-level cancellation
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        targets: TargetConfig,
        collection: &CollectionConfig,
    ) -> Self {
        Self {
            provider,
            targets,
            workers: collection.workers.max(1),
            call_timeout: collection.call_timeout(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this orchestrator's runs
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Collect every spec for every (account, region) pair
    ///
    /// The returned results cover `specs × accounts × regions` exactly; failures
    /// and skipped work appear as `Unavailable` or `Error` results.
    #[instrument(
        skip_all,
        fields(accounts = accounts.len(), regions = regions.len(), kinds = specs.len())
    )]
    pub async fn run(
        &self,
        accounts: &[String],
        regions: &[String],
        specs: &[ResourceQuerySpec],
    ) -> RunOutcome {
        info!(
            workers = self.workers,
            provider = self.provider.provider_type(),
            "starting collection"
        );

        let specs: Arc<[ResourceQuerySpec]> = specs.into();
        let regions: Arc<[String]> = regions.into();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let collector =
            Arc::new(Collector::new(Arc::clone(&self.provider)).with_timeout(self.call_timeout));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut tasks = JoinSet::new();
        for account in accounts {
            let pass = AccountPass {
                account: account.clone(),
                regions: Arc::clone(&regions),
                specs: Arc::clone(&specs),
                request: self.assume_role_request(account),
                provider: Arc::clone(&self.provider),
                collector: Arc::clone(&collector),
                semaphore: Arc::clone(&semaphore),
                cancel: self.cancel.clone(),
                call_timeout: self.call_timeout,
                tx: tx.clone(),
            };
            tasks.spawn(pass.run());
        }
        drop(tx);

        let mut results = Vec::with_capacity(accounts.len() * regions.len() * specs.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "account task aborted");
            }
        }

        let filled = fill_missing(&mut results, accounts, &regions, &specs, ABORTED_REASON);
        if filled > 0 {
            warn!(filled, "recorded results lost to aborted tasks");
        }

        let outcome = RunOutcome {
            results,
            accounts: accounts.to_vec(),
            cancelled: self.cancel.is_cancelled(),
        };

        info!(
            results = outcome.results.len(),
            accounts_failed = outcome.accounts_failed().len(),
            cancelled = outcome.cancelled,
            "collection finished"
        );

        outcome
    }

    /// Role assumption request for `account`, or `None` in ambient mode
    fn assume_role_request(&self, account: &str) -> Option<AssumeRoleRequest> {
        if self.targets.use_ambient_credentials {
            return None;
        }
        Some(
            AssumeRoleRequest::new(
                self.targets.role_arn_for(account),
                format!("cloudbook-{account}"),
            )
            .with_external_id(self.targets.external_id.clone())
            .with_region(self.targets.sts_region.clone()),
        )
    }
}

/// Everything one account's task needs
struct AccountPass {
    account: String,
    regions: Arc<[String]>,
    specs: Arc<[ResourceQuerySpec]>,
    request: Option<AssumeRoleRequest>,
    provider: Arc<dyn CloudProvider>,
    collector: Arc<Collector>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    call_timeout: Duration,
    tx: mpsc::UnboundedSender<CollectionResult>,
}

impl AccountPass {
    #[instrument(skip_all, fields(account = %self.account))]
    async fn run(self) {
        let credentials = match self.credentials().await {
            Ok(Some(credentials)) => Arc::new(credentials),
            Ok(None) => {
                self.record_all(&self.regions, |spec, region| {
                    CollectionResult::error(spec, &self.account, region, CANCELLED_REASON)
                });
                return;
            }
            Err(e) => {
                warn!(error = %e, "account skipped");
                let reason = e.to_string();
                self.record_all(&self.regions, |spec, region| {
                    CollectionResult::unavailable(spec, &self.account, region, reason.clone())
                });
                return;
            }
        };

        let identity = Identity::new(self.account.clone(), String::new(), credentials);
        let mut units = JoinSet::new();

        for region in self.regions.iter() {
            let identity = identity.in_region(region.clone());
            let specs = Arc::clone(&self.specs);
            let collector = Arc::clone(&self.collector);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = self.cancel.clone();
            let tx = self.tx.clone();

            units.spawn(async move {
                let Some(_permit) = acquire(&semaphore, &cancel).await else {
                    for spec in specs.iter() {
                        let _ = tx.send(CollectionResult::error(
                            spec,
                            &identity.account_id,
                            &identity.region,
                            CANCELLED_REASON,
                        ));
                    }
                    return;
                };

                for result in collector.collect(&identity, &specs).await {
                    let _ = tx.send(result);
                }
            });
        }

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "region unit aborted");
            }
        }
    }

    /// Credentials for this account; `Ok(None)` when cancelled first
    async fn credentials(&self) -> Result<Option<Credentials>, CoreError> {
        let Some(request) = &self.request else {
            return Ok(Some(Credentials::Ambient));
        };

        let Some(_permit) = acquire(&self.semaphore, &self.cancel).await else {
            return Ok(None);
        };

        let access_error = |reason: String| CoreError::AccessError {
            account: self.account.clone(),
            reason,
        };

        match timeout(self.call_timeout, self.provider.assume_role(request)).await {
            Ok(Ok(credentials)) => {
                info!(role = %request.role_arn, "role assumed");
                Ok(Some(credentials))
            }
            Ok(Err(e)) => Err(access_error(e.to_string())),
            Err(_) => Err(access_error(format!(
                "role assumption timed out after {:?}",
                self.call_timeout
            ))),
        }
    }

    /// Send one result per (spec, region)
    fn record_all<F>(&self, regions: &[String], make: F)
    where
        F: Fn(&ResourceQuerySpec, &str) -> CollectionResult,
    {
        for region in regions {
            for spec in self.specs.iter() {
                let _ = self.tx.send(make(spec, region));
            }
        }
    }
}

/// Wait for a worker slot unless the run is cancelled first
async fn acquire(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Option<OwnedSemaphorePermit> {
    if cancel.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
    }
}

/// Add an error result for every expected triple that has none
fn fill_missing(
    results: &mut Vec<CollectionResult>,
    accounts: &[String],
    regions: &[String],
    specs: &[ResourceQuerySpec],
    reason: &str,
) -> usize {
    let present: HashSet<(String, String, String)> = results
        .iter()
        .map(|r| (r.kind.clone(), r.account_id.clone(), r.region.clone()))
        .collect();

    let mut filled = 0;
    for account in accounts {
        for region in regions {
            for spec in specs {
                let key = (spec.key.clone(), account.clone(), region.clone());
                if !present.contains(&key) {
                    results.push(CollectionResult::error(spec, account, region, reason));
                    filled += 1;
                }
            }
        }
    }
    filled
}
