use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use cloudbook_core::orchestrator::CANCELLED_REASON;
use cloudbook_core::*;
use cloudbook_inventory::{
    AssumeRoleRequest, CallerIdentity, Catalog, CloudProvider, CollectionStatus, Credentials,
    Identity, ProviderError, ProviderQuery, ResourceQuerySpec, SessionCredentials,
};

const ACCOUNT_A: &str = "111111111111";
const ACCOUNT_B: &str = "222222222222";

// In-memory provider
#[derive(Default)]
struct InMemoryProvider {
    denied_accounts: HashSet<String>,
    hanging_accounts: HashSet<String>,
    broken_accounts: HashSet<String>,
    /// operation -> (account, region) -> response
    responses: HashMap<String, HashMap<(String, String), Value>>,
    assumed: Mutex<Vec<AssumeRoleRequest>>,
    queried: Mutex<Vec<(String, String, Option<String>)>>,
    cancel_on_query: Option<CancellationToken>,
}

impl InMemoryProvider {
    fn deny(mut self, account: &str) -> Self {
        self.denied_accounts.insert(account.to_string());
        self
    }

    /// Role assumption never answers
    fn hang(mut self, account: &str) -> Self {
        self.hanging_accounts.insert(account.to_string());
        self
    }

    /// Every query fails the way a missing credential chain does
    fn break_queries(mut self, account: &str) -> Self {
        self.broken_accounts.insert(account.to_string());
        self
    }

    fn respond(mut self, operation: &str, account: &str, region: &str, value: Value) -> Self {
        self.responses
            .entry(operation.to_string())
            .or_default()
            .insert((account.to_string(), region.to_string()), value);
        self
    }
}

#[async_trait]
impl CloudProvider for InMemoryProvider {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        Ok(CallerIdentity {
            account_id: "999999999999".to_string(),
            arn: "arn:aws:iam::999999999999:user/auditor".to_string(),
            user_id: "AIDAEXAMPLE".to_string(),
        })
    }

    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, ProviderError> {
        self.assumed.lock().unwrap().push(request.clone());

        let hangs = self
            .hanging_accounts
            .iter()
            .any(|account| request.role_arn.contains(account.as_str()));
        if hangs {
            std::future::pending::<()>().await;
        }

        let denied = self
            .denied_accounts
            .iter()
            .any(|account| request.role_arn.contains(account.as_str()));
        if denied {
            return Err(ProviderError::AccessDenied(format!(
                "not authorized to perform sts:AssumeRole on {}",
                request.role_arn
            )));
        }

        Ok(Credentials::Session(SessionCredentials {
            access_key_id: format!("ASIA{}", request.session_name),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: None,
        }))
    }

    async fn query(
        &self,
        identity: &Identity,
        query: &ProviderQuery,
    ) -> Result<Value, ProviderError> {
        let key_id = match identity.credentials.as_ref() {
            Credentials::Ambient => None,
            Credentials::Session(session) => Some(session.access_key_id.clone()),
        };
        self.queried
            .lock()
            .unwrap()
            .push((identity.account_id.clone(), identity.region.clone(), key_id));

        if let Some(cancel) = &self.cancel_on_query {
            cancel.cancel();
        }

        if self.broken_accounts.contains(&identity.account_id) {
            return Err(ProviderError::CommandFailed(
                "Unable to locate credentials".to_string(),
            ));
        }

        Ok(self
            .responses
            .get(&query.operation)
            .and_then(|by_target| {
                by_target.get(&(identity.account_id.clone(), identity.region.clone()))
            })
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    fn provider_type(&self) -> &'static str {
        "in-memory"
    }
}

fn specs(keys: &[&str]) -> Vec<ResourceQuerySpec> {
    Catalog::builtin().select(keys).unwrap().into()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn orchestrator(provider: InMemoryProvider, targets: TargetConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(provider), targets, &CollectionConfig::default())
}

fn metadata(accounts: &[String], regions: &[String]) -> ReportMetadata {
    ReportMetadata::new(
        accounts.to_vec(),
        regions.to_vec(),
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
    )
}

fn vpc_response() -> Value {
    json!({"Vpcs": [{
        "VpcId": "vpc-1",
        "CidrBlock": "10.0.0.0/16",
        "State": "available",
        "IsDefault": false
    }]})
}

#[tokio::test]
async fn test_single_vpc_report() {
    let provider = InMemoryProvider::default().respond(
        "describe-vpcs",
        ACCOUNT_A,
        "us-east-1",
        vpc_response(),
    );
    let accounts = strings(&[ACCOUNT_A]);
    let regions = strings(&["us-east-1"]);
    let specs = specs(&["vpcs"]);

    let outcome = orchestrator(provider, TargetConfig::default())
        .run(&accounts, &regions, &specs)
        .await;

    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.accounts_failed().is_empty());
    assert!(!outcome.cancelled);

    let report = Report::aggregate(outcome.results, metadata(&accounts, &regions), &specs);
    let text = report.render();

    assert!(text.contains("## VPC Summary"));
    assert!(text.contains("| VpcId | Cidr | State | Default |"));
    assert!(text.contains("| vpc-1 | 10.0.0.0/16 | available | false |"));
}

#[tokio::test]
async fn test_denied_account_does_not_block_others() {
    let provider = InMemoryProvider::default()
        .deny(ACCOUNT_A)
        .respond("describe-vpcs", ACCOUNT_B, "us-east-1", vpc_response());
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "eu-west-1"]);
    let specs = specs(&["vpcs", "lambda_functions"]);

    let outcome = orchestrator(provider, TargetConfig::default())
        .run(&accounts, &regions, &specs)
        .await;

    assert_eq!(outcome.results.len(), specs.len() * accounts.len() * regions.len());
    assert_eq!(outcome.accounts_failed(), [ACCOUNT_A]);
    assert!(!outcome.all_accounts_failed());
    assert!(outcome.has_failures());

    for result in &outcome.results {
        match result.account_id.as_str() {
            ACCOUNT_A => {
                let CollectionStatus::Unavailable(reason) = &result.status else {
                    panic!("expected unavailable, got {:?}", result.status);
                };
                assert!(reason.contains(ACCOUNT_A));
            }
            _ => assert_eq!(result.status, CollectionStatus::Ok),
        }
    }

    let report = Report::aggregate(outcome.results, metadata(&accounts, &regions), &specs);
    let text = report.render();

    assert!(text.contains("> Access Denied or Service Unavailable:"));
    assert!(text.contains("| vpc-1 | 10.0.0.0/16 | available | false |"));
    assert_eq!(report.status_counts().unavailable, 4);
}

#[tokio::test]
async fn test_every_combination_is_reported() {
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "us-west-2", "eu-central-1"]);
    let specs: Vec<ResourceQuerySpec> = Catalog::builtin().into();

    let outcome = orchestrator(InMemoryProvider::default(), TargetConfig::default())
        .run(&accounts, &regions, &specs)
        .await;

    let expected = specs.len() * accounts.len() * regions.len();
    assert_eq!(outcome.results.len(), expected);

    let keys: HashSet<_> = outcome.results.iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), expected);

    let report = Report::aggregate(
        outcome.results.clone(),
        metadata(&accounts, &regions),
        &specs,
    );
    assert_eq!(report.entry_count(), expected);
    assert_eq!(report.sections.len(), specs.len());
}

#[tokio::test]
async fn test_report_is_independent_of_arrival_order() {
    let provider = InMemoryProvider::default()
        .respond("describe-vpcs", ACCOUNT_A, "us-east-1", vpc_response())
        .respond("describe-vpcs", ACCOUNT_B, "eu-west-1", vpc_response());
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "eu-west-1"]);
    let specs = specs(&["vpcs", "subnets"]);

    let outcome = orchestrator(provider, TargetConfig::default())
        .run(&accounts, &regions, &specs)
        .await;

    let forward = Report::aggregate(
        outcome.results.clone(),
        metadata(&accounts, &regions),
        &specs,
    );
    let mut reversed_results = outcome.results;
    reversed_results.reverse();
    let reversed = Report::aggregate(reversed_results, metadata(&accounts, &regions), &specs);

    assert_eq!(forward.render(), reversed.render());
}

#[tokio::test]
async fn test_role_requests_and_credential_scoping() {
    let provider = Arc::new(InMemoryProvider::default());
    let targets = TargetConfig {
        external_id: Some("shared-secret".to_string()),
        role_arns: [(ACCOUNT_B.to_string(), "arn:aws:iam::222222222222:role/Custom".to_string())]
            .into_iter()
            .collect(),
        ..TargetConfig::default()
    };
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "eu-west-1"]);

    Orchestrator::new(provider.clone(), targets, &CollectionConfig::default())
        .run(&accounts, &regions, &specs(&["vpcs"]))
        .await;

    let mut assumed = provider.assumed.lock().unwrap().clone();
    assumed.sort_by(|a, b| a.role_arn.cmp(&b.role_arn));
    assert_eq!(assumed.len(), 2, "role is assumed once per account");
    assert_eq!(
        assumed[0].role_arn,
        "arn:aws:iam::111111111111:role/CloudbookInventoryRole"
    );
    assert_eq!(assumed[0].session_name, "cloudbook-111111111111");
    assert_eq!(assumed[1].role_arn, "arn:aws:iam::222222222222:role/Custom");
    assert!(assumed.iter().all(|r| r.external_id.as_deref() == Some("shared-secret")));
    assert!(assumed.iter().all(|r| r.region.is_none()));

    for (account, _region, key_id) in provider.queried.lock().unwrap().iter() {
        assert_eq!(key_id.as_deref(), Some(format!("ASIAcloudbook-{account}").as_str()));
    }
}

#[tokio::test]
async fn test_ambient_credentials_skip_role_assumption() {
    let provider = Arc::new(InMemoryProvider::default().deny(ACCOUNT_A));
    let targets = TargetConfig {
        use_ambient_credentials: true,
        ..TargetConfig::default()
    };
    let accounts = strings(&[ACCOUNT_A]);
    let regions = strings(&["us-east-1"]);

    let outcome = Orchestrator::new(provider.clone(), targets, &CollectionConfig::default())
        .run(&accounts, &regions, &specs(&["vpcs"]))
        .await;

    assert!(provider.assumed.lock().unwrap().is_empty());
    assert!(outcome.accounts_failed().is_empty());
    assert_eq!(outcome.results[0].status, CollectionStatus::Ok);
    assert!(provider.queried.lock().unwrap().iter().all(|(_, _, key)| key.is_none()));
}

#[tokio::test]
async fn test_all_accounts_failed() {
    let provider = InMemoryProvider::default().deny(ACCOUNT_A).deny(ACCOUNT_B);
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1"]);

    let outcome = orchestrator(provider, TargetConfig::default())
        .run(&accounts, &regions, &specs(&["vpcs"]))
        .await;

    assert!(outcome.all_accounts_failed());
    assert_eq!(outcome.accounts_failed(), [ACCOUNT_A, ACCOUNT_B]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "eu-west-1"]);
    let specs = specs(&["vpcs", "subnets"]);

    let orchestrator = orchestrator(InMemoryProvider::default(), TargetConfig::default());
    orchestrator.cancellation().cancel();

    let outcome = orchestrator.run(&accounts, &regions, &specs).await;

    assert!(outcome.cancelled);
    assert!(outcome.accounts_failed().is_empty());
    assert_eq!(outcome.results.len(), 8);
    assert!(
        outcome
            .results
            .iter()
            .all(|r| r.status == CollectionStatus::Error(CANCELLED_REASON.to_string()))
    );
}

#[tokio::test]
async fn test_cancelled_mid_run_keeps_finished_work() {
    let cancel = CancellationToken::new();
    let provider = InMemoryProvider {
        cancel_on_query: Some(cancel.clone()),
        ..InMemoryProvider::default()
    };
    let targets = TargetConfig {
        use_ambient_credentials: true,
        ..TargetConfig::default()
    };
    let collection = CollectionConfig {
        workers: 1,
        ..CollectionConfig::default()
    };
    let accounts = strings(&[ACCOUNT_A]);
    let regions = strings(&["us-east-1", "eu-west-1"]);
    let specs = specs(&["vpcs", "subnets"]);

    let outcome = Orchestrator::new(Arc::new(provider), targets, &collection)
        .with_cancellation(cancel)
        .run(&accounts, &regions, &specs)
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.results.len(), 4);

    let ok = outcome.results.iter().filter(|r| r.status.is_ok()).count();
    let cancelled = outcome
        .results
        .iter()
        .filter(|r| r.status.reason() == Some(CANCELLED_REASON))
        .count();
    assert_eq!(ok, 2, "the region already running finishes");
    assert_eq!(cancelled, 2, "the waiting region is recorded, not dropped");
}

#[tokio::test]
async fn test_sts_region_is_configurable() {
    let provider = Arc::new(InMemoryProvider::default());
    let targets = TargetConfig {
        sts_region: Some("eu-central-1".to_string()),
        ..TargetConfig::default()
    };

    Orchestrator::new(provider.clone(), targets, &CollectionConfig::default())
        .run(&strings(&[ACCOUNT_A]), &strings(&["ap-east-1"]), &specs(&["vpcs"]))
        .await;

    let assumed = provider.assumed.lock().unwrap();
    assert_eq!(assumed[0].region.as_deref(), Some("eu-central-1"));
}

#[tokio::test]
async fn test_role_assumption_timeout_is_unavailable() {
    let provider = InMemoryProvider::default()
        .hang(ACCOUNT_A)
        .respond("describe-vpcs", ACCOUNT_B, "us-east-1", vpc_response());
    let collection = CollectionConfig {
        call_timeout_secs: 1,
        ..CollectionConfig::default()
    };
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);
    let regions = strings(&["us-east-1", "eu-west-1"]);
    let specs = specs(&["vpcs", "subnets"]);

    let started = Instant::now();
    let outcome = Orchestrator::new(Arc::new(provider), TargetConfig::default(), &collection)
        .run(&accounts, &regions, &specs)
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.results.len(), 8);
    assert_eq!(outcome.accounts_failed(), [ACCOUNT_A]);

    for result in &outcome.results {
        if result.account_id == ACCOUNT_A {
            let CollectionStatus::Unavailable(reason) = &result.status else {
                panic!("expected unavailable, got {:?}", result.status);
            };
            assert!(reason.contains("role assumption timed out"));
        } else {
            assert_eq!(result.status, CollectionStatus::Ok);
        }
    }

    let vpcs_b = outcome
        .results
        .iter()
        .find(|r| r.key() == ("vpcs", ACCOUNT_B, "us-east-1"))
        .unwrap();
    assert_eq!(vpcs_b.rows.len(), 1);
}

#[tokio::test]
async fn test_ambient_account_with_only_errors_counts_as_failed() {
    let provider = InMemoryProvider::default().break_queries(ACCOUNT_A);
    let targets = TargetConfig {
        use_ambient_credentials: true,
        ..TargetConfig::default()
    };
    let accounts = strings(&[ACCOUNT_A]);

    let outcome = orchestrator(provider, targets)
        .run(&accounts, &strings(&["us-east-1"]), &specs(&["vpcs"]))
        .await;

    assert_eq!(outcome.accounts_failed(), [ACCOUNT_A]);
    assert!(outcome.all_accounts_failed());
}

#[tokio::test]
async fn test_every_query_failing_counts_as_failed() {
    let provider = InMemoryProvider::default()
        .break_queries(ACCOUNT_A)
        .break_queries(ACCOUNT_B);
    let accounts = strings(&[ACCOUNT_A, ACCOUNT_B]);

    let outcome = orchestrator(provider, TargetConfig::default())
        .run(&accounts, &strings(&["us-east-1"]), &specs(&["vpcs", "subnets"]))
        .await;

    assert!(outcome.all_accounts_failed());
}
