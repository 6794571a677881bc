//! cloudbook-core: fan-out orchestration and report aggregation
//!
//! Drives the collector across every configured (account, region) pair,
//! aggregates the results into a deterministic markdown report and produces
//! the policy documents the cross-account role needs.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod provision;
pub mod report;

pub use config::{
    CollectionConfig, DEFAULT_ROLE_NAME, TargetConfig, parse_account_list, parse_region_list,
};
pub use error::CoreError;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use report::{Report, ReportMetadata, Section, StatusCounts};
