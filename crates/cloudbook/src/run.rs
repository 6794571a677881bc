//! `cloudbook run`

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cloudbook_core::{Orchestrator, Report, ReportMetadata, RunOutcome};
use cloudbook_exec::LocalExecutor;
use cloudbook_inventory::{AwsCliProvider, Catalog, CloudProvider, ResourceQuerySpec};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::output;

/// Every account failed role assumption
pub const EXIT_ALL_ACCOUNTS_FAILED: u8 = 2;

/// `fail_on_partial` is set and some result set is not `Ok`
pub const EXIT_PARTIAL: u8 = 3;

/// Build the catalog from the built-in kinds, config extras and the selection
///
/// # Errors
/// Returns error for duplicate or invalid extra kinds and unknown selections
pub fn resolve_catalog(config: &Config) -> eyre::Result<Vec<ResourceQuerySpec>> {
    let catalog = Catalog::builtin()
        .extend(config.collection.extra_kinds.clone())?
        .select(&config.collection.kinds)?;
    Ok(catalog.into())
}

/// Collect, render and write the report
///
/// # Errors
/// Returns error for invalid configuration or when the report cannot be written
pub async fn execute(config: Config) -> eyre::Result<ExitCode> {
    let targets = config.resolve_targets()?;
    targets.validate()?;
    config.collection.validate()?;
    let specs = resolve_catalog(&config)?;

    let runner = Arc::new(LocalExecutor::new());
    let provider =
        AwsCliProvider::new(runner.clone()).with_timeout(config.collection.call_timeout());

    let scanned_by = match provider.caller_identity().await {
        Ok(caller) => Some(caller),
        Err(e) => {
            warn!(error = %e, "could not resolve the scanning identity");
            None
        }
    };

    let cancel = CancellationToken::new();
    let run_timeout = config.collection.run_timeout();
    let watcher = tokio::spawn(watch_for_cancel(cancel.clone(), run_timeout));

    let accounts = targets.accounts.clone();
    let regions = targets.regions.clone();
    let orchestrator = Orchestrator::new(Arc::new(provider), targets, &config.collection)
        .with_cancellation(cancel);
    let outcome = orchestrator.run(&accounts, &regions, &specs).await;
    watcher.abort();

    let generated_at = Utc::now();
    let code = exit_code(&outcome, config.output.fail_on_partial);
    let report = Report::aggregate(
        outcome.results,
        ReportMetadata::new(accounts, regions, generated_at).with_scanned_by(scanned_by),
        &specs,
    )
    .with_max_rows(config.output.max_rows());

    let counts = report.status_counts();
    let path = output::report_path(&config.output.directory, &config.output.prefix, generated_at);
    output::write_report(&path, &report.render())?;
    info!(
        path = %path.display(),
        populated = counts.populated,
        empty = counts.empty,
        unavailable = counts.unavailable,
        errors = counts.errors,
        "report written"
    );
    println!("{}", path.display());

    if config.output.convert {
        match output::convert(runner.as_ref(), &config.output.converter, &path).await {
            Ok(document) => {
                info!(path = %document.display(), "document converted");
                println!("{}", document.display());
            }
            Err(e) => warn!(error = %e, "document conversion failed, markdown kept"),
        }
    }

    Ok(ExitCode::from(code))
}

/// Exit status for a finished run
#[must_use]
pub fn exit_code(outcome: &RunOutcome, fail_on_partial: bool) -> u8 {
    if outcome.all_accounts_failed() {
        EXIT_ALL_ACCOUNTS_FAILED
    } else if fail_on_partial && outcome.has_failures() {
        EXIT_PARTIAL
    } else {
        0
    }
}

/// Cancel on Ctrl-C or when the run timeout elapses
async fn watch_for_cancel(cancel: CancellationToken, run_timeout: Option<Duration>) {
    let deadline = async {
        match run_timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            warn!("interrupted, finishing with a partial report");
        }
        () = deadline => warn!("run timeout reached, finishing with a partial report"),
        () = cancel.cancelled() => return,
    }
    cancel.cancel();
}
