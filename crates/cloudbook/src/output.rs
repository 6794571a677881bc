//! Report file naming, writing and document conversion

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cloudbook_exec::{CommandRunner, Invocation};
use eyre::{WrapErr, eyre};

/// Upper bound for one converter run
pub const CONVERT_TIMEOUT: Duration = Duration::from_secs(120);

/// `<directory>/<prefix>_<YYYYmmdd_HHMMSS>.md`
#[must_use]
pub fn report_path(directory: &Path, prefix: &str, generated_at: DateTime<Utc>) -> PathBuf {
    directory.join(format!("{prefix}_{}.md", generated_at.format("%Y%m%d_%H%M%S")))
}

/// Write the rendered report, creating the directory if needed
///
/// # Errors
/// Returns error if the directory or the file cannot be written
pub fn write_report(path: &Path, markdown: &str) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, markdown)
        .wrap_err_with(|| format!("failed to write report {}", path.display()))
}

/// Convert `markdown` to a `.docx` next to it
///
/// # Errors
/// Returns error if the converter cannot be started, times out, or exits
/// non-zero
pub async fn convert(
    runner: &dyn CommandRunner,
    converter: &str,
    markdown: &Path,
) -> eyre::Result<PathBuf> {
    let document = markdown.with_extension("docx");
    let invocation = Invocation::new(converter)
        .arg(markdown.to_string_lossy())
        .arg("-o")
        .arg(document.to_string_lossy());

    let result = runner
        .run_with_timeout(&invocation, CONVERT_TIMEOUT)
        .await
        .wrap_err_with(|| format!("failed to run {converter}"))?;

    if !result.success() {
        return Err(eyre!(
            "{converter} exited with status {}: {}",
            result.status,
            result.stderr.trim()
        ));
    }

    Ok(document)
}
