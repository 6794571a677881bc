//! Report aggregation and markdown rendering
//!
//! Sections follow catalog order; inside a section, entries are sorted by
//! (account, region). Rendering the same results with the same metadata always
//! produces the same bytes, whatever order the results arrived in.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use cloudbook_inventory::{
    CallerIdentity, CollectionResult, CollectionStatus, ResourceQuerySpec, Row,
};
use serde::Serialize;
use serde_json::Value;

/// Marker for an `Ok` result without rows
pub const NO_RESOURCES: &str = "_No resources found._";

/// Prefix of the marker for `Unavailable` results
pub const UNAVAILABLE_PREFIX: &str = "Access Denied or Service Unavailable";

/// Front matter inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
    /// Document title
    pub title: String,
    /// Accounts scanned, in enumeration order
    pub accounts: Vec<String>,
    /// Regions scanned, in enumeration order
    pub regions: Vec<String>,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Principal that ran the scan, when it could be resolved
    pub scanned_by: Option<CallerIdentity>,
}

impl ReportMetadata {
    /// Default document title
    pub const DEFAULT_TITLE: &'static str = "Cloud Inventory Report";

    /// Create metadata with the default title
    #[must_use]
    pub fn new(accounts: Vec<String>, regions: Vec<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            title: Self::DEFAULT_TITLE.to_string(),
            accounts,
            regions,
            generated_at,
            scanned_by: None,
        }
    }

    /// Record the principal that ran the scan
    #[must_use]
    pub fn with_scanned_by(mut self, caller: Option<CallerIdentity>) -> Self {
        self.scanned_by = caller;
        self
    }
}

/// All results for one resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Catalog key
    pub key: String,
    /// Section title
    pub title: String,
    /// One-line description
    pub description: String,
    /// Results sorted by (account, region)
    pub entries: Vec<CollectionResult>,
}

impl Section {
    /// Rows found across every successful entry
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.is_ok())
            .map(|e| e.rows.len())
            .sum()
    }
}

/// Result-set totals by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// `Ok` with rows
    pub populated: usize,
    /// `Ok` without rows
    pub empty: usize,
    /// `Unavailable`
    pub unavailable: usize,
    /// `Error`
    pub errors: usize,
}

impl StatusCounts {
    /// Total result sets
    #[must_use]
    pub fn total(&self) -> usize {
        self.populated + self.empty + self.unavailable + self.errors
    }
}

/// Aggregated, render-ready report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Front matter
    pub metadata: ReportMetadata,
    /// Sections in catalog order
    pub sections: Vec<Section>,
    /// Maximum rows per table (None = unlimited)
    pub max_rows: Option<usize>,
}

impl Report {
    /// Group results into sections
    ///
    /// Every result ends up in exactly one section. Results whose kind is not
    /// among `specs` get their own sections after the catalog ones, ordered by
    /// key, so nothing is dropped.
    #[must_use]
    pub fn aggregate(
        results: Vec<CollectionResult>,
        metadata: ReportMetadata,
        specs: &[ResourceQuerySpec],
    ) -> Self {
        let mut by_kind: BTreeMap<String, Vec<CollectionResult>> = BTreeMap::new();
        for result in results {
            by_kind.entry(result.kind.clone()).or_default().push(result);
        }

        let mut sections = Vec::with_capacity(specs.len());
        for spec in specs {
            let entries = by_kind.remove(&spec.key).unwrap_or_default();
            sections.push(Section {
                key: spec.key.clone(),
                title: spec.title.clone(),
                description: spec.description.clone(),
                entries: sorted(entries),
            });
        }
        for (key, entries) in by_kind {
            sections.push(Section {
                title: key.clone(),
                key,
                description: String::new(),
                entries: sorted(entries),
            });
        }

        Self {
            metadata,
            sections,
            max_rows: None,
        }
    }

    /// Limit rows per table; extra rows are summarised, never hidden silently
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows.filter(|n| *n > 0);
        self
    }

    /// Number of (kind, account, region) entries
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    /// Totals by status
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.sections.iter().flat_map(|s| &s.entries) {
            match &entry.status {
                CollectionStatus::Ok if entry.rows.is_empty() => counts.empty += 1,
                CollectionStatus::Ok => counts.populated += 1,
                CollectionStatus::Unavailable(_) => counts.unavailable += 1,
                CollectionStatus::Error(_) => counts.errors += 1,
            }
        }
        counts
    }

    /// Render as markdown
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_front_matter(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.metadata;
        let timestamp = meta.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let counts = self.status_counts();

        // JSON strings are valid YAML scalars
        writeln!(f, "---")?;
        writeln!(f, "title: {}", Value::String(meta.title.clone()))?;
        writeln!(f, "date: {}", Value::String(timestamp.clone()))?;
        writeln!(f, "---")?;
        writeln!(f)?;
        writeln!(f, "# {}", meta.title)?;
        writeln!(f)?;
        writeln!(f, "| Field | Value |")?;
        writeln!(f, "| --- | --- |")?;
        writeln!(f, "| Generated at | {timestamp} |")?;
        if let Some(caller) = &meta.scanned_by {
            writeln!(
                f,
                "| Scanned by | {} (account {}, user id {}) |",
                escape(&caller.arn),
                caller.account_id,
                escape(&caller.user_id)
            )?;
        }
        writeln!(f, "| Accounts scanned | {} |", meta.accounts.len())?;
        writeln!(f, "| Accounts | {} |", escape(&meta.accounts.join(", ")))?;
        writeln!(f, "| Regions scanned | {} |", escape(&meta.regions.join(", ")))?;
        writeln!(f, "| Resource kinds | {} |", self.sections.len())?;
        writeln!(
            f,
            "| Result sets | {} total: {} with resources, {} empty, {} unavailable, {} errors |",
            counts.total(),
            counts.populated,
            counts.empty,
            counts.unavailable,
            counts.errors
        )?;
        writeln!(f)?;

        if !self.sections.is_empty() {
            writeln!(f, "## Contents")?;
            writeln!(f)?;
            for (i, section) in self.sections.iter().enumerate() {
                writeln!(f, "{}. [{}](#{})", i + 1, section.title, anchor(&section.title))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_section(&self, f: &mut fmt::Formatter<'_>, section: &Section) -> fmt::Result {
        writeln!(f, "## {}", section.title)?;
        writeln!(f)?;
        if !section.description.is_empty() {
            writeln!(f, "{}", section.description)?;
            writeln!(f)?;
        }
        writeln!(f, "Resources found: {}", section.resource_count())?;
        writeln!(f)?;

        if section.entries.is_empty() {
            writeln!(f, "_No accounts or regions were scanned._")?;
            writeln!(f)?;
        }

        for entry in &section.entries {
            writeln!(f, "### Account {} / {}", entry.account_id, entry.region)?;
            writeln!(f)?;
            match &entry.status {
                CollectionStatus::Ok if entry.rows.is_empty() => writeln!(f, "{NO_RESOURCES}")?,
                CollectionStatus::Ok => self.write_table(f, &entry.columns, &entry.rows)?,
                CollectionStatus::Unavailable(reason) => {
                    writeln!(f, "> {UNAVAILABLE_PREFIX}: {}", single_line(reason))?;
                }
                CollectionStatus::Error(reason) => {
                    writeln!(f, "> Error: {}", single_line(reason))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_table(
        &self,
        f: &mut fmt::Formatter<'_>,
        columns: &[String],
        rows: &[Row],
    ) -> fmt::Result {
        let width = columns.len().max(1);
        let header: Vec<String> = if columns.is_empty() {
            vec!["Value".to_string()]
        } else {
            columns.iter().map(|c| escape(c)).collect()
        };

        writeln!(f, "| {} |", header.join(" | "))?;
        writeln!(f, "|{}", " --- |".repeat(width))?;

        let shown = self.max_rows.map_or(rows.len(), |max| max.min(rows.len()));
        for row in &rows[..shown] {
            writeln!(f, "| {} |", row_cells(row, columns, width).join(" | "))?;
        }

        if shown < rows.len() {
            writeln!(f)?;
            writeln!(f, "_... and {} more_", rows.len() - shown)?;
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_front_matter(f)?;
        for section in &self.sections {
            self.write_section(f, section)?;
        }
        Ok(())
    }
}

/// Sort entries by (account, region), breaking ties on content
fn sorted(mut entries: Vec<CollectionResult>) -> Vec<CollectionResult> {
    entries.sort_by_cached_key(|e| {
        (
            e.account_id.clone(),
            e.region.clone(),
            serde_json::to_string(e).unwrap_or_default(),
        )
    });
    entries
}

/// Cells for one row; a row that does not fit the header degrades to raw JSON
fn row_cells(row: &Row, columns: &[String], width: usize) -> Vec<String> {
    let fits = row.len() == columns.len()
        && row
            .cells
            .iter()
            .zip(columns)
            .all(|(cell, column)| &cell.column == column);

    if fits {
        return row.cells.iter().map(|c| escape(&cell_text(&c.value))).collect();
    }

    let raw: serde_json::Map<String, Value> = row
        .cells
        .iter()
        .map(|c| (c.column.clone(), c.value.clone()))
        .collect();
    let mut cells = vec![escape(&Value::Object(raw).to_string())];
    cells.resize(width, String::new());
    cells
}

/// Text of a single value
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Make text safe inside a table cell
fn escape(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

/// Collapse all whitespace runs (including newlines) to single spaces
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// GitHub-style heading anchor
fn anchor(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.extend(c.to_lowercase());
        } else if c == ' ' {
            out.push('-');
        }
    }
    out
}
