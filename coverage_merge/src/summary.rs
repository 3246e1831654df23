//! Aggregation of `coverage-summary.json` documents.
//!
//! A summary document maps a scope to its coverage: the literal `total` scope,
//! read as a [`SummaryEntry`], plus one scope per source file. Merging
//! accumulates `total` and overwrites file scopes, last write wins. File scopes
//! are kept as the JSON they were parsed from.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{MergeError, MergeResult},
    writer,
};

/// Recomputes a coverage percentage, rounded half-up to one decimal.
///
/// Zero measurable units count as fully covered.
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }

    // floor(1000 * covered / total + 0.5) without leaving integer arithmetic.
    let covered = u128::from(covered);
    let total = u128::from(total);
    let tenths = (2000 * covered + total) / (2 * total);
    tenths as f64 / 10.0
}

/// One coverage axis of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMetric")]
pub struct CoverageMetric {
    pub total: u64,
    pub covered: u64,
    pub skipped: u64,
    pub pct: f64,
}

impl CoverageMetric {
    pub fn new(total: u64, covered: u64, skipped: u64) -> Self {
        Self {
            total,
            covered,
            skipped,
            pct: percent(covered, total),
        }
    }

    /// Adds the counts of `other`; `pct` is derived again, never summed.
    pub fn accumulate(&mut self, other: &CoverageMetric) {
        self.total = self.total.saturating_add(other.total);
        self.covered = self.covered.saturating_add(other.covered);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.pct = percent(self.covered, self.total);
    }
}

impl Default for CoverageMetric {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

// Reports from older istanbul versions write `"pct": "Unknown"` for empty
// axes, and some omit counts entirely.
#[derive(Deserialize)]
struct RawMetric {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    covered: u64,
    #[serde(default)]
    skipped: u64,
    #[serde(default)]
    pct: Option<Value>,
}

impl From<RawMetric> for CoverageMetric {
    fn from(raw: RawMetric) -> Self {
        let pct = raw
            .pct
            .as_ref()
            .and_then(Value::as_f64)
            .unwrap_or_else(|| percent(raw.covered, raw.total));
        Self {
            total: raw.total,
            covered: raw.covered,
            skipped: raw.skipped,
            pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Lines,
    Statements,
    Functions,
    Branches,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::Lines,
        Axis::Statements,
        Axis::Functions,
        Axis::Branches,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Axis::Lines => "lines",
            Axis::Statements => "statements",
            Axis::Functions => "functions",
            Axis::Branches => "branches",
        }
    }
}

/// Coverage of the `total` scope across the four axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    #[serde(default)]
    pub lines: CoverageMetric,
    #[serde(default)]
    pub statements: CoverageMetric,
    #[serde(default)]
    pub functions: CoverageMetric,
    #[serde(default)]
    pub branches: CoverageMetric,
}

impl SummaryEntry {
    pub fn metric(&self, axis: Axis) -> &CoverageMetric {
        match axis {
            Axis::Lines => &self.lines,
            Axis::Statements => &self.statements,
            Axis::Functions => &self.functions,
            Axis::Branches => &self.branches,
        }
    }

    pub fn metric_mut(&mut self, axis: Axis) -> &mut CoverageMetric {
        match axis {
            Axis::Lines => &mut self.lines,
            Axis::Statements => &mut self.statements,
            Axis::Functions => &mut self.functions,
            Axis::Branches => &mut self.branches,
        }
    }

    pub fn accumulate(&mut self, other: &SummaryEntry) {
        for axis in Axis::ALL {
            self.metric_mut(axis).accumulate(other.metric(axis));
        }
    }
}

/// A single per-package `coverage-summary.json` as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SummaryFile {
    #[serde(default)]
    pub total: Option<SummaryEntry>,
    #[serde(flatten)]
    pub files: BTreeMap<String, Value>,
}

impl SummaryFile {
    pub fn read(path: &Path) -> MergeResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| MergeError::io(path, err))?;
        serde_json::from_str(&text).map_err(|err| MergeError::parse(path, err))
    }
}

/// The repo-wide aggregate.
///
/// Serializes as one JSON object with `total` first, followed by the file
/// scopes in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    total: SummaryEntry,
    #[serde(flatten)]
    files: BTreeMap<String, Value>,
}

impl CoverageSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an aggregate from an existing summary document.
    pub fn from_file(path: &Path) -> MergeResult<Self> {
        let document = SummaryFile::read(path)?;
        Ok(Self {
            total: document.total.unwrap_or_default(),
            files: document.files,
        })
    }

    pub fn total(&self) -> &SummaryEntry {
        &self.total
    }

    pub fn files(&self) -> &BTreeMap<String, Value> {
        &self.files
    }

    pub fn merge(&mut self, path: &Path) -> MergeResult<()> {
        let document = SummaryFile::read(path)?;
        debug!(
            path = %path.display(),
            has_total = document.total.is_some(),
            files = document.files.len(),
            "Merging coverage summary"
        );
        self.merge_document(document);
        Ok(())
    }

    pub fn merge_document(&mut self, document: SummaryFile) {
        if let Some(total) = &document.total {
            self.total.accumulate(total);
        }

        // File scopes are unique to the package that produced them.
        self.files.extend(document.files);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn write(&self, dest: &Path) -> MergeResult<()> {
        let json = self
            .to_json()
            .map_err(|err| MergeError::write(dest, io::Error::from(err)))?;
        writer::write_output(dest, &json)
    }
}

/// Merges every file in `paths`, in order, into a fresh aggregate.
pub fn merge_all<I>(paths: I) -> MergeResult<CoverageSummary>
where
    I: IntoIterator,
    I::Item: Into<PathBuf>,
{
    let mut summary = CoverageSummary::new();
    for path in paths {
        let path: PathBuf = path.into();
        summary.merge(&path)?;
    }
    Ok(summary)
}
