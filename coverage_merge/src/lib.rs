//! Merges the per-package coverage reports of a monorepo.
//!
//! Every package writes `coverage-summary.json` and `lcov.info` under its own
//! coverage directory. This crate folds them into one repo-wide summary and
//! one repo-wide lcov report under `{root}/{coverage}/`.

pub mod app;
pub mod discovery;
pub mod error;
pub mod lcov;
pub mod summary;
pub mod writer;

pub use discovery::Discovery;
pub use error::{MergeError, MergeResult};
pub use lcov::LcovReport;
pub use summary::{CoverageMetric, CoverageSummary, SummaryEntry};
