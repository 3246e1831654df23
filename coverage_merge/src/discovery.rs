//! Locates per-package coverage reports.
//!
//! Reports are expected at `{root}/{packages}/*/{coverage}/{file}`. Paths come
//! back in the order `glob` yields them, which is alphabetical per directory
//! level, so the merge order is stable across runs. Package directories whose
//! name starts with a dot (`.cache`, `.turbo`) are not matched by the wildcard.

use std::path::{Path, PathBuf};

use glob::MatchOptions;
use tracing::debug;

use crate::error::{MergeError, MergeResult};

pub const SUMMARY_FILE_NAME: &str = "coverage-summary.json";
pub const LCOV_FILE_NAME: &str = "lcov.info";

#[derive(Debug, Clone)]
pub struct Discovery {
    root: PathBuf,
    packages_dir: String,
    coverage_dir: String,
}

impl Discovery {
    pub fn new(
        root: impl Into<PathBuf>,
        packages_dir: impl Into<String>,
        coverage_dir: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            packages_dir: packages_dir.into(),
            coverage_dir: coverage_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find_summary_files(&self) -> MergeResult<Vec<PathBuf>> {
        self.find(SUMMARY_FILE_NAME)
    }

    pub fn find_lcov_files(&self) -> MergeResult<Vec<PathBuf>> {
        self.find(LCOV_FILE_NAME)
    }

    /// Builds the glob pattern for `file_name`, escaping every literal segment.
    pub fn pattern(&self, file_name: &str) -> String {
        let escaped = |segment: &str| glob::Pattern::escape(segment);
        let root = escaped(&self.root.to_string_lossy());
        format!(
            "{}/{}/*/{}/{}",
            root.trim_end_matches('/'),
            escaped(&self.packages_dir),
            escaped(&self.coverage_dir),
            escaped(file_name)
        )
    }

    fn find(&self, file_name: &str) -> MergeResult<Vec<PathBuf>> {
        let pattern = self.pattern(file_name);
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };
        let entries = glob::glob_with(&pattern, options)
            .map_err(|err| MergeError::discovery(pattern.clone(), err))?;

        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| MergeError::discovery(pattern.clone(), err))?;
            found.push(path);
        }

        debug!(pattern = %pattern, count = found.len(), "Expanded report pattern");
        Ok(found)
    }
}
