//! Aggregation of `lcov.info` reports.
//!
//! Each package records `SF:` paths relative to its own root. When blocks are
//! merged the `SF:src` prefix is re-anchored to the base directory so a single
//! viewer can resolve every file of the repo.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use tracing::debug;

use crate::{
    discovery::LCOV_FILE_NAME,
    error::{MergeError, MergeResult},
    writer,
};

const SOURCE_MARKER: &str = "SF:src";

#[derive(Debug, Clone)]
pub struct LcovReport {
    blocks: Vec<String>,
    coverage_dir: String,
    base_dir: PathBuf,
}

impl LcovReport {
    /// `base_dir` is the directory rewritten paths become relative to.
    pub fn new(coverage_dir: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            blocks: Vec::new(),
            coverage_dir: coverage_dir.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn from_file(
        path: &Path,
        coverage_dir: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> MergeResult<Self> {
        let mut report = Self::new(coverage_dir, base_dir);
        report.merge(path)?;
        Ok(report)
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Appends the report at `path`. A missing file leaves the report unchanged.
    pub fn merge(&mut self, path: &Path) -> MergeResult<()> {
        if !path.exists() {
            debug!(path = %path.display(), "No lcov report, skipping");
            return Ok(());
        }

        let text = fs::read_to_string(path).map_err(|err| MergeError::io(path, err))?;
        let package_root = self.package_root(path);
        debug!(
            path = %path.display(),
            package_root = %package_root,
            bytes = text.len(),
            "Merging lcov report"
        );

        self.blocks.push(rewrite_source_paths(&text, &package_root));
        Ok(())
    }

    /// The package directory of `path`, relative to the base directory.
    pub fn package_root(&self, path: &Path) -> String {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        let relative = relative_path(&absolute, &self.base_dir);
        let suffix = format!("/{}/{}", self.coverage_dir, LCOV_FILE_NAME);

        match relative.strip_suffix(&suffix) {
            Some(root) => root.to_string(),
            None => relative,
        }
    }

    /// Non-empty blocks joined with newlines.
    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .filter(|block| !block.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write(&self, dest: &Path) -> MergeResult<()> {
        writer::write_output(dest, &self.render())
    }
}

/// Re-anchors every line starting with `SF:src` under `package_root`.
///
/// A line starts after `\n`, `\r`, U+2028 or U+2029. Other lines and all line
/// terminators are kept as they are.
pub fn rewrite_source_paths(text: &str, package_root: &str) -> String {
    let replacement = format!("SF:{package_root}/src");
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive(is_line_terminator) {
        match line.strip_prefix(SOURCE_MARKER) {
            Some(rest) => {
                out.push_str(&replacement);
                out.push_str(rest);
            }
            None => out.push_str(line),
        }
    }

    out
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// `path` relative to `base`, `/`-separated, with `..` where `path` lies outside.
fn relative_path(path: &Path, base: &Path) -> String {
    let path = normalize(path);
    let base = normalize(base);

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    segments.extend(base[common..].iter().map(|_| "..".to_string()));
    segments.extend(path[common..].iter().cloned());
    segments.join("/")
}

fn normalize(path: &Path) -> Vec<String> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                segments.pop();
            }
            Component::Prefix(prefix) => {
                segments.push(prefix.as_os_str().to_string_lossy().into_owned());
            }
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
        }
    }
    segments
}
