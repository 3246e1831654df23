use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    discovery::{Discovery, LCOV_FILE_NAME, SUMMARY_FILE_NAME},
    error::MergeError,
    lcov::LcovReport,
    summary,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "coverage_merge",
    author,
    version,
    about = "Merge per-package coverage reports of a monorepo",
    long_about = None
)]
pub struct Args {
    /// Directory under the root containing one subdirectory per package
    #[arg(long, value_name = "NAME", default_value = "packages")]
    pub packages: String,

    /// Per-package coverage directory, also used for the merged output
    #[arg(long, value_name = "NAME", default_value = "coverage")]
    pub coverage: String,

    /// Base path for discovery and output [default: current directory]
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Fail when no coverage report is found
    #[arg(long)]
    pub require_inputs: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub packages_dir: String,
    pub coverage_dir: String,
    pub root: PathBuf,
    /// Directory rewritten lcov paths are relative to.
    pub base_dir: PathBuf,
    pub require_inputs: bool,
}

impl AppConfig {
    /// Relative and empty roots are resolved against `cwd`.
    pub fn from_args_in(args: Args, cwd: PathBuf) -> Self {
        let root = match args.root {
            Some(root) if !root.as_os_str().is_empty() => cwd.join(root),
            _ => cwd.clone(),
        };
        Self {
            packages_dir: args.packages,
            coverage_dir: args.coverage,
            root,
            base_dir: cwd,
            require_inputs: args.require_inputs,
        }
    }

    pub fn summary_output(&self) -> PathBuf {
        self.root.join(&self.coverage_dir).join(SUMMARY_FILE_NAME)
    }

    pub fn lcov_output(&self) -> PathBuf {
        self.root.join(&self.coverage_dir).join(LCOV_FILE_NAME)
    }
}

impl TryFrom<Args> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(value: Args) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;
        Ok(Self::from_args_in(value, cwd))
    }
}

/// What a run merged and where it wrote the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub summary_inputs: usize,
    pub lcov_inputs: usize,
    pub summary_output: PathBuf,
    pub lcov_output: PathBuf,
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(config: AppConfig) -> Result<MergeOutcome> {
    let discovery = Discovery::new(&config.root, &config.packages_dir, &config.coverage_dir);

    let summary_files = discovery
        .find_summary_files()
        .context("failed to discover coverage summaries")?;
    let lcov_files = discovery
        .find_lcov_files()
        .context("failed to discover lcov reports")?;

    info!(
        root = %discovery.root().display(),
        packages = %config.packages_dir,
        coverage = %config.coverage_dir,
        summaries = summary_files.len(),
        lcov_reports = lcov_files.len(),
        "Discovered coverage reports",
    );

    if config.require_inputs && summary_files.is_empty() && lcov_files.is_empty() {
        return Err(MergeError::NoInputs {
            root: config.root.clone(),
        }
        .into());
    }

    let summary_output = config.summary_output();
    merge_summaries(&summary_files, &summary_output)?;

    let lcov_output = config.lcov_output();
    merge_lcov_reports(&lcov_files, &config, &lcov_output)?;

    Ok(MergeOutcome {
        summary_inputs: summary_files.len(),
        lcov_inputs: lcov_files.len(),
        summary_output,
        lcov_output,
    })
}

fn merge_summaries(files: &[PathBuf], dest: &Path) -> Result<()> {
    let merged = summary::merge_all(files).context("failed to merge coverage summaries")?;
    merged
        .write(dest)
        .with_context(|| format!("failed to write {}", dest.display()))?;

    let lines = merged.total().lines;
    info!(
        output = %dest.display(),
        files = merged.files().len(),
        lines_covered = lines.covered,
        lines_total = lines.total,
        lines_pct = lines.pct,
        "Wrote merged coverage summary",
    );
    Ok(())
}

fn merge_lcov_reports(files: &[PathBuf], config: &AppConfig, dest: &Path) -> Result<()> {
    let mut report = LcovReport::new(&config.coverage_dir, &config.base_dir);
    for file in files {
        report
            .merge(file)
            .with_context(|| format!("failed to merge lcov report {}", file.display()))?;
    }
    report
        .write(dest)
        .with_context(|| format!("failed to write {}", dest.display()))?;

    info!(
        output = %dest.display(),
        blocks = report.blocks().len(),
        "Wrote merged lcov report",
    );
    Ok(())
}

/// Maps a failed run onto the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<MergeError>()
        .map_or(1, MergeError::exit_code)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config_for(root: &Path) -> AppConfig {
        let args = Args::try_parse_from(["coverage_merge"]).expect("default args parse");
        AppConfig::from_args_in(args, root.to_path_buf())
    }

    #[test]
    fn cli_args_defaults_then_use_expected_values() {
        let args = Args::try_parse_from(["coverage_merge"]).expect("default args parse");
        let config = AppConfig::from_args_in(args, PathBuf::from("/work"));

        assert_eq!(config.packages_dir, "packages");
        assert_eq!(config.coverage_dir, "coverage");
        assert_eq!(config.root, PathBuf::from("/work"));
        assert_eq!(config.base_dir, PathBuf::from("/work"));
        assert!(!config.require_inputs);
        assert_eq!(
            config.summary_output(),
            PathBuf::from("/work/coverage/coverage-summary.json")
        );
        assert_eq!(config.lcov_output(), PathBuf::from("/work/coverage/lcov.info"));
    }

    #[test]
    fn cli_args_custom_inputs_then_override_defaults() {
        let args = Args::try_parse_from([
            "coverage_merge",
            "--packages",
            "libs",
            "--coverage",
            "cov",
            "--root",
            "/repo",
            "--require-inputs",
        ])
        .expect("custom args parse");

        let config = AppConfig::from_args_in(args, PathBuf::from("/work"));

        assert_eq!(config.packages_dir, "libs");
        assert_eq!(config.coverage_dir, "cov");
        assert_eq!(config.root, PathBuf::from("/repo"));
        assert_eq!(config.base_dir, PathBuf::from("/work"));
        assert!(config.require_inputs);
        assert_eq!(config.lcov_output(), PathBuf::from("/repo/cov/lcov.info"));
    }

    #[test]
    fn cli_args_relative_root_then_resolved_against_cwd() {
        let args = Args::try_parse_from(["coverage_merge", "--root", "apps/web"])
            .expect("relative root parse");
        let config = AppConfig::from_args_in(args, PathBuf::from("/work"));

        assert_eq!(config.root, PathBuf::from("/work/apps/web"));
        assert_eq!(
            config.summary_output(),
            PathBuf::from("/work/apps/web/coverage/coverage-summary.json")
        );
    }

    #[test]
    fn cli_args_empty_root_then_uses_cwd() {
        let args = Args {
            root: Some(PathBuf::new()),
            ..Args::try_parse_from(["coverage_merge"]).expect("default args parse")
        };
        let config = AppConfig::from_args_in(args, PathBuf::from("/work"));

        assert_eq!(config.root, PathBuf::from("/work"));
        assert_eq!(config.lcov_output(), PathBuf::from("/work/coverage/lcov.info"));
    }

    #[test]
    fn run__empty_root__then_discovers_and_writes_under_cwd() {
        let cwd = tempdir().expect("tempdir");
        let dir = cwd.path().join("packages/a/coverage");
        fs::create_dir_all(&dir).expect("dirs");
        fs::write(dir.join("lcov.info"), "SF:src/a.ts").expect("write");
        let args = Args {
            root: Some(PathBuf::new()),
            ..Args::try_parse_from(["coverage_merge"]).expect("default args parse")
        };

        let outcome = run(AppConfig::from_args_in(args, cwd.path().to_path_buf())).expect("run");

        assert_eq!(outcome.lcov_inputs, 1);
        assert_eq!(outcome.lcov_output, cwd.path().join("coverage/lcov.info"));
        assert_eq!(
            fs::read_to_string(&outcome.lcov_output).expect("read"),
            "SF:packages/a/src/a.ts"
        );
    }

    #[test]
    fn cli_args_unknown_flag_then_rejected() {
        assert!(Args::try_parse_from(["coverage_merge", "--bogus"]).is_err());
    }

    #[test]
    fn run__no_packages__then_writes_seed_outputs() {
        let root = tempdir().expect("tempdir");

        let outcome = run(config_for(root.path())).expect("run");

        assert_eq!(outcome.summary_inputs, 0);
        assert_eq!(outcome.lcov_inputs, 0);
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&outcome.summary_output).expect("read"))
                .expect("json");
        assert_eq!(summary["total"]["lines"]["pct"], 100.0);
        assert_eq!(summary["total"]["branches"]["total"], 0);
        assert_eq!(fs::read_to_string(&outcome.lcov_output).expect("read"), "");
    }

    #[test]
    fn run__require_inputs_without_reports__then_no_inputs_error() {
        let root = tempdir().expect("tempdir");
        let mut config = config_for(root.path());
        config.require_inputs = true;

        let err = run(config).expect_err("no inputs");

        assert_eq!(exit_code(&err), 7);
        assert!(!root.path().join("coverage").exists());
    }

    #[test]
    fn run__malformed_summary__then_parse_exit_code() {
        let root = tempdir().expect("tempdir");
        let dir = root.path().join("packages/a/coverage");
        fs::create_dir_all(&dir).expect("dirs");
        fs::write(dir.join("coverage-summary.json"), "not json").expect("write");

        let err = run(config_for(root.path())).expect_err("parse failure");

        assert_eq!(exit_code(&err), 4);
        assert!(format!("{err:#}").contains("failed to merge coverage summaries"));
    }

    #[test]
    fn exit_code__foreign_error__then_generic_failure() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn init_tracing__called_twice__then_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
