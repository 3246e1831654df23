use std::{fmt, io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to expand pattern {pattern}: {details}")]
    Discovery { pattern: String, details: String },
    #[error("summary parse error at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no coverage reports found under {root:?}")]
    NoInputs { root: PathBuf },
}

pub type MergeResult<T> = Result<T, MergeError>;

impl MergeError {
    pub fn discovery(pattern: impl Into<String>, details: impl fmt::Display) -> Self {
        Self::Discovery {
            pattern: pattern.into(),
            details: details.to_string(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported by the binary for this failure.
    ///
    /// 1 is left for failures outside the merge itself and 2 for clap usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Discovery { .. } => 3,
            Self::Parse { .. } => 4,
            Self::Io { .. } => 5,
            Self::Write { .. } => 6,
            Self::NoInputs { .. } => 7,
        }
    }
}
