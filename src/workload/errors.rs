//! Workload and candidate loading errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for loaders
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Loader errors. All of them are fatal at run start.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable configuration candidates in {0}")]
    NoCandidates(PathBuf),

    #[error("no queries found in {0}")]
    NoQueries(PathBuf),
}

impl WorkloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WorkloadError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            WorkloadError::Io { .. } => "TUNE_WORKLOAD_IO",
            WorkloadError::NoCandidates(_) => "TUNE_WORKLOAD_NO_CANDIDATES",
            WorkloadError::NoQueries(_) => "TUNE_WORKLOAD_NO_QUERIES",
        }
    }
}
