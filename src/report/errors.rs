//! Report log errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for report log operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Report log errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report log I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("report log at {path} is not a JSON array of reports: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Io { .. } => "TUNE_REPORT_IO",
            ReportError::Format { .. } => "TUNE_REPORT_FORMAT",
            ReportError::Serialize(_) => "TUNE_REPORT_SERIALIZE",
        }
    }
}
