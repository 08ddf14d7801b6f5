//! Report log
//!
//! - `reports.json` holds a JSON array of every report of every run
//! - Each append rewrites the whole file through a temp file and rename,
//!   so readers never observe a partially written array
//! - Records already in the file are preserved as-is

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{ReportError, ReportResult};
use super::record::ExecutionReport;

/// File name of the report log inside the output directory
pub const REPORTS_FILE: &str = "reports.json";

/// Destination for execution reports
pub trait ReportLog {
    /// Append a report. The report MUST be durable when this returns.
    fn append(&self, report: &ExecutionReport) -> ReportResult<()>;

    /// Where reports end up, if on disk
    fn location(&self) -> Option<&Path>;
}

/// File-backed report log
pub struct FileReportLog {
    path: PathBuf,
    records: Mutex<Vec<Value>>,
}

impl FileReportLog {
    /// Open `<dir>/reports.json`, creating `dir` if needed and loading any
    /// reports already present.
    pub fn open(dir: impl AsRef<Path>) -> ReportResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
        let path = dir.join(REPORTS_FILE);

        let records = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| ReportError::io(&path, e))?;
            serde_json::from_slice::<Vec<Value>>(&bytes).map_err(|source| ReportError::Format {
                path: path.clone(),
                source,
            })?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the file, including earlier runs
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every report in a report log file
    pub fn read_all(path: impl AsRef<Path>) -> ReportResult<Vec<ExecutionReport>> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ReportError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| ReportError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    fn rewrite(&self, records: &[Value]) -> ReportResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(records)?;

        let mut file = File::create(&tmp).map_err(|e| ReportError::io(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| ReportError::io(&tmp, e))?;
        file.sync_all().map_err(|e| ReportError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| ReportError::io(&self.path, e))
    }
}

impl ReportLog for FileReportLog {
    fn append(&self, report: &ExecutionReport) -> ReportResult<()> {
        let value = serde_json::to_value(report)?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(value);

        if let Err(e) = self.rewrite(&records) {
            records.pop();
            return Err(e);
        }

        log_event_with_fields(
            Event::ReportAppended,
            &[
                ("config", &report.config_id),
                ("round", &report.round.to_string()),
                ("completed", &report.completed.to_string()),
                ("path", &self.path.display().to_string()),
            ],
        );
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory report log for testing. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportLog {
    records: Arc<Mutex<Vec<ExecutionReport>>>,
}

impl MemoryReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExecutionReport> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportLog for MemoryReportLog {
    fn append(&self, report: &ExecutionReport) -> ReportResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        None
    }
}
