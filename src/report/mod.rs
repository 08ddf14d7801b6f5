//! Execution reports
//!
//! One [`ExecutionReport`] is emitted per (round, configuration) attempt,
//! success or not, and appended to a [`ReportLog`].

mod errors;
mod log;
mod record;

pub use errors::{ReportError, ReportResult};
pub use log::{FileReportLog, MemoryReportLog, ReportLog, REPORTS_FILE};
pub use record::ExecutionReport;
