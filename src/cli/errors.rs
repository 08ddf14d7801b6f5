//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1.

use std::fmt;
use std::io;

use crate::driver::DriverError;
use crate::report::ReportError;
use crate::selector::SelectorError;
use crate::workload::WorkloadError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, output directory)
    IoError,
    /// Candidate or query inputs unusable
    InputError,
    /// Database unreachable or unusable
    ConnectionFailed,
    /// Search aborted
    RunFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "TUNE_CLI_CONFIG_ERROR",
            Self::IoError => "TUNE_CLI_IO_ERROR",
            Self::InputError => "TUNE_CLI_INPUT_ERROR",
            Self::ConnectionFailed => "TUNE_CLI_CONNECTION_FAILED",
            Self::RunFailed => "TUNE_CLI_RUN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConnectionFailed, msg)
    }

    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RunFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<WorkloadError> for CliError {
    fn from(e: WorkloadError) -> Self {
        Self::input_error(format!("{} ({})", e, e.code()))
    }
}

impl From<ReportError> for CliError {
    fn from(e: ReportError) -> Self {
        Self::io_error(format!("{} ({})", e, e.code()))
    }
}

impl From<DriverError> for CliError {
    fn from(e: DriverError) -> Self {
        Self::connection_failed(format!("{} ({})", e, e.code()))
    }
}

impl From<SelectorError> for CliError {
    fn from(e: SelectorError) -> Self {
        match e {
            SelectorError::InvalidOptions(msg) => Self::config_error(msg),
            SelectorError::Driver { .. } => Self::connection_failed(format!("{} ({})", e, e.code())),
            other => Self::run_failed(format!("{} ({})", other, other.code())),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
