//! Configuration selector errors
//!
//! Everything here terminates the run. Budget exhaustion and soft driver
//! failures are not errors and never reach this type.

use thiserror::Error;

use crate::driver::DriverError;
use crate::ordering::OrderingError;
use crate::report::ReportError;

/// Result type for selector operations
pub type SelectorResult<T> = Result<T, SelectorError>;

/// Configuration selector errors
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("no configurations to evaluate")]
    NoConfigurations,

    #[error("invalid selector options: {0}")]
    InvalidOptions(String),

    #[error("driver operation {operation} failed: {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("query ordering failed: {0}")]
    Ordering(#[from] OrderingError),

    #[error("report log failed: {0}")]
    Report(#[from] ReportError),

    #[error("forbidden scheduler transition: {from} -> {to}")]
    ForbiddenTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl SelectorError {
    pub(crate) fn driver(operation: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| SelectorError::Driver { operation, source }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SelectorError::NoConfigurations => "TUNE_SELECTOR_NO_CONFIGURATIONS",
            SelectorError::InvalidOptions(_) => "TUNE_SELECTOR_INVALID_OPTIONS",
            SelectorError::Driver { source, .. } => source.code(),
            SelectorError::Ordering(e) => e.code(),
            SelectorError::Report(e) => e.code(),
            SelectorError::ForbiddenTransition { .. } => "TUNE_SELECTOR_FORBIDDEN_TRANSITION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_keeps_operation() {
        let err = SelectorError::driver("reset_state")(DriverError::Connection("refused".into()));
        assert_eq!(
            err.to_string(),
            "driver operation reset_state failed: connection failed: refused"
        );
        assert_eq!(err.code(), "TUNE_DRIVER_CONNECTION");
    }

    #[test]
    fn test_codes() {
        assert_eq!(SelectorError::NoConfigurations.code(), "TUNE_SELECTOR_NO_CONFIGURATIONS");
        let err: SelectorError = OrderingError::InvalidLimit(0).into();
        assert_eq!(err.code(), "TUNE_ORDERING_INVALID_LIMIT");
    }
}
