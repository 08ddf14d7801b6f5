//! Driver error types
//!
//! - Transient: connection refused, restart in progress (retried)
//! - Soft: a single statement rejected by the engine (logged, skipped)
//! - Fatal: the client program itself is unusable

use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Database driver errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("restart failed: {0}")]
    Restart(String),

    #[error("statement rejected: {0}")]
    Statement(String),

    #[error("client unavailable: {0}")]
    Client(String),

    #[error("unexpected client output: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::Connection(_) => "TUNE_DRIVER_CONNECTION",
            DriverError::Restart(_) => "TUNE_DRIVER_RESTART",
            DriverError::Statement(_) => "TUNE_DRIVER_STATEMENT",
            DriverError::Client(_) => "TUNE_DRIVER_CLIENT",
            DriverError::Protocol(_) => "TUNE_DRIVER_PROTOCOL",
        }
    }

    /// Worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Connection(_) | DriverError::Restart(_))
    }

    /// The driver cannot be used any further
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Client(_))
    }

    /// Affects only the statement that caused it
    pub fn is_soft(&self) -> bool {
        matches!(self, DriverError::Statement(_) | DriverError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(DriverError::Connection("refused".into()).is_transient());
        assert!(DriverError::Restart("exit 1".into()).is_transient());
        assert!(!DriverError::Statement("syntax".into()).is_transient());
        assert!(DriverError::Statement("syntax".into()).is_soft());
        assert!(!DriverError::Client("psql not found".into()).is_soft());
        assert!(!DriverError::Client("psql not found".into()).is_transient());
        assert!(DriverError::Client("psql not found".into()).is_fatal());
        assert!(!DriverError::Connection("refused".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = DriverError::Connection("could not connect to server".into());
        assert_eq!(err.to_string(), "connection failed: could not connect to server");
        assert_eq!(err.code(), "TUNE_DRIVER_CONNECTION");
    }
}
