//! Ordering solver errors

use thiserror::Error;

use super::solver::HARD_MAX_ITEMS;

/// Result type for ordering operations
pub type OrderingResult<T> = Result<T, OrderingError>;

/// Ordering solver errors. None of them are transient.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderingError {
    #[error("{items} items exceed the ordering limit of {limit}")]
    TooManyItems { items: usize, limit: usize },

    #[error("invalid item limit {0}: must be between 1 and {max}", max = HARD_MAX_ITEMS)]
    InvalidLimit(usize),

    #[error("index creation cost must be finite and non-negative, got {0}")]
    InvalidCost(f64),

    #[error("expected {expected} item weights, got {actual}")]
    WeightMismatch { expected: usize, actual: usize },

    #[error("item weight must be finite and positive, got {0}")]
    InvalidWeight(f64),

    #[error("order is not a permutation of the items")]
    NotAPermutation,
}

impl OrderingError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            OrderingError::TooManyItems { .. } => "TUNE_ORDERING_TOO_MANY_ITEMS",
            OrderingError::InvalidLimit(_) => "TUNE_ORDERING_INVALID_LIMIT",
            OrderingError::InvalidCost(_) => "TUNE_ORDERING_INVALID_COST",
            OrderingError::WeightMismatch { .. } => "TUNE_ORDERING_WEIGHT_MISMATCH",
            OrderingError::InvalidWeight(_) => "TUNE_ORDERING_INVALID_WEIGHT",
            OrderingError::NotAPermutation => "TUNE_ORDERING_NOT_A_PERMUTATION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code() {
        let err = OrderingError::TooManyItems { items: 30, limit: 13 };
        assert_eq!(err.to_string(), "30 items exceed the ordering limit of 13");
        assert_eq!(err.code(), "TUNE_ORDERING_TOO_MANY_ITEMS");
        assert!(OrderingError::InvalidLimit(0).to_string().contains("between 1 and"));
    }
}
