//! Selector options

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::DEFAULT_MAX_CLUSTERS;
use crate::driver::RetryPolicy;
use crate::ordering::{DEFAULT_MAX_ITEMS, HARD_MAX_ITEMS};

use super::errors::{SelectorError, SelectorResult};
use super::state::MAX_TIMEOUT_SECS;

/// Tunables of a configuration search. Every field has a default, so a
/// partial JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorOptions {
    /// Time budget of the first round, seconds
    pub initial_timeout_secs: f64,
    /// Factor the budget grows by after a round where nothing completed
    pub timeout_interval: f64,
    pub max_rounds: u32,
    pub max_clusters: usize,
    /// Item cap of the exact ordering solver
    pub max_order_items: usize,
    /// Cluster and order queries by index cost
    pub enable_query_scheduler: bool,
    /// Widen the budget to cover index creation time
    pub adaptive_timeout: bool,
    pub create_indexes: bool,
    /// Build every needed index before the first query instead of lazily
    pub create_all_indexes_first: bool,
    pub drop_indexes: bool,
    /// Stop after the first round in which some configuration completed
    pub early_exit: bool,
    pub restart_on_apply: bool,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            initial_timeout_secs: 10.0,
            timeout_interval: 10.0,
            max_rounds: 5,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            max_order_items: DEFAULT_MAX_ITEMS,
            enable_query_scheduler: true,
            adaptive_timeout: true,
            create_indexes: true,
            create_all_indexes_first: false,
            drop_indexes: true,
            early_exit: true,
            restart_on_apply: true,
            retry_attempts: 3,
            retry_backoff_ms: 10_000,
        }
    }
}

impl SelectorOptions {
    /// Reject option combinations the scheduler cannot honor
    pub fn validate(&self) -> SelectorResult<()> {
        let invalid = |msg: &str| Err(SelectorError::InvalidOptions(msg.to_string()));

        if self.enable_query_scheduler && self.create_all_indexes_first {
            return invalid("enable_query_scheduler and create_all_indexes_first are mutually exclusive");
        }
        if self.enable_query_scheduler && !self.create_indexes {
            return invalid("enable_query_scheduler requires create_indexes");
        }
        if self.drop_indexes && !self.create_indexes {
            return invalid("drop_indexes requires create_indexes");
        }
        if !(self.initial_timeout_secs.is_finite() && self.initial_timeout_secs > 0.0) {
            return invalid("initial_timeout_secs must be a positive number");
        }
        if self.initial_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(SelectorError::InvalidOptions(format!(
                "initial_timeout_secs must be at most {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if !(self.timeout_interval.is_finite() && self.timeout_interval > 1.0) {
            return invalid("timeout_interval must be greater than 1");
        }
        if self.max_rounds == 0 {
            return invalid("max_rounds must be at least 1");
        }
        if self.max_order_items == 0 || self.max_order_items > HARD_MAX_ITEMS {
            return Err(SelectorError::InvalidOptions(format!(
                "max_order_items must be between 1 and {}",
                HARD_MAX_ITEMS
            )));
        }
        if self.max_clusters == 0 || self.max_clusters > self.max_order_items {
            return Err(SelectorError::InvalidOptions(format!(
                "max_clusters must be between 1 and max_order_items ({})",
                self.max_order_items
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = SelectorOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.max_clusters, 13);
        assert_eq!(options.retry_policy().attempts(), 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: SelectorOptions =
            serde_json::from_str(r#"{"max_rounds": 2, "early_exit": false}"#).unwrap();
        assert_eq!(options.max_rounds, 2);
        assert!(!options.early_exit);
        assert_eq!(options.timeout_interval, 10.0);
    }

    #[test]
    fn test_rejects_conflicting_toggles() {
        let options = SelectorOptions {
            create_all_indexes_first: true,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = SelectorOptions {
            enable_query_scheduler: false,
            create_indexes: false,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(SelectorError::InvalidOptions(m)) if m.contains("drop_indexes")));

        let options = SelectorOptions {
            enable_query_scheduler: false,
            create_indexes: false,
            drop_indexes: false,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_limits() {
        for options in [
            SelectorOptions { timeout_interval: 1.0, ..Default::default() },
            SelectorOptions { initial_timeout_secs: 0.0, ..Default::default() },
            SelectorOptions { initial_timeout_secs: 1.0e300, ..Default::default() },
            SelectorOptions { max_rounds: 0, ..Default::default() },
            SelectorOptions { max_order_items: HARD_MAX_ITEMS + 1, ..Default::default() },
            SelectorOptions { max_clusters: 0, ..Default::default() },
            SelectorOptions { max_clusters: 21, max_order_items: 20, ..Default::default() },
        ] {
            assert!(options.validate().is_err(), "{:?}", options);
        }
    }
}
