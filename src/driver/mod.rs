//! Database driver contract
//!
//! The selector talks to the database only through [`DatabaseDriver`].
//! Production drivers shell out to the engine's command-line client;
//! tests plug in scripted drivers.
//!
//! Driver operations are synchronous and assume exclusive use of the
//! database for the duration of a search (see [`ExclusiveSession`]).

mod client;
mod connection;
mod errors;
mod mysql;
mod postgres;
mod retry;
mod session;

pub use connection::{connect, ConnectionSettings, Engine};
pub use errors::{DriverError, DriverResult};
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use retry::RetryPolicy;
pub use session::{ExclusiveSession, ResetPolicy};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Result of executing one query under a timeout
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Finished within the timeout
    Completed { elapsed: Duration },
    /// Cancelled by the engine when the timeout expired
    TimedOut { elapsed: Duration },
    /// Rejected or aborted for some other reason
    Failed { elapsed: Duration, reason: String },
}

impl QueryOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            QueryOutcome::Completed { elapsed }
            | QueryOutcome::TimedOut { elapsed }
            | QueryOutcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, QueryOutcome::Completed { .. })
    }
}

/// Operations the configuration selector needs from a database
pub trait DatabaseDriver {
    /// Engine name for logs and reports
    fn engine(&self) -> &str;

    /// Return the database to its baseline: optionally drop every
    /// non-constraint index, reset global settings, optionally restart.
    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()>;

    /// Apply setting statements. Returns the statements the engine
    /// rejected; those are skipped, not fatal.
    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>>;

    /// Execute `query` with an engine-side timeout. When `result_sink` is
    /// given, the plan and outcome are written there as JSON.
    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome>;

    /// Run one index DDL statement
    fn create_index(&mut self, ddl: &str) -> DriverResult<()>;

    /// Names of indexes a reset would drop
    fn list_managed_indexes(&mut self) -> DriverResult<Vec<String>>;

    /// Row count per table, from engine statistics
    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>>;

    /// Current global settings, name to value
    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>>;
}

impl<D: DatabaseDriver + ?Sized> DatabaseDriver for &mut D {
    fn engine(&self) -> &str {
        (**self).engine()
    }

    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()> {
        (**self).reset_state(drop_managed_indexes, restart)
    }

    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>> {
        (**self).apply_configuration(settings, restart)
    }

    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome> {
        (**self).explain_and_execute(query, timeout, result_sink)
    }

    fn create_index(&mut self, ddl: &str) -> DriverResult<()> {
        (**self).create_index(ddl)
    }

    fn list_managed_indexes(&mut self) -> DriverResult<Vec<String>> {
        (**self).list_managed_indexes()
    }

    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>> {
        (**self).table_cardinalities()
    }

    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        (**self).current_global_settings()
    }
}

impl<D: DatabaseDriver + ?Sized> DatabaseDriver for Box<D> {
    fn engine(&self) -> &str {
        (**self).engine()
    }

    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()> {
        (**self).reset_state(drop_managed_indexes, restart)
    }

    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>> {
        (**self).apply_configuration(settings, restart)
    }

    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome> {
        (**self).explain_and_execute(query, timeout, result_sink)
    }

    fn create_index(&mut self, ddl: &str) -> DriverResult<()> {
        (**self).create_index(ddl)
    }

    fn list_managed_indexes(&mut self) -> DriverResult<Vec<String>> {
        (**self).list_managed_indexes()
    }

    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>> {
        (**self).table_cardinalities()
    }

    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        (**self).current_global_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_outcome_accessors() {
        let done = QueryOutcome::Completed {
            elapsed: Duration::from_millis(1500),
        };
        let timed_out = QueryOutcome::TimedOut {
            elapsed: Duration::from_secs(10),
        };
        let failed = QueryOutcome::Failed {
            elapsed: Duration::from_millis(3),
            reason: "relation does not exist".into(),
        };

        assert!(done.is_completed());
        assert!(!timed_out.is_completed());
        assert!(!failed.is_completed());
        assert_eq!(done.elapsed(), Duration::from_millis(1500));
        assert_eq!(failed.elapsed(), Duration::from_millis(3));
    }
}
