//! PostgreSQL driver over `psql`
//!
//! Settings are applied with `ALTER SYSTEM` and picked up by a config
//! reload; settings that need a restart take effect only when the caller
//! asks for one. Query timeouts use `statement_timeout`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::observability::Logger;

use super::client::{
    classify_failure, parse_pairs, quote_ident, run_restart, write_result_sink, ClientCommand,
};
use super::connection::ConnectionSettings;
use super::errors::{DriverError, DriverResult};
use super::retry::RetryPolicy;
use super::{DatabaseDriver, QueryOutcome};

const CONNECTION_MARKERS: &[&str] = &[
    "could not connect to server",
    "connection to server",
    "Connection refused",
    "the database system is starting up",
    "the database system is shutting down",
    "server closed the connection unexpectedly",
    "terminating connection",
];

const TIMEOUT_MARKER: &str = "canceling statement due to statement timeout";

const MANAGED_INDEXES_SQL: &str = "SELECT i.indexname FROM pg_indexes i \
     WHERE i.schemaname = current_schema() \
     AND NOT EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conname = i.indexname) \
     ORDER BY i.indexname";

const CARDINALITIES_SQL: &str = "SELECT c.relname, GREATEST(c.reltuples, 0)::bigint \
     FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE c.relkind = 'r' AND n.nspname = current_schema()";

/// PostgreSQL driver
#[derive(Debug, Clone)]
pub struct PostgresDriver {
    client: ClientCommand,
    restart_command: Vec<String>,
    restart_wait: Duration,
    readiness: RetryPolicy,
}

impl PostgresDriver {
    pub fn new(settings: &ConnectionSettings) -> Self {
        let mut client = ClientCommand::new(settings.client_program())
            .arg("-X")
            .arg("-q")
            .arg("-A")
            .arg("-t")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-d")
            .arg(settings.database.clone())
            .arg("-U")
            .arg(settings.user.clone());
        if let Some(host) = &settings.host {
            client = client.arg("-h").arg(host.clone());
        }
        if let Some(port) = settings.port {
            client = client.arg("-p").arg(port.to_string());
        }
        if let Some(password) = &settings.password {
            client = client.env("PGPASSWORD", password.clone());
        }

        Self {
            client,
            restart_command: settings.restart_command.clone(),
            restart_wait: settings.restart_wait(),
            readiness: RetryPolicy::default(),
        }
    }

    /// Create the driver and wait until the server accepts connections
    pub fn connect(settings: &ConnectionSettings, retry: RetryPolicy) -> DriverResult<Self> {
        let mut driver = Self::new(settings);
        driver.readiness = retry;
        driver.wait_until_ready()?;
        Logger::info(
            "DRIVER_CONNECTED",
            &[("engine", "postgres"), ("database", &settings.database)],
        );
        Ok(driver)
    }

    /// Run statements in one session, stopping at the first error
    fn exec(&self, statements: &[&str]) -> DriverResult<String> {
        let args: Vec<String> = statements
            .iter()
            .flat_map(|s| ["-c".to_string(), s.to_string()])
            .collect();
        let output = self.client.run(&args)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(classify_failure(&output.stderr, CONNECTION_MARKERS))
        }
    }

    fn wait_until_ready(&self) -> DriverResult<()> {
        self.readiness.run("wait_until_ready", || self.exec(&["SELECT 1"]).map(|_| ()))
    }

    fn restart(&self) -> DriverResult<()> {
        run_restart(&self.restart_command, self.restart_wait)?;
        self.wait_until_ready()
    }

    fn drop_index(&self, name: &str) {
        let ddl = format!("DROP INDEX IF EXISTS {}", quote_ident(name, '"'));
        if let Err(e) = self.exec(&[ddl.as_str()]) {
            Logger::warn("INDEX_DROP_FAILED", &[("index", name), ("error", &e.to_string())]);
        }
    }
}

/// Duration reported by `\timing`, e.g. `Time: 12.345 ms`
fn parse_timing(stdout: &str) -> Option<Duration> {
    let line = stdout.lines().rev().find(|l| l.starts_with("Time: "))?;
    let millis: f64 = line
        .trim_start_matches("Time: ")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    Some(Duration::from_micros((millis * 1000.0).round() as u64))
}

impl DatabaseDriver for PostgresDriver {
    fn engine(&self) -> &str {
        "postgres"
    }

    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()> {
        if drop_managed_indexes {
            for name in self.list_managed_indexes()? {
                self.drop_index(&name);
            }
        }
        self.exec(&["ALTER SYSTEM RESET ALL", "SELECT pg_reload_conf()"])?;
        if restart {
            self.restart()?;
        }
        Ok(())
    }

    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>> {
        let mut rejected = Vec::new();
        for statement in settings {
            match self.exec(&[statement.as_str()]) {
                Ok(_) => {}
                Err(e) if e.is_soft() => {
                    Logger::trace(
                        "SETTING_APPLY_FAILED",
                        &[("statement", statement.as_str()), ("error", &e.to_string())],
                    );
                    rejected.push(statement.clone());
                }
                Err(e) => return Err(e),
            }
        }
        self.exec(&["SELECT pg_reload_conf()"])?;
        if restart {
            self.restart()?;
        }
        Ok(rejected)
    }

    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome> {
        // statement_timeout = 0 disables the timeout
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128);
        if timeout_ms == 0 {
            return Ok(QueryOutcome::TimedOut {
                elapsed: Duration::ZERO,
            });
        }

        let explain = format!("EXPLAIN (FORMAT JSON) {}", query);
        let plan: Option<serde_json::Value> = match result_sink {
            Some(_) => self
                .exec(&[explain.as_str()])
                .ok()
                .and_then(|out| serde_json::from_str(out.trim()).ok()),
            None => None,
        };

        let set_timeout = format!("SET statement_timeout = {}", timeout_ms);
        let args: Vec<String> = ["\\timing on", set_timeout.as_str(), query]
            .iter()
            .flat_map(|s| ["-c".to_string(), s.to_string()])
            .collect();
        let output = self.client.run(&args)?;

        let outcome = if output.success {
            QueryOutcome::Completed {
                elapsed: parse_timing(&output.stdout).unwrap_or(output.elapsed),
            }
        } else if output.stderr.contains(TIMEOUT_MARKER) {
            QueryOutcome::TimedOut { elapsed: timeout }
        } else {
            match classify_failure(&output.stderr, CONNECTION_MARKERS) {
                DriverError::Statement(reason) => QueryOutcome::Failed {
                    elapsed: output.elapsed,
                    reason,
                },
                other => return Err(other),
            }
        };

        if let Some(path) = result_sink {
            write_result_sink(path, query, &outcome, plan);
        }
        Ok(outcome)
    }

    fn create_index(&mut self, ddl: &str) -> DriverResult<()> {
        self.exec(&[ddl]).map(|_| ())
    }

    fn list_managed_indexes(&mut self) -> DriverResult<Vec<String>> {
        let stdout = self.exec(&[MANAGED_INDEXES_SQL])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>> {
        let stdout = self.exec(&["ANALYZE", CARDINALITIES_SQL])?;
        parse_pairs(&stdout, '|')
            .into_iter()
            .map(|(table, rows)| {
                rows.parse::<u64>()
                    .map(|rows| (table.clone(), rows))
                    .map_err(|_| DriverError::Protocol(format!("row count '{}' for {}", rows, table)))
            })
            .collect()
    }

    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        let stdout = self.exec(&["SELECT name, setting FROM pg_settings"])?;
        Ok(parse_pairs(&stdout, '|').into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::connection::Engine;

    #[test]
    fn test_parse_timing() {
        let stdout = "Timing is on.\n 42\nTime: 12.500 ms\n";
        assert_eq!(parse_timing(stdout), Some(Duration::from_micros(12_500)));
        assert_eq!(parse_timing("Time: 1500.000 ms (00:01.500)\n"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timing("no timing here"), None);
    }

    #[test]
    fn test_missing_client_is_fatal() {
        let mut settings = ConnectionSettings::new(Engine::Postgres, "tpch", "bench");
        settings.client_path = Some("/nonexistent/psql".into());
        let err = PostgresDriver::connect(&settings, RetryPolicy::none()).unwrap_err();
        assert!(matches!(err, DriverError::Client(_)));
    }

    #[test]
    fn test_zero_timeout_never_runs() {
        let mut settings = ConnectionSettings::new(Engine::Postgres, "tpch", "bench");
        settings.client_path = Some("/nonexistent/psql".into());
        let mut driver = PostgresDriver::new(&settings);
        let outcome = driver
            .explain_and_execute("SELECT 1", Duration::ZERO, None)
            .unwrap();
        assert_eq!(outcome, QueryOutcome::TimedOut { elapsed: Duration::ZERO });
    }
}
