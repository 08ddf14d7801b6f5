//! MySQL driver over the `mysql` client
//!
//! `SET GLOBAL` values do not survive a restart, so when a configuration is
//! applied with `restart` the server is restarted first and the settings
//! are applied afterwards. Query timeouts use `max_execution_time`, which
//! MySQL enforces for read-only SELECT statements only.

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
    "ERROR 2002",
    "ERROR 2003",
    "ERROR 2006",
    "ERROR 2013",
    "Can't connect to",
    "Lost connection to",
    "server has gone away",
];

const TIMEOUT_MARKERS: &[&str] = &["ERROR 3024", "maximum statement execution time exceeded"];

const MANAGED_INDEXES_SQL: &str = "SELECT DISTINCT table_name, index_name \
     FROM information_schema.statistics \
     WHERE table_schema = DATABASE() AND index_name <> 'PRIMARY' AND non_unique = 1 \
     ORDER BY table_name, index_name";

const CARDINALITIES_SQL: &str = "SELECT table_name, COALESCE(table_rows, 0) \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'";

/// MySQL driver
#[derive(Debug, Clone)]
pub struct MySqlDriver {
    client: ClientCommand,
    restart_command: Vec<String>,
    restart_wait: Duration,
    readiness: RetryPolicy,
}

impl MySqlDriver {
    pub fn new(settings: &ConnectionSettings) -> Self {
        let mut client = ClientCommand::new(settings.client_program())
            .arg("--batch")
            .arg("--skip-column-names")
            .arg(format!("--user={}", settings.user))
            .arg(format!("--database={}", settings.database));
        if let Some(host) = &settings.host {
            client = client.arg(format!("--host={}", host));
        }
        if let Some(port) = settings.port {
            client = client.arg(format!("--port={}", port));
        }
        if let Some(password) = &settings.password {
            client = client.env("MYSQL_PWD", password.clone());
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
            &[("engine", "mysql"), ("database", &settings.database)],
        );
        Ok(driver)
    }

    /// Run statements in one session; the client stops at the first error
    fn exec(&self, statements: &[&str]) -> DriverResult<String> {
        let script = join_statements(statements);
        let output = self.client.run(&["--execute".to_string(), script])?;
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

    fn managed_indexes(&self) -> DriverResult<Vec<(String, String)>> {
        let stdout = self.exec(&[MANAGED_INDEXES_SQL])?;
        Ok(parse_pairs(&stdout, '\t'))
    }
}

fn join_statements(statements: &[&str]) -> String {
    statements
        .iter()
        .map(|s| s.trim().trim_end_matches(';').trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(";\n")
}

impl DatabaseDriver for MySqlDriver {
    fn engine(&self) -> &str {
        "mysql"
    }

    /// MySQL has no global counterpart to `ALTER SYSTEM RESET ALL`: persisted
    /// values are cleared, but plain `SET GLOBAL` values only go away with a
    /// restart.
    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()> {
        if drop_managed_indexes {
            for (table, index) in self.managed_indexes()? {
                let ddl = format!(
                    "ALTER TABLE {} DROP INDEX {}",
                    quote_ident(&table, '`'),
                    quote_ident(&index, '`')
                );
                if let Err(e) = self.exec(&[ddl.as_str()]) {
                    if !e.is_soft() {
                        return Err(e);
                    }
                    Logger::warn("INDEX_DROP_FAILED", &[("index", &index), ("error", &e.to_string())]);
                }
            }
        }

        match self.exec(&["RESET PERSIST"]) {
            Ok(_) => {}
            Err(e) if e.is_soft() => {
                Logger::trace("RESET_PERSIST_FAILED", &[("error", &e.to_string())]);
            }
            Err(e) => return Err(e),
        }

        if restart {
            self.restart()?;
        }
        Ok(())
    }

    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>> {
        if restart {
            self.restart()?;
        }

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
        Ok(rejected)
    }

    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome> {
        // max_execution_time = 0 disables the timeout
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128);
        if timeout_ms == 0 {
            return Ok(QueryOutcome::TimedOut {
                elapsed: Duration::ZERO,
            });
        }

        let explain = format!("EXPLAIN FORMAT=JSON {}", query);
        let plan: Option<serde_json::Value> = match result_sink {
            Some(_) => self
                .exec(&[explain.as_str()])
                .ok()
                .map(|out| serde_json::Value::String(out.trim().to_string())),
            None => None,
        };

        let set_timeout = format!("SET SESSION max_execution_time = {}", timeout_ms);
        let script = join_statements(&[set_timeout.as_str(), query]);
        let output = self.client.run(&["--execute".to_string(), script])?;

        let outcome = if output.success {
            QueryOutcome::Completed {
                elapsed: output.elapsed,
            }
        } else if TIMEOUT_MARKERS.iter().any(|m| output.stderr.contains(m)) {
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
        Ok(self
            .managed_indexes()?
            .into_iter()
            .map(|(table, index)| format!("{}.{}", table, index))
            .collect())
    }

    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>> {
        let stdout = self.exec(&[CARDINALITIES_SQL])?;
        parse_pairs(&stdout, '\t')
            .into_iter()
            .map(|(table, rows)| {
                rows.parse::<u64>()
                    .map(|rows| (table.clone(), rows))
                    .map_err(|_| DriverError::Protocol(format!("row count '{}' for {}", rows, table)))
            })
            .collect()
    }

    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        let stdout = self.exec(&["SHOW GLOBAL VARIABLES"])?;
        Ok(parse_pairs(&stdout, '\t').into_iter().collect())
    }
}
