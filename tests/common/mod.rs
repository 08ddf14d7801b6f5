//! Shared helpers for the integration tests
//!
//! `ScriptedDriver` is an in-memory `DatabaseDriver`. Each configuration is
//! recognized by a `SET lambdatune.tag = '<id>'` setting, and each query's
//! run time under a configuration is scripted in seconds. A query whose
//! scripted time exceeds the timeout it is given comes back as timed out
//! after exactly that timeout, the way an engine-side statement timeout
//! would behave.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use lambdatune::driver::{DatabaseDriver, DriverError, DriverResult, QueryOutcome};
use lambdatune::model::{Configuration, Index, IndexNameSequence, Query, Workload};
use lambdatune::selector::SelectorOptions;

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reset { drop_indexes: bool, restart: bool },
    Apply { config: String, restart: bool },
    Execute { config: String, query: String, timeout_secs: f64 },
    CreateIndex { config: String, ddl: String },
}

pub struct ScriptedDriver {
    calls: Vec<Call>,
    query_ids: HashMap<String, String>,
    durations: HashMap<(String, String), f64>,
    default_secs: f64,
    current: String,
    indexes: BTreeSet<String>,
    cardinalities: BTreeMap<String, u64>,
    reset_failures: VecDeque<DriverError>,
    execute_failures: VecDeque<DriverError>,
    create_index_failures: VecDeque<DriverError>,
    query_failures: HashMap<(String, String), String>,
    index_delay: Duration,
}

impl ScriptedDriver {
    /// Every query takes one second unless scripted otherwise
    pub fn new(workload: &Workload) -> Self {
        Self {
            calls: Vec::new(),
            query_ids: workload
                .queries()
                .iter()
                .map(|q| (q.text.clone(), q.id.clone()))
                .collect(),
            durations: HashMap::new(),
            default_secs: 1.0,
            current: String::new(),
            indexes: BTreeSet::new(),
            cardinalities: BTreeMap::new(),
            reset_failures: VecDeque::new(),
            execute_failures: VecDeque::new(),
            create_index_failures: VecDeque::new(),
            query_failures: HashMap::new(),
            index_delay: Duration::ZERO,
        }
    }

    /// Run time of `query` under configuration `config`
    pub fn script(&mut self, config: &str, query: &str, secs: f64) -> &mut Self {
        self.durations
            .insert((config.to_string(), query.to_string()), secs);
        self
    }

    pub fn cardinality(&mut self, table: &str, rows: u64) -> &mut Self {
        self.cardinalities.insert(table.to_string(), rows);
        self
    }

    /// Make the next `reset_state` call fail with `error`
    pub fn fail_reset(&mut self, error: DriverError) -> &mut Self {
        self.reset_failures.push_back(error);
        self
    }

    /// Make the next `explain_and_execute` call fail with `error`
    pub fn fail_execute(&mut self, error: DriverError) -> &mut Self {
        self.execute_failures.push_back(error);
        self
    }

    /// Make the next `create_index` call fail with `error`
    pub fn fail_create_index(&mut self, error: DriverError) -> &mut Self {
        self.create_index_failures.push_back(error);
        self
    }

    /// `query` under `config` is rejected by the engine after its scripted time
    pub fn fail_query(&mut self, config: &str, query: &str, reason: &str) -> &mut Self {
        self.query_failures
            .insert((config.to_string(), query.to_string()), reason.to_string());
        self
    }

    /// Wall-clock time every index build takes
    pub fn index_delay(&mut self, delay: Duration) -> &mut Self {
        self.index_delay = delay;
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn last_call(&self) -> Option<&Call> {
        self.calls.last()
    }

    /// `(config, query, timeout_secs)` of every execution, in order
    pub fn executions(&self) -> Vec<(String, String, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute {
                    config,
                    query,
                    timeout_secs,
                } => Some((config.clone(), query.clone(), *timeout_secs)),
                _ => None,
            })
            .collect()
    }

    pub fn index_ddl(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateIndex { config, ddl } => Some((config.clone(), ddl.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn live_indexes(&self) -> &BTreeSet<String> {
        &self.indexes
    }
}

impl DatabaseDriver for ScriptedDriver {
    fn engine(&self) -> &str {
        "scripted"
    }

    fn reset_state(&mut self, drop_managed_indexes: bool, restart: bool) -> DriverResult<()> {
        self.calls.push(Call::Reset {
            drop_indexes: drop_managed_indexes,
            restart,
        });
        if let Some(error) = self.reset_failures.pop_front() {
            return Err(error);
        }
        if drop_managed_indexes {
            self.indexes.clear();
        }
        self.current.clear();
        Ok(())
    }

    fn apply_configuration(&mut self, settings: &[String], restart: bool) -> DriverResult<Vec<String>> {
        self.current = settings
            .iter()
            .find(|s| s.contains("lambdatune.tag"))
            .and_then(|s| s.split('\'').nth(1))
            .unwrap_or_default()
            .to_string();
        self.calls.push(Call::Apply {
            config: self.current.clone(),
            restart,
        });
        Ok(settings
            .iter()
            .filter(|s| s.contains("bogus"))
            .cloned()
            .collect())
    }

    fn explain_and_execute(
        &mut self,
        query: &str,
        timeout: Duration,
        result_sink: Option<&Path>,
    ) -> DriverResult<QueryOutcome> {
        let id = self.query_ids.get(query).cloned().unwrap_or_default();
        let timeout_secs = timeout.as_secs_f64();
        self.calls.push(Call::Execute {
            config: self.current.clone(),
            query: id.clone(),
            timeout_secs,
        });
        if let Some(error) = self.execute_failures.pop_front() {
            return Err(error);
        }

        let secs = self
            .durations
            .get(&(self.current.clone(), id.clone()))
            .copied()
            .unwrap_or(self.default_secs);
        let failure = self.query_failures.get(&(self.current.clone(), id.clone()));
        let outcome = if secs > timeout_secs {
            QueryOutcome::TimedOut { elapsed: timeout }
        } else if let Some(reason) = failure {
            QueryOutcome::Failed {
                elapsed: Duration::from_secs_f64(secs),
                reason: reason.clone(),
            }
        } else {
            QueryOutcome::Completed {
                elapsed: Duration::from_secs_f64(secs),
            }
        };

        if let Some(path) = result_sink {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            let body = serde_json::json!({"query": id, "completed": outcome.is_completed()});
            fs::write(path, body.to_string()).unwrap();
        }
        Ok(outcome)
    }

    fn create_index(&mut self, ddl: &str) -> DriverResult<()> {
        self.calls.push(Call::CreateIndex {
            config: self.current.clone(),
            ddl: ddl.to_string(),
        });
        thread::sleep(self.index_delay);
        if let Some(error) = self.create_index_failures.pop_front() {
            return Err(error);
        }
        let index = Index::parse(ddl)
            .ok_or_else(|| DriverError::Statement(format!("syntax error: {}", ddl)))?;
        self.indexes.insert(index.name().to_string());
        Ok(())
    }

    fn list_managed_indexes(&mut self) -> DriverResult<Vec<String>> {
        Ok(self.indexes.iter().cloned().collect())
    }

    fn table_cardinalities(&mut self) -> DriverResult<BTreeMap<String, u64>> {
        Ok(self.cardinalities.clone())
    }

    fn current_global_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        let mut settings = BTreeMap::new();
        settings.insert("lambdatune.tag".to_string(), self.current.clone());
        Ok(settings)
    }
}

/// `SET lambdatune.tag = '<id>'`, the statement the scripted driver
/// identifies configurations by
pub fn tag(id: &str) -> String {
    format!("SET lambdatune.tag = '{}'", id)
}

/// Configurations from `(id, extra statements)`, parsed with one name sequence
pub fn configurations(specs: &[(&str, &[&str])]) -> Vec<(String, Configuration)> {
    let mut sequence = IndexNameSequence::new();
    specs
        .iter()
        .map(|(id, extra)| {
            let mut statements = vec![tag(id)];
            statements.extend(extra.iter().map(|s| s.to_string()));
            (id.to_string(), Configuration::parse(&statements, &mut sequence))
        })
        .collect()
}

pub fn workload(queries: &[(&str, &str)]) -> Workload {
    Workload::new(queries.iter().map(|(id, text)| Query::new(*id, *text)))
}

/// Deterministic options: workload order, no adaptive widening, no backoff
pub fn plain_options() -> SelectorOptions {
    SelectorOptions {
        enable_query_scheduler: false,
        adaptive_timeout: false,
        retry_backoff_ms: 0,
        ..Default::default()
    }
}
