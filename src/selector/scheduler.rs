//! Round-based configuration selection
//!
//! Each round tries every configuration under a time budget. An attempt
//! resets the database, applies the configuration, orders the remaining
//! queries by index cost, then runs them (creating indexes as needed) until
//! the budget runs out. Query completions carry over between rounds, so a
//! configuration never re-runs a query it already finished.
//!
//! Once some configuration completes the whole workload, later attempts are
//! only given the time they would need to beat it. With `early_exit` the
//! search stops after the first round in which a configuration completes;
//! this is not exhaustive.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::cluster::cluster_queries;
use crate::driver::{DatabaseDriver, DriverResult, ExclusiveSession, QueryOutcome, ResetPolicy, RetryPolicy};
use crate::model::{Configuration, Index, IndexKey, Query, QueryId, Workload};
use crate::observability::{log_event_with_fields, trace_event, Event, Logger, ObservationScope, Timer};
use crate::ordering::OrderingSolver;
use crate::report::{ExecutionReport, ReportLog};
use crate::resolver::{DependencyResolver, QueryIndexMap, TextualResolver};
use crate::workload::natural_cmp;

use super::errors::{SelectorError, SelectorResult};
use super::options::SelectorOptions;
use super::state::{CompletedConfiguration, SchedulerPhase, SchedulerState};

/// Result of a search run
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub run_id: Uuid,
    /// Fastest completed configuration
    pub best: Option<CompletedConfiguration>,
    /// Every completion, fastest first
    pub completed: Vec<CompletedConfiguration>,
    pub rounds: u32,
    pub state: SchedulerState,
}

/// Per-attempt index bookkeeping
#[derive(Default)]
struct IndexProgress {
    attempted: BTreeSet<IndexKey>,
    created: usize,
    seconds: f64,
}

/// Searches a set of configurations for the one that runs a workload fastest
pub struct ConfigurationSelector {
    options: SelectorOptions,
    configurations: Vec<(String, Configuration)>,
    workload: Workload,
    resolver: Box<dyn DependencyResolver>,
    reports: Box<dyn ReportLog>,
    result_dir: Option<PathBuf>,
    run_id: Uuid,
}

impl ConfigurationSelector {
    /// Validates `options`; configurations are ordered by id
    pub fn new(
        options: SelectorOptions,
        mut configurations: Vec<(String, Configuration)>,
        workload: Workload,
        reports: Box<dyn ReportLog>,
    ) -> SelectorResult<Self> {
        options.validate()?;
        if configurations.is_empty() {
            return Err(SelectorError::NoConfigurations);
        }
        configurations.sort_by(|a, b| natural_cmp(&a.0, &b.0));

        Ok(Self {
            options,
            configurations,
            workload,
            resolver: Box::new(TextualResolver::new()),
            reports,
            result_dir: None,
            run_id: Uuid::new_v4(),
        })
    }

    /// Replace the default textual resolver
    pub fn with_resolver(mut self, resolver: Box<dyn DependencyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Write per-query results under `<dir>/<config_id>/<query_id>.json`
    pub fn with_result_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.result_dir = Some(dir.into());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn options(&self) -> &SelectorOptions {
        &self.options
    }

    /// Run a search with exclusive use of `driver`.
    ///
    /// The database is reset on the way out whether or not the search
    /// succeeded. A failed final reset fails an otherwise successful run.
    pub fn run<D: DatabaseDriver>(&self, driver: D) -> SelectorResult<SelectionOutcome> {
        let reset = ResetPolicy {
            drop_indexes: self.options.drop_indexes,
            restart: true,
        };
        let mut session = ExclusiveSession::acquire(driver, reset, self.options.retry_policy());

        let outcome = self.select(&mut session);
        let released = session.release();

        match (outcome, released) {
            (Ok(outcome), Ok(_)) => Ok(outcome),
            (Ok(_), Err(e)) => Err(SelectorError::driver("final_reset")(e)),
            (Err(e), released) => {
                if let Err(reset_err) = released {
                    Logger::error(
                        "FINAL_RESET_FAILED",
                        &[("code", reset_err.code()), ("error", &reset_err.to_string())],
                    );
                }
                Err(e)
            }
        }
    }

    /// The round loop. Does not perform the final reset; see [`run`](Self::run).
    pub fn select<D: DatabaseDriver>(
        &self,
        session: &mut ExclusiveSession<D>,
    ) -> SelectorResult<SelectionOutcome> {
        let retry = session.retry_policy();
        let driver = session.driver();
        let options = &self.options;

        let run_id = self.run_id.to_string();
        let scope = ObservationScope::with_fields("SELECTION", &[("run_id", &run_id)]);
        let reports = self
            .reports
            .location()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "memory".to_string());
        log_event_with_fields(
            Event::RunBegin,
            &[
                ("run_id", &run_id),
                ("engine", driver.engine()),
                ("configurations", &self.configurations.len().to_string()),
                ("queries", &self.workload.len().to_string()),
                ("max_rounds", &options.max_rounds.to_string()),
                ("early_exit", &options.early_exit.to_string()),
                ("reports", &reports),
            ],
        );

        let result = self.round_loop(driver, retry);
        match &result {
            Ok(outcome) => {
                log_event_with_fields(
                    Event::RunComplete,
                    &[
                        ("run_id", &run_id),
                        ("rounds", &outcome.rounds.to_string()),
                        ("completed", &outcome.completed.len().to_string()),
                    ],
                );
                scope.complete();
            }
            Err(e) => {
                log_event_with_fields(
                    Event::RunAborted,
                    &[("run_id", &run_id), ("code", e.code()), ("error", &e.to_string())],
                );
                scope.fail(&e.to_string());
            }
        }
        result
    }

    fn round_loop<D: DatabaseDriver>(
        &self,
        driver: &mut D,
        retry: RetryPolicy,
    ) -> SelectorResult<SelectionOutcome> {
        let options = &self.options;
        let cardinalities = retry
            .run("table_cardinalities", || driver.table_cardinalities())
            .map_err(SelectorError::driver("table_cardinalities"))?;

        let mut state = SchedulerState::new(options.initial_timeout_secs);
        let mut priority: Vec<usize> = (0..self.configurations.len()).collect();
        let run_timer = Timer::new();

        while state.round() < options.max_rounds {
            state.transition(SchedulerPhase::begin_round)?;
            let round = state.round();
            log_event_with_fields(
                Event::RoundBegin,
                &[
                    ("round", &round.to_string()),
                    ("timeout_secs", &state.current_timeout().to_string()),
                ],
            );

            for &position in &priority {
                let (config_id, config) = &self.configurations[position];
                if !options.early_exit && state.is_config_completed(config_id) {
                    continue;
                }
                let report = self.attempt(
                    driver,
                    retry,
                    &mut state,
                    &cardinalities,
                    (config_id.as_str(), config),
                    round,
                    run_timer,
                )?;
                self.reports.append(&report)?;
            }

            // Stable: ties keep the previous priority
            priority.sort_by_key(|&i| Reverse(state.completed_count(&self.configurations[i].0)));
            let order: Vec<&str> = priority
                .iter()
                .map(|&i| self.configurations[i].0.as_str())
                .collect();
            trace_event(Event::PriorityReordered, &[("order", &order.join(","))]);

            let succeeded = state.best_execution_time().is_some();
            state.transition(|phase| phase.finish_round(succeeded))?;

            if succeeded {
                log_event_with_fields(
                    Event::RoundSucceeded,
                    &[
                        ("round", &round.to_string()),
                        ("completed", &state.completed_configs().len().to_string()),
                    ],
                );
                let all_done = self
                    .configurations
                    .iter()
                    .all(|(id, _)| state.is_config_completed(id));
                if options.early_exit || all_done {
                    break;
                }
            } else {
                log_event_with_fields(Event::RoundExhausted, &[("round", &round.to_string())]);
                let previous = state.current_timeout();
                state.grow_timeout(options.timeout_interval);
                log_event_with_fields(
                    Event::TimeoutGrown,
                    &[
                        ("from_secs", &previous.to_string()),
                        ("to_secs", &state.current_timeout().to_string()),
                    ],
                );
            }
            state.transition(SchedulerPhase::next_round)?;
        }

        state.transition(SchedulerPhase::terminate)?;

        let mut completed = state.completed_configs().to_vec();
        completed.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));
        Ok(SelectionOutcome {
            run_id: self.run_id,
            best: completed.first().cloned(),
            completed,
            rounds: state.round(),
            state,
        })
    }

    /// One configuration attempt within one round
    #[allow(clippy::too_many_arguments)]
    fn attempt<D: DatabaseDriver>(
        &self,
        driver: &mut D,
        retry: RetryPolicy,
        state: &mut SchedulerState,
        cardinalities: &BTreeMap<String, u64>,
        (config_id, config): (&str, &Configuration),
        round: u32,
        run_timer: Timer,
    ) -> SelectorResult<ExecutionReport> {
        let options = &self.options;
        let mut report = ExecutionReport::new(self.run_id, round, config_id);
        log_event_with_fields(
            Event::ConfigAttemptBegin,
            &[
                ("config", config_id),
                ("round", &round.to_string()),
                ("completed_queries", &state.completed_count(config_id).to_string()),
            ],
        );

        // Reset
        let timer = Timer::new();
        retry
            .run("reset_state", || driver.reset_state(options.drop_indexes, false))
            .map_err(SelectorError::driver("reset_state"))?;
        report.round_config_reset_time = timer.elapsed().as_secs_f64();
        trace_event(Event::StateReset, &[("scope", "attempt"), ("config", config_id)]);

        // Dependencies of the queries still to run
        let remaining: Vec<&Query> = self
            .workload
            .queries()
            .iter()
            .filter(|q| !state.is_query_completed(config_id, &q.id))
            .collect();
        let candidates: Vec<Index> = config.indexes().cloned().collect();
        let dependencies = self.resolver.resolve(&remaining, &candidates);

        // Reconfigure
        let timer = Timer::new();
        let settings = config.setting_statements();
        let rejected = retry
            .run("apply_configuration", || {
                driver.apply_configuration(settings, options.restart_on_apply)
            })
            .map_err(SelectorError::driver("apply_configuration"))?;
        report.round_reconfiguration_time = timer.elapsed().as_secs_f64();
        for statement in &rejected {
            log_event_with_fields(
                Event::SettingRejected,
                &[("config", config_id), ("statement", statement)],
            );
        }

        // Order
        let remaining_ids: Vec<QueryId> = remaining.iter().map(|q| q.id.clone()).collect();
        let order = if options.enable_query_scheduler {
            self.schedule(&remaining_ids, &dependencies, cardinalities)?
        } else {
            remaining_ids
        };

        let budget = state.attempt_budget(config_id);

        // An exhausted budget builds nothing
        let mut indexes = IndexProgress::default();
        if options.create_indexes && options.create_all_indexes_first && budget > 0.0 {
            for query in &order {
                for index in dependencies.dependencies(query) {
                    self.create_index(driver, state, config_id, index, &mut indexes)?;
                }
            }
        }

        if let Some(best) = state.best_execution_time() {
            log_event_with_fields(
                Event::BudgetTightened,
                &[
                    ("config", config_id),
                    ("best_secs", &best.to_string()),
                    (
                        "completed_secs",
                        &state.total_completed_query_time(config_id).to_string(),
                    ),
                    ("budget_secs", &budget.to_string()),
                ],
            );
        }

        report.driver_config = snapshot(
            retry.run("current_global_settings", || driver.current_global_settings()),
            "current_global_settings",
        )?;

        // Execute
        let mut remaining_time = budget;
        let mut completed = true;
        let mut round_query_time = 0.0;
        for query_id in &order {
            let Some(query) = self.workload.get(query_id) else {
                continue;
            };

            if remaining_time <= 0.0 {
                completed = false;
                break;
            }

            if options.create_indexes && !options.create_all_indexes_first {
                for index in dependencies.dependencies(query_id) {
                    self.create_index(driver, state, config_id, index, &mut indexes)?;
                }
            }

            trace_event(
                Event::QueryBegin,
                &[
                    ("config", config_id),
                    ("query", query_id),
                    ("timeout_secs", &remaining_time.to_string()),
                ],
            );
            let sink = self
                .result_dir
                .as_ref()
                .map(|dir| dir.join(config_id).join(format!("{}.json", query_id)));
            let timeout = Duration::try_from_secs_f64(remaining_time).unwrap_or(Duration::MAX);
            let outcome = retry
                .run("explain_and_execute", || {
                    driver.explain_and_execute(&query.text, timeout, sink.as_deref())
                })
                .map_err(SelectorError::driver("explain_and_execute"))?;

            let seconds = outcome.elapsed().as_secs_f64();
            round_query_time += seconds;
            remaining_time -= seconds;

            match &outcome {
                QueryOutcome::TimedOut { .. } => {
                    log_event_with_fields(
                        Event::QueryTimeout,
                        &[("config", config_id), ("query", query_id)],
                    );
                    completed = false;
                    break;
                }
                QueryOutcome::Failed { reason, .. } => {
                    log_event_with_fields(
                        Event::QueryFailed,
                        &[("config", config_id), ("query", query_id), ("reason", reason)],
                    );
                    completed = false;
                    break;
                }
                QueryOutcome::Completed { .. } if remaining_time <= 0.0 => {
                    log_event_with_fields(
                        Event::QueryTimeout,
                        &[("config", config_id), ("query", query_id), ("reason", "budget exhausted")],
                    );
                    completed = false;
                    break;
                }
                QueryOutcome::Completed { .. } => {
                    state.record_completed_query(config_id, query_id, seconds);
                    report
                        .round_completed_query_times
                        .insert(query_id.clone(), seconds);
                }
            }
        }

        state.add_query_time(config_id, round_query_time);
        let total = state.total_query_time(config_id);
        if completed {
            let improved = state.record_completed_config(config_id, total);
            log_event_with_fields(
                Event::ConfigCompleted,
                &[
                    ("config", config_id),
                    ("round", &round.to_string()),
                    ("total_secs", &total.to_string()),
                    ("new_best", &improved.to_string()),
                ],
            );
        } else {
            log_event_with_fields(
                Event::ConfigIncomplete,
                &[
                    ("config", config_id),
                    ("round", &round.to_string()),
                    ("completed_queries", &state.completed_count(config_id).to_string()),
                    ("remaining_queries", &(self.workload.len() - state.completed_count(config_id)).to_string()),
                ],
            );
        }

        report.created_indexes = snapshot(
            retry.run("list_managed_indexes", || driver.list_managed_indexes()),
            "list_managed_indexes",
        )?;

        report.total_query_execution_time = total;
        report.total_completed_query_execution_time = state.total_completed_query_time(config_id);
        report.best_execution_time = state.best_execution_time();
        report.duration_seconds = run_timer.elapsed().as_secs_f64();
        report.round_num_indexes_created = indexes.created;
        report.round_index_creation_time = indexes.seconds;
        report.round_query_execution_time = round_query_time;
        report.round_completed_queries = report.round_completed_query_times.len();
        report.queries_completed_total = state.completed_count(config_id);
        report.num_indexes_created_total = state.indexes_created(config_id);
        report.num_indexes_total = config.index_count();
        report.completed = completed;
        report.timeout = budget;
        report.alpha = options.timeout_interval;
        report.applied_settings = settings.to_vec();
        report.rejected_settings = rejected;
        report.report_ts = Utc::now();

        state.adapt_timeout(options.adaptive_timeout, indexes.seconds);
        Ok(report)
    }

    /// Cluster the queries and order the clusters by amortized index cost
    fn schedule(
        &self,
        queries: &[QueryId],
        dependencies: &QueryIndexMap,
        cardinalities: &BTreeMap<String, u64>,
    ) -> SelectorResult<Vec<QueryId>> {
        let clusters = cluster_queries(queries, dependencies, self.options.max_clusters);
        if clusters.len() <= 1 {
            return Ok(clusters.into_iter().flat_map(|c| c.queries).collect());
        }

        let items: Vec<BTreeSet<Index>> = clusters.iter().map(|c| c.indexes.clone()).collect();
        let solver = OrderingSolver::new(self.options.max_order_items)?;
        let solution = solver.solve(&items, |index| index_cost(index, cardinalities), None)?;

        let order: Vec<String> = solution.order.iter().map(|i| i.to_string()).collect();
        Logger::trace(
            "CLUSTERS_ORDERED",
            &[
                ("clusters", &clusters.len().to_string()),
                ("order", &order.join(",")),
                ("cost", &solution.cost.to_string()),
            ],
        );

        Ok(solution
            .order
            .iter()
            .flat_map(|&i| clusters[i].queries.iter().cloned())
            .collect())
    }

    /// Create `index` unless this attempt already tried it. Failures other
    /// than a fatal driver error are logged and skipped.
    fn create_index<D: DatabaseDriver>(
        &self,
        driver: &mut D,
        state: &mut SchedulerState,
        config_id: &str,
        index: &Index,
        progress: &mut IndexProgress,
    ) -> SelectorResult<()> {
        if !progress.attempted.insert(index.key().clone()) {
            return Ok(());
        }

        let timer = Timer::new();
        let result = driver.create_index(&index.create_statement());
        progress.seconds += timer.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                progress.created += 1;
                state.record_index(config_id, index.key().clone());
                trace_event(
                    Event::IndexCreated,
                    &[
                        ("config", config_id),
                        ("index", index.name()),
                        ("elapsed_ms", &timer.elapsed_ms()),
                    ],
                );
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(SelectorError::driver("create_index")(e)),
            Err(e) => {
                log_event_with_fields(
                    Event::IndexCreateFailed,
                    &[
                        ("config", config_id),
                        ("index", index.name()),
                        ("code", e.code()),
                        ("error", &e.to_string()),
                    ],
                );
                Ok(())
            }
        }
    }
}

/// Creation cost of an index: its table's row count, 0 when unknown
fn index_cost(index: &Index, cardinalities: &BTreeMap<String, u64>) -> f64 {
    cardinalities.get(index.table()).copied().unwrap_or(0) as f64
}

/// Report snapshots are best effort unless the driver is unusable
fn snapshot<T: Default>(result: DriverResult<T>, operation: &'static str) -> SelectorResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(SelectorError::driver(operation)(e)),
        Err(e) => {
            Logger::warn(
                "SNAPSHOT_FAILED",
                &[("operation", operation), ("code", e.code()), ("error", &e.to_string())],
            );
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexNameSequence;
    use crate::report::MemoryReportLog;

    fn config(statements: &[&str]) -> Configuration {
        Configuration::parse(statements.iter().copied(), &mut IndexNameSequence::new())
    }

    fn selector(options: SelectorOptions) -> ConfigurationSelector {
        let workload = Workload::new(vec![
            Query::new("q1", "SELECT * FROM orders WHERE o_custkey = 1"),
            Query::new("q2", "SELECT * FROM lineitem WHERE l_partkey = 2"),
            Query::new("q3", "SELECT * FROM orders WHERE o_custkey = 3"),
        ]);
        ConfigurationSelector::new(
            options,
            vec![
                ("c10".into(), config(&["CREATE INDEX a ON orders (o_custkey)"])),
                ("c2".into(), config(&["CREATE INDEX b ON lineitem (l_partkey)"])),
            ],
            workload,
            Box::new(MemoryReportLog::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates() {
        let err = ConfigurationSelector::new(
            SelectorOptions::default(),
            Vec::new(),
            Workload::default(),
            Box::new(MemoryReportLog::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SelectorError::NoConfigurations));

        let bad = SelectorOptions {
            max_rounds: 0,
            ..Default::default()
        };
        let err = ConfigurationSelector::new(
            bad,
            vec![("c".into(), config(&[]))],
            Workload::default(),
            Box::new(MemoryReportLog::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SelectorError::InvalidOptions(_)));
    }

    #[test]
    fn test_configurations_sorted_by_id() {
        let selector = selector(SelectorOptions::default());
        let ids: Vec<&str> = selector.configurations.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c10"]);
    }

    #[test]
    fn test_schedule_groups_shared_index_queries() {
        let selector = selector(SelectorOptions::default());
        let (_, config) = &selector.configurations[1];
        let queries: Vec<&Query> = selector.workload.queries().iter().collect();
        let candidates: Vec<Index> = config.indexes().cloned().collect();
        let deps = selector.resolver.resolve(&queries, &candidates);

        let ids: Vec<QueryId> = queries.iter().map(|q| q.id.clone()).collect();
        let mut cardinalities = BTreeMap::new();
        cardinalities.insert("orders".to_string(), 1_000u64);

        let order = selector.schedule(&ids, &deps, &cardinalities).unwrap();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["q1", "q2", "q3"]);
        let p1 = order.iter().position(|q| q == "q1").unwrap();
        let p3 = order.iter().position(|q| q == "q3").unwrap();
        assert_eq!(p1.abs_diff(p3), 1);
    }

    #[test]
    fn test_index_cost_defaults_to_zero() {
        let mut cardinalities = BTreeMap::new();
        cardinalities.insert("orders".to_string(), 1_500u64);
        assert_eq!(index_cost(&Index::new("a", "orders", "o_custkey"), &cardinalities), 1500.0);
        assert_eq!(index_cost(&Index::new("b", "part", "p_size"), &cardinalities), 0.0);
    }
}
