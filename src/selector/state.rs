//! Scheduler state
//!
//! `SchedulerState` lives for one search run and is owned by the selector.
//! Invariants:
//! - completed queries per configuration only grow
//! - the best execution time only decreases
//! - the round counter only increases
//!
//! `SchedulerPhase` is the round state machine:
//!
//! ```text
//! Idle -> RunningRound -> RoundSucceeded | RoundExhausted -> Idle | Terminated
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{IndexKey, QueryId};

use super::errors::{SelectorError, SelectorResult};

/// Upper bound of any attempt budget, seconds. Growth saturates here so
/// budgets stay finite in reports.
pub const MAX_TIMEOUT_SECS: f64 = 1.0e9;

/// Round state machine. Transitions consume the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Between rounds; `round` rounds have finished
    Idle { round: u32 },
    RunningRound { round: u32 },
    /// Some configuration has completed the whole workload
    RoundSucceeded { round: u32 },
    /// No configuration has completed yet
    RoundExhausted { round: u32 },
    Terminated { rounds: u32 },
}

impl Default for SchedulerPhase {
    fn default() -> Self {
        SchedulerPhase::Idle { round: 0 }
    }
}

impl SchedulerPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerPhase::Idle { .. } => "Idle",
            SchedulerPhase::RunningRound { .. } => "RunningRound",
            SchedulerPhase::RoundSucceeded { .. } => "RoundSucceeded",
            SchedulerPhase::RoundExhausted { .. } => "RoundExhausted",
            SchedulerPhase::Terminated { .. } => "Terminated",
        }
    }

    /// Rounds started so far
    pub fn round(&self) -> u32 {
        match *self {
            SchedulerPhase::Idle { round }
            | SchedulerPhase::RunningRound { round }
            | SchedulerPhase::RoundSucceeded { round }
            | SchedulerPhase::RoundExhausted { round } => round,
            SchedulerPhase::Terminated { rounds } => rounds,
        }
    }

    fn forbidden(self, to: &'static str) -> SelectorError {
        SelectorError::ForbiddenTransition {
            from: self.name(),
            to,
        }
    }

    /// Idle -> RunningRound
    pub fn begin_round(self) -> SelectorResult<Self> {
        match self {
            SchedulerPhase::Idle { round } => Ok(SchedulerPhase::RunningRound { round: round + 1 }),
            _ => Err(self.forbidden("RunningRound")),
        }
    }

    /// RunningRound -> RoundSucceeded | RoundExhausted
    pub fn finish_round(self, succeeded: bool) -> SelectorResult<Self> {
        match self {
            SchedulerPhase::RunningRound { round } if succeeded => {
                Ok(SchedulerPhase::RoundSucceeded { round })
            }
            SchedulerPhase::RunningRound { round } => Ok(SchedulerPhase::RoundExhausted { round }),
            _ => Err(self.forbidden(if succeeded { "RoundSucceeded" } else { "RoundExhausted" })),
        }
    }

    /// RoundSucceeded | RoundExhausted -> Idle
    pub fn next_round(self) -> SelectorResult<Self> {
        match self {
            SchedulerPhase::RoundSucceeded { round } | SchedulerPhase::RoundExhausted { round } => {
                Ok(SchedulerPhase::Idle { round })
            }
            _ => Err(self.forbidden("Idle")),
        }
    }

    /// Idle | RoundSucceeded | RoundExhausted -> Terminated
    pub fn terminate(self) -> SelectorResult<Self> {
        match self {
            SchedulerPhase::Idle { round }
            | SchedulerPhase::RoundSucceeded { round }
            | SchedulerPhase::RoundExhausted { round } => {
                Ok(SchedulerPhase::Terminated { rounds: round })
            }
            _ => Err(self.forbidden("Terminated")),
        }
    }
}

/// A configuration that ran the whole workload, with its total time
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletedConfiguration {
    pub config_id: String,
    pub seconds: f64,
}

/// Mutable bookkeeping of one search run. Times are in seconds.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    completed_queries: BTreeMap<String, Vec<QueryId>>,
    total_query_time: BTreeMap<String, f64>,
    total_completed_query_time: BTreeMap<String, f64>,
    best_execution_time: Option<f64>,
    current_timeout: f64,
    indexes_created: BTreeMap<String, BTreeSet<IndexKey>>,
    completed_configs: Vec<CompletedConfiguration>,
    phase: SchedulerPhase,
}

impl SchedulerState {
    pub fn new(initial_timeout_secs: f64) -> Self {
        Self {
            current_timeout: initial_timeout_secs.min(MAX_TIMEOUT_SECS),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.phase.round()
    }

    pub(crate) fn transition(
        &mut self,
        step: impl FnOnce(SchedulerPhase) -> SelectorResult<SchedulerPhase>,
    ) -> SelectorResult<()> {
        self.phase = step(self.phase)?;
        Ok(())
    }

    pub fn current_timeout(&self) -> f64 {
        self.current_timeout
    }

    pub fn best_execution_time(&self) -> Option<f64> {
        self.best_execution_time
    }

    pub fn completed_queries(&self, config: &str) -> &[QueryId] {
        self.completed_queries
            .get(config)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn completed_count(&self, config: &str) -> usize {
        self.completed_queries(config).len()
    }

    pub fn is_query_completed(&self, config: &str, query: &str) -> bool {
        self.completed_queries(config).iter().any(|q| q == query)
    }

    pub fn total_query_time(&self, config: &str) -> f64 {
        self.total_query_time.get(config).copied().unwrap_or(0.0)
    }

    pub fn total_completed_query_time(&self, config: &str) -> f64 {
        self.total_completed_query_time
            .get(config)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn indexes_created(&self, config: &str) -> usize {
        self.indexes_created.get(config).map_or(0, BTreeSet::len)
    }

    /// Configurations that completed, in completion order
    pub fn completed_configs(&self) -> &[CompletedConfiguration] {
        &self.completed_configs
    }

    pub fn is_config_completed(&self, config: &str) -> bool {
        self.completed_configs.iter().any(|c| c.config_id == config)
    }

    /// Budget for the next attempt of `config`.
    ///
    /// Before any configuration completes this is the current timeout.
    /// Afterwards it is the margin `config` has left to beat the best time,
    /// clamped at zero, and the current timeout follows it.
    pub fn attempt_budget(&mut self, config: &str) -> f64 {
        if let Some(best) = self.best_execution_time {
            self.current_timeout = (best - self.total_completed_query_time(config)).max(0.0);
        }
        self.current_timeout
    }

    /// Record a query that finished within budget. Recording twice is a no-op.
    pub fn record_completed_query(&mut self, config: &str, query: &str, seconds: f64) {
        if self.is_query_completed(config, query) {
            return;
        }
        self.completed_queries
            .entry(config.to_string())
            .or_default()
            .push(query.to_string());
        *self
            .total_completed_query_time
            .entry(config.to_string())
            .or_default() += seconds;
    }

    /// Add an attempt's query time, timed-out work included
    pub fn add_query_time(&mut self, config: &str, seconds: f64) {
        *self.total_query_time.entry(config.to_string()).or_default() += seconds;
    }

    pub fn record_index(&mut self, config: &str, key: IndexKey) {
        self.indexes_created
            .entry(config.to_string())
            .or_default()
            .insert(key);
    }

    /// Mark `config` as having run the whole workload in `seconds`.
    /// Returns whether that improved the best time.
    pub fn record_completed_config(&mut self, config: &str, seconds: f64) -> bool {
        self.completed_configs.push(CompletedConfiguration {
            config_id: config.to_string(),
            seconds,
        });
        match self.best_execution_time {
            Some(best) if best <= seconds => false,
            _ => {
                self.best_execution_time = Some(seconds);
                true
            }
        }
    }

    /// Raise the timeout to `index_creation_secs` if it is smaller, then
    /// pin it to the best time once one exists.
    pub fn adapt_timeout(&mut self, adaptive: bool, index_creation_secs: f64) {
        if adaptive && self.current_timeout < index_creation_secs {
            self.current_timeout = index_creation_secs;
        }
        if let Some(best) = self.best_execution_time {
            self.current_timeout = best;
        }
    }

    /// Multiply the timeout by `factor`, saturating at [`MAX_TIMEOUT_SECS`]
    pub fn grow_timeout(&mut self, factor: f64) {
        self.current_timeout = (self.current_timeout * factor).min(MAX_TIMEOUT_SECS);
    }
}
