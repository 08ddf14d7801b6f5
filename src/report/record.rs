//! Execution report record
//!
//! One record per (round, configuration) attempt. Times are in seconds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::QueryId;

/// Outcome of one configuration attempt within one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Shared by every report of one search run
    pub run_id: Uuid,
    /// 1-based round number
    pub round: u32,
    pub config_id: String,

    /// Cumulative query time for this configuration, timed-out work included
    pub total_query_execution_time: f64,
    /// Cumulative time of completed queries only
    pub total_completed_query_execution_time: f64,
    /// Best complete-workload time seen so far; `None` until one completes
    pub best_execution_time: Option<f64>,
    /// Wall-clock seconds since the run started
    pub duration_seconds: f64,

    pub start_time: DateTime<Utc>,
    pub report_ts: DateTime<Utc>,

    pub round_num_indexes_created: usize,
    pub round_index_creation_time: f64,
    pub round_query_execution_time: f64,
    pub round_completed_queries: usize,
    pub round_config_reset_time: f64,
    pub round_reconfiguration_time: f64,

    pub queries_completed_total: usize,
    pub num_indexes_created_total: usize,
    pub num_indexes_total: usize,

    /// Every remaining query finished within the budget
    pub completed: bool,
    /// Time budget this attempt started with
    pub timeout: f64,
    /// Multiplicative timeout growth factor
    pub alpha: f64,

    /// Global settings reported by the engine after reconfiguration
    pub driver_config: BTreeMap<String, String>,
    pub applied_settings: Vec<String>,
    #[serde(default)]
    pub rejected_settings: Vec<String>,
    /// Indexes present in the database at report time
    pub created_indexes: Vec<String>,
    pub round_completed_query_times: BTreeMap<QueryId, f64>,
}

impl ExecutionReport {
    /// Empty report for `config_id`; the scheduler fills in the rest
    pub fn new(run_id: Uuid, round: u32, config_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            round,
            config_id: config_id.into(),
            total_query_execution_time: 0.0,
            total_completed_query_execution_time: 0.0,
            best_execution_time: None,
            duration_seconds: 0.0,
            start_time: now,
            report_ts: now,
            round_num_indexes_created: 0,
            round_index_creation_time: 0.0,
            round_query_execution_time: 0.0,
            round_completed_queries: 0,
            round_config_reset_time: 0.0,
            round_reconfiguration_time: 0.0,
            queries_completed_total: 0,
            num_indexes_created_total: 0,
            num_indexes_total: 0,
            completed: false,
            timeout: 0.0,
            alpha: 0.0,
            driver_config: BTreeMap::new(),
            applied_settings: Vec::new(),
            rejected_settings: Vec::new(),
            created_indexes: Vec::new(),
            round_completed_query_times: BTreeMap::new(),
        }
    }
}
