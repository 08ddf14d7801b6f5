//! CLI command implementation
//!
//! One command: load inputs, connect, search, print the summary. Running
//! out of rounds without any completed configuration is a successful run
//! with a null `best`.

use std::path::Path;

use serde_json::{json, Value};

use crate::driver;
use crate::model::{Configuration, IndexNameSequence};
use crate::observability::Logger;
use crate::report::FileReportLog;
use crate::selector::{ConfigurationSelector, SelectionOutcome};
use crate::workload::{load_candidates, load_queries, Candidate};

use super::args::Cli;
use super::config::TunerConfig;
use super::errors::CliResult;
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and runs the search.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    tune(&cli)
}

/// Run a full configuration search as described by `cli`
pub fn tune(cli: &Cli) -> CliResult<()> {
    let mut config = TunerConfig::load(&cli.config)?;
    config.apply_overrides(cli)?;
    Logger::set_min_severity(config.severity()?);

    let candidates = load_candidates(&cli.configs, config.connection.system)?;
    let configurations = parse_configurations(candidates);
    let workload = load_queries(&cli.query_dir())?;

    let reports = FileReportLog::open(&cli.out)?;
    let reports_path = reports.path().to_path_buf();

    let driver = driver::connect(&config.connection, config.selector.retry_policy())?;
    let selector = ConfigurationSelector::new(
        config.selector.clone(),
        configurations,
        workload,
        Box::new(reports),
    )?
    .with_result_dir(&cli.out);

    let outcome = selector.run(driver)?;
    write_response(summary(&outcome, &reports_path))
}

/// Parse candidates with one shared name sequence so index names are
/// unique across the whole run
pub fn parse_configurations(candidates: Vec<Candidate>) -> Vec<(String, Configuration)> {
    let mut sequence = IndexNameSequence::new();
    candidates
        .into_iter()
        .map(|c| {
            let config = Configuration::parse(&c.statements, &mut sequence);
            (c.id, config)
        })
        .collect()
}

/// The `data` object of the final response
pub fn summary(outcome: &SelectionOutcome, reports: &Path) -> Value {
    json!({
        "run_id": outcome.run_id.to_string(),
        "best": outcome.best,
        "completed": outcome.completed,
        "rounds": outcome.rounds,
        "reports": reports.display().to_string(),
    })
}
