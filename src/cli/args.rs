//! CLI argument definitions using clap
//!
//! ```text
//! lambdatune --benchmark tpch --system postgres --configs configs/tpch --out out/tpch
//! ```
//!
//! Every flag that has a counterpart in the config file overrides it.

use clap::Parser;
use std::path::PathBuf;

use crate::driver::Engine;

/// lambdatune - picks the database configuration that runs a workload fastest
#[derive(Parser, Debug)]
#[command(name = "lambdatune")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./lambdatune.json")]
    pub config: PathBuf,

    /// Workload name (tpch, tpcds, job, ...)
    #[arg(long, short = 'b')]
    pub benchmark: String,

    /// Target database system
    #[arg(long, short = 's')]
    pub system: Option<Engine>,

    /// Directory of candidate configuration files
    #[arg(long)]
    pub configs: PathBuf,

    /// Directory of `*.sql` query files [default: queries/<benchmark>]
    #[arg(long)]
    pub queries: Option<PathBuf>,

    /// Output directory for reports and per-query results
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Time budget of the first round, seconds
    #[arg(long)]
    pub initial_timeout: Option<f64>,

    /// Factor the budget grows by after a round without completions
    #[arg(long)]
    pub timeout_interval: Option<f64>,

    /// Run queries in workload order instead of clustering by index cost
    #[arg(long)]
    pub no_scheduler: bool,

    /// Create every index before the first query (implies --no-scheduler)
    #[arg(long)]
    pub create_indexes_first: bool,

    /// Keep indexes when resetting between attempts
    #[arg(long)]
    pub no_drop_indexes: bool,

    /// Keep evaluating after a configuration completes
    #[arg(long)]
    pub full: bool,

    /// Log at TRACE level
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Query directory, defaulting to `queries/<benchmark>`
    pub fn query_dir(&self) -> PathBuf {
        self.queries
            .clone()
            .unwrap_or_else(|| PathBuf::from("queries").join(&self.benchmark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["lambdatune"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_minimal_args() {
        let cli = parse(&["--benchmark", "tpch", "--configs", "cfg", "--out", "out"]);
        assert_eq!(cli.config, PathBuf::from("./lambdatune.json"));
        assert_eq!(cli.system, None);
        assert_eq!(cli.query_dir(), PathBuf::from("queries/tpch"));
        assert!(!cli.full);
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "-b", "job", "-s", "mysql", "--configs", "c", "-o", "o", "--queries", "q",
            "--max-rounds", "3", "--initial-timeout", "2.5", "--no-scheduler", "--full",
        ]);
        assert_eq!(cli.system, Some(Engine::Mysql));
        assert_eq!(cli.query_dir(), PathBuf::from("q"));
        assert_eq!(cli.max_rounds, Some(3));
        assert_eq!(cli.initial_timeout, Some(2.5));
        assert!(cli.no_scheduler && cli.full);
    }

    #[test]
    fn test_rejects_unknown_system() {
        let result = Cli::try_parse_from([
            "lambdatune", "-b", "tpch", "-s", "oracle", "--configs", "c", "-o", "o",
        ]);
        assert!(result.is_err());
    }
}
