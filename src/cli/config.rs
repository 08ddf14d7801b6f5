//! Tuner configuration file
//!
//! ```json
//! {
//!   "connection": {"system": "postgres", "database": "tpch", "user": "bench"},
//!   "selector": {"max_rounds": 3},
//!   "log_level": "info"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::driver::ConnectionSettings;
use crate::observability::{log_event_with_fields, Event, Severity};
use crate::selector::SelectorOptions;

use super::args::Cli;
use super::errors::{CliError, CliResult};

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub selector: SelectorOptions,

    /// trace | info | warn | error | fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl TunerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("system", config.connection.system.as_str()),
                ("database", &config.connection.database),
            ],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: TunerConfig = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply_overrides(&mut self, cli: &Cli) -> CliResult<()> {
        if let Some(system) = cli.system {
            self.connection.system = system;
        }

        let selector = &mut self.selector;
        if let Some(rounds) = cli.max_rounds {
            selector.max_rounds = rounds;
        }
        if let Some(timeout) = cli.initial_timeout {
            selector.initial_timeout_secs = timeout;
        }
        if let Some(interval) = cli.timeout_interval {
            selector.timeout_interval = interval;
        }
        if cli.no_scheduler || cli.create_indexes_first {
            selector.enable_query_scheduler = false;
        }
        if cli.create_indexes_first {
            selector.create_all_indexes_first = true;
        }
        if cli.no_drop_indexes {
            selector.drop_indexes = false;
        }
        if cli.full {
            selector.early_exit = false;
        }
        if cli.verbose {
            self.log_level = "trace".to_string();
        }

        self.validate()
    }

    /// Validate field values and option combinations
    pub fn validate(&self) -> CliResult<()> {
        if self.connection.database.trim().is_empty() {
            return Err(CliError::config_error("connection.database must not be empty"));
        }
        if self.connection.user.trim().is_empty() {
            return Err(CliError::config_error("connection.user must not be empty"));
        }
        self.severity()?;
        self.selector.validate()?;
        Ok(())
    }

    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level.parse::<Severity>().map_err(CliError::config_error)
    }
}
