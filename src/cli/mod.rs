//! CLI module for lambdatune
//!
//! Loads the tuner config file, applies flag overrides, runs the search and
//! prints a single JSON summary to stdout.

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::Cli;
pub use commands::{parse_configurations, run, summary, tune};
pub use config::TunerConfig;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
