//! Command-line client runner shared by the engine drivers

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use crate::observability::Logger;

use super::errors::{DriverError, DriverResult};
use super::QueryOutcome;

/// Captured output of one client invocation
#[derive(Debug, Clone)]
pub(crate) struct ClientOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// A database client program with fixed connection arguments
#[derive(Debug, Clone)]
pub(crate) struct ClientCommand {
    program: PathBuf,
    base_args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ClientCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.base_args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the client with `extra_args` appended to the connection arguments.
    ///
    /// A non-zero exit is reported through `ClientOutput::success`; only a
    /// missing or unlaunchable program is an error here.
    pub fn run(&self, extra_args: &[String]) -> DriverResult<ClientOutput> {
        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(extra_args);
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let start = Instant::now();
        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                DriverError::Client(format!("{} not found", self.program.display()))
            }
            _ => DriverError::Client(format!("{}: {}", self.program.display(), e)),
        })?;
        let elapsed = start.elapsed();

        Ok(ClientOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            elapsed,
        })
    }
}

/// Run an external restart command, then wait for the engine to come up.
///
/// An empty command means restarts are not configured; that is logged and
/// treated as success.
pub(crate) fn run_restart(command: &[String], wait: Duration) -> DriverResult<()> {
    let Some((program, args)) = command.split_first() else {
        Logger::trace("RESTART_SKIPPED", &[("reason", "no restart command configured")]);
        return Ok(());
    };

    Logger::info("RESTART_BEGIN", &[("command", &command.join(" "))]);

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| DriverError::Restart(format!("{}: {}", program, e)))?;

    if !status.success() {
        return Err(DriverError::Restart(format!(
            "{} exited with {}",
            command.join(" "),
            status
        )));
    }

    if !wait.is_zero() {
        thread::sleep(wait);
    }
    Logger::info("RESTART_COMPLETE", &[("wait_ms", &wait.as_millis().to_string())]);
    Ok(())
}

/// Split tabular client output into rows of at most two fields
pub(crate) fn parse_pairs(stdout: &str, separator: char) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (key, value) = line.split_once(separator)?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Classify a failed invocation by its stderr text
pub(crate) fn classify_failure(stderr: &str, connection_markers: &[&str]) -> DriverError {
    if connection_markers.iter().any(|marker| stderr.contains(marker)) {
        DriverError::Connection(stderr.to_string())
    } else {
        DriverError::Statement(stderr.to_string())
    }
}

/// Write one query's plan and outcome as JSON. Failures are logged only.
pub(crate) fn write_result_sink(
    path: &Path,
    query: &str,
    outcome: &QueryOutcome,
    plan: Option<serde_json::Value>,
) {
    let (status, error) = match outcome {
        QueryOutcome::Completed { .. } => ("completed", None),
        QueryOutcome::TimedOut { .. } => ("timeout", None),
        QueryOutcome::Failed { reason, .. } => ("failed", Some(reason.as_str())),
    };
    let record = serde_json::json!({
        "query": query,
        "status": status,
        "elapsed_ms": outcome.elapsed().as_secs_f64() * 1000.0,
        "error": error,
        "plan": plan,
    });

    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| serde_json::to_vec_pretty(&record).map_err(io::Error::from))
        .and_then(|bytes| fs::write(path, bytes));

    if let Err(e) = written {
        Logger::warn(
            "RESULT_SINK_WRITE_FAILED",
            &[("path", &path.display().to_string()), ("error", &e.to_string())],
        );
    }
}

/// Quote an identifier with `quote`, doubling embedded quotes
pub(crate) fn quote_ident(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!("{q}{}{q}", name.replace(quote, &doubled), q = quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_client_error() {
        let client = ClientCommand::new("/nonexistent/lambdatune-client");
        let err = client.run(&[]).unwrap_err();
        assert!(matches!(err, DriverError::Client(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_empty_restart_command_is_noop() {
        assert!(run_restart(&[], Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_parse_pairs() {
        let rows = parse_pairs("lineitem|6001215\norders|1500000\n\nbroken\n", '|');
        assert_eq!(
            rows,
            vec![
                ("lineitem".to_string(), "6001215".to_string()),
                ("orders".to_string(), "1500000".to_string()),
            ]
        );

        let rows = parse_pairs("max_connections\t151\n", '\t');
        assert_eq!(rows, vec![("max_connections".to_string(), "151".to_string())]);
    }

    #[test]
    fn test_classify_failure() {
        let markers = ["could not connect"];
        assert!(matches!(
            classify_failure("psql: error: could not connect to server", &markers),
            DriverError::Connection(_)
        ));
        assert!(matches!(
            classify_failure("ERROR:  syntax error at or near \"SELEC\"", &markers),
            DriverError::Statement(_)
        ));
    }

    #[test]
    fn test_write_result_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_1").join("q1.json");
        let outcome = QueryOutcome::TimedOut {
            elapsed: Duration::from_millis(250),
        };

        write_result_sink(&path, "SELECT 1", &outcome, None);

        let record: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(record["status"], "timeout");
        assert_eq!(record["query"], "SELECT 1");
        assert_eq!(record["elapsed_ms"], 250.0);
        assert!(record["plan"].is_null());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("idx_1", '"'), "\"idx_1\"");
        assert_eq!(quote_ident("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_ident("idx_1", '`'), "`idx_1`");
    }
}
