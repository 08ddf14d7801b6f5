//! Connection settings and driver construction

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::DriverResult;
use super::mysql::MySqlDriver;
use super::postgres::PostgresDriver;
use super::retry::RetryPolicy;
use super::DatabaseDriver;

/// Supported database engines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Postgres,
    Mysql,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mysql => "mysql",
        }
    }

    /// Name of the engine's command-line client
    pub fn default_client(&self) -> &'static str {
        match self {
            Engine::Postgres => "psql",
            Engine::Mysql => "mysql",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Engine::Postgres),
            "mysql" => Ok(Engine::Mysql),
            other => Err(format!("unknown database system '{}'", other)),
        }
    }
}

fn default_restart_wait_ms() -> u64 {
    5000
}

/// How to reach and restart the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub system: Engine,
    pub database: String,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Client program; defaults to `psql` or `mysql` on PATH
    #[serde(default)]
    pub client_path: Option<PathBuf>,
    /// Program and arguments that restart the server
    #[serde(default)]
    pub restart_command: Vec<String>,
    #[serde(default = "default_restart_wait_ms")]
    pub restart_wait_ms: u64,
}

impl ConnectionSettings {
    pub fn new(system: Engine, database: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            database: database.into(),
            user: user.into(),
            password: None,
            host: None,
            port: None,
            client_path: None,
            restart_command: Vec::new(),
            restart_wait_ms: default_restart_wait_ms(),
        }
    }

    pub fn client_program(&self) -> PathBuf {
        self.client_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.system.default_client()))
    }

    pub fn restart_wait(&self) -> Duration {
        Duration::from_millis(self.restart_wait_ms)
    }
}

/// Build the driver for `settings.system` and wait until it answers
pub fn connect(
    settings: &ConnectionSettings,
    retry: RetryPolicy,
) -> DriverResult<Box<dyn DatabaseDriver>> {
    match settings.system {
        Engine::Postgres => Ok(Box::new(PostgresDriver::connect(settings, retry)?)),
        Engine::Mysql => Ok(Box::new(MySqlDriver::connect(settings, retry)?)),
    }
}
