//! Configuration candidate loading
//!
//! A candidate file is either a plain `{"commands": [...]}` document or a
//! recommendation-service response envelope whose message content holds
//! that document, optionally fenced as a markdown code block. Envelopes may
//! carry `hidden_table_cols`, the mapping from anonymized table and column
//! names back to the real ones.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::driver::Engine;
use crate::model::{is_index_statement, Index};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{WorkloadError, WorkloadResult};
use super::queries::natural_cmp;

/// A named list of raw statements, before parsing into a `Configuration`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub statements: Vec<String>,
}

#[derive(Deserialize)]
struct Commands {
    commands: Vec<String>,
}

#[derive(Deserialize)]
struct Envelope {
    response: Response,
    #[serde(default)]
    hidden_table_cols: Option<HiddenNames>,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

#[derive(Deserialize, Default)]
struct HiddenNames {
    #[serde(default)]
    tables: BTreeMap<String, String>,
    #[serde(default)]
    columns: BTreeMap<String, String>,
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*```(?:json|python)?\s*|```").expect("static regex"))
}

/// Extract the statements from a candidate document
pub fn parse_candidate(text: &str) -> Result<Vec<String>, String> {
    if let Ok(plain) = serde_json::from_str::<Commands>(text) {
        return Ok(plain.commands);
    }

    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| format!("neither commands nor envelope: {}", e))?;
    let content = envelope
        .response
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or_else(|| "envelope has no choices".to_string())?;

    let unfenced = fence_regex().replace_all(content, "");
    let commands: Commands = serde_json::from_str(unfenced.trim())
        .map_err(|e| format!("message content is not a commands document: {}", e))?;

    Ok(match envelope.hidden_table_cols {
        Some(names) => commands
            .commands
            .into_iter()
            .map(|s| reveal_names(&s, &names))
            .collect(),
        None => commands.commands,
    })
}

/// Map anonymized names in an index statement back to real ones.
/// Names missing from the mapping and non-index statements pass through.
fn reveal_names(statement: &str, names: &HiddenNames) -> String {
    if !is_index_statement(statement) {
        return statement.to_string();
    }
    let Some(index) = Index::parse(statement) else {
        return statement.to_string();
    };

    let table = names
        .tables
        .get(index.table())
        .map(String::as_str)
        .unwrap_or(index.table());
    let columns: Vec<&str> = index
        .columns()
        .map(|c| names.columns.get(c).map(String::as_str).unwrap_or(c))
        .collect();

    Index::new(index.name(), table, columns.join(", ")).create_statement()
}

/// Rewrite a setting statement for `engine`.
///
/// Postgres session `SET` statements become `ALTER SYSTEM SET` so they
/// survive the restart that follows reconfiguration.
pub fn normalize_statement(statement: &str, engine: Engine) -> String {
    let trimmed = statement.trim();
    match engine {
        Engine::Postgres => {
            let is_plain_set = trimmed
                .get(..4)
                .is_some_and(|head| head.eq_ignore_ascii_case("SET "));
            if is_plain_set {
                format!("ALTER SYSTEM SET {}", trimmed[4..].trim_start())
            } else {
                trimmed.to_string()
            }
        }
        Engine::Mysql => trimmed.to_string(),
    }
}

/// Load every `*.json` candidate in `dir`, ordered by id.
///
/// Files that cannot be parsed are skipped with a warning. Finding no
/// usable candidate at all is an error.
pub fn load_candidates(dir: &Path, engine: Engine) -> WorkloadResult<Vec<Candidate>> {
    let entries = fs::read_dir(dir).map_err(|e| WorkloadError::io(dir, e))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| WorkloadError::io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let text = fs::read_to_string(&path).map_err(|e| WorkloadError::io(&path, e))?;
        match parse_candidate(&text) {
            Ok(statements) => candidates.push(Candidate {
                id: id.to_string(),
                statements: statements
                    .iter()
                    .map(|s| normalize_statement(s, engine))
                    .collect(),
            }),
            Err(reason) => log_event_with_fields(
                Event::CandidateSkipped,
                &[("file", &path.display().to_string()), ("reason", &reason)],
            ),
        }
    }

    if candidates.is_empty() {
        return Err(WorkloadError::NoCandidates(dir.to_path_buf()));
    }

    candidates.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    log_event_with_fields(
        Event::CandidatesLoaded,
        &[
            ("dir", &dir.display().to_string()),
            ("candidates", &candidates.len().to_string()),
            ("engine", engine.as_str()),
        ],
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ENVELOPE: &str = r#"{
        "prompt": "tune this",
        "response": {"choices": [{"message": {"content":
            "```json\n{\"commands\": [\"CREATE INDEX idx_a ON t1 (c1);\", \"SET work_mem = '64MB';\"]}\n```"
        }}]},
        "hidden_table_cols": {
            "tables": {"t1": "lineitem"},
            "columns": {"c1": "l_orderkey"}
        }
    }"#;

    #[test]
    fn test_plain_commands() {
        let statements = parse_candidate(r#"{"commands": ["SET a = 1", "CREATE INDEX i ON t (c)"]}"#)
            .unwrap();
        assert_eq!(statements, vec!["SET a = 1", "CREATE INDEX i ON t (c)"]);
    }

    #[test]
    fn test_envelope_with_hidden_names() {
        let statements = parse_candidate(ENVELOPE).unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE INDEX idx_a ON lineitem (l_orderkey);".to_string(),
                "SET work_mem = '64MB';".to_string(),
            ]
        );
    }

    #[test]
    fn test_envelope_without_fence_or_names() {
        let text = r#"{"response": {"choices": [{"message": {"content": "{\"commands\": [\"SET x = 1\"]}"}}]}}"#;
        assert_eq!(parse_candidate(text).unwrap(), vec!["SET x = 1"]);
    }

    #[test]
    fn test_unknown_document_rejected() {
        assert!(parse_candidate(r#"{"settings": []}"#).is_err());
        assert!(parse_candidate(r#"{"response": {"choices": []}}"#).is_err());
        assert!(parse_candidate("not json").is_err());
    }

    #[test]
    fn test_normalize_for_postgres() {
        assert_eq!(
            normalize_statement("SET work_mem = '64MB';", Engine::Postgres),
            "ALTER SYSTEM SET work_mem = '64MB';"
        );
        assert_eq!(
            normalize_statement("set shared_buffers = '4GB'", Engine::Postgres),
            "ALTER SYSTEM SET shared_buffers = '4GB'"
        );
        assert_eq!(
            normalize_statement("ALTER SYSTEM SET a = 1", Engine::Postgres),
            "ALTER SYSTEM SET a = 1"
        );
        assert_eq!(
            normalize_statement("CREATE INDEX settle ON t (c)", Engine::Postgres),
            "CREATE INDEX settle ON t (c)"
        );
        assert_eq!(
            normalize_statement("SET GLOBAL innodb_buffer_pool_size = 1", Engine::Mysql),
            "SET GLOBAL innodb_buffer_pool_size = 1"
        );
    }

    #[test]
    fn test_load_candidates_skips_bad_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config_2.json"), r#"{"commands": ["SET a = 1"]}"#).unwrap();
        fs::write(dir.path().join("config_10.json"), ENVELOPE).unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("readme.md"), "ignored").unwrap();

        let candidates = load_candidates(dir.path(), Engine::Postgres).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["config_2", "config_10"]);
        assert_eq!(candidates[0].statements, vec!["ALTER SYSTEM SET a = 1"]);
    }

    #[test]
    fn test_load_candidates_empty_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "[]").unwrap();
        let err = load_candidates(dir.path(), Engine::Mysql).unwrap_err();
        assert_eq!(err.code(), "TUNE_WORKLOAD_NO_CANDIDATES");
    }
}
