//! Query workload loading from a directory of `*.sql` files

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::model::{Query, Workload};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{WorkloadError, WorkloadResult};

/// Load every `*.sql` file in `dir` as one query, id = file stem.
///
/// Queries are ordered by id with digit runs compared numerically, so
/// `q2` sorts before `q10` and `1a` before `1b` before `2a`.
pub fn load_queries(dir: &Path) -> WorkloadResult<Workload> {
    let entries = fs::read_dir(dir).map_err(|e| WorkloadError::io(dir, e))?;

    let mut queries = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| WorkloadError::io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let text = fs::read_to_string(&path).map_err(|e| WorkloadError::io(&path, e))?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        queries.push(Query::new(id, text));
    }

    if queries.is_empty() {
        return Err(WorkloadError::NoQueries(dir.to_path_buf()));
    }

    queries.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    let workload = Workload::new(queries);

    log_event_with_fields(
        Event::WorkloadLoaded,
        &[
            ("dir", &dir.display().to_string()),
            ("queries", &workload.len().to_string()),
        ],
    );
    Ok(workload)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Number(u64),
    Text(&'a str),
}

fn chunks(id: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut rest = id;
    while let Some(first) = rest.chars().next() {
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        out.push(match chunk.parse::<u64>() {
            Ok(n) if digits => Chunk::Number(n),
            _ => Chunk::Text(chunk),
        });
        rest = tail;
    }
    out
}

/// Compare ids with digit runs as numbers, falling back to plain order
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_natural_order() {
        let mut ids = vec!["q10", "q2", "q1", "10a", "2b", "2a", "q02"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["2a", "2b", "10a", "q1", "q02", "q2", "q10"]);
    }

    #[test]
    fn test_load_queries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("q10.sql"), "SELECT 10;\n").unwrap();
        fs::write(dir.path().join("q2.sql"), "  SELECT 2;  ").unwrap();
        fs::write(dir.path().join("empty.sql"), "\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let workload = load_queries(dir.path()).unwrap();
        let ids: Vec<&str> = workload.ids().map(|s| s.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q10"]);
        assert_eq!(workload.get("q2").unwrap().text, "SELECT 2;");
    }

    #[test]
    fn test_empty_dir_is_error() {
        let dir = tempdir().unwrap();
        let err = load_queries(dir.path()).unwrap_err();
        assert_eq!(err.code(), "TUNE_WORKLOAD_NO_QUERIES");
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_queries(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.code(), "TUNE_WORKLOAD_IO");
    }
}
