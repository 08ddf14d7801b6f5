//! Candidate configurations: setting statements plus deduplicated indexes
//!
//! Parsing never fails. Malformed statements are dropped with a warning
//! and remembered in `skipped_statements()`.

use std::collections::BTreeMap;

use crate::observability::{log_event_with_fields, trace_event, Event};

use super::index::{is_index_statement, Index, IndexKey};
use super::sequence::IndexNameSequence;

/// A named bundle of settings and indexes under evaluation
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// One canonical index per physical target
    indexes: BTreeMap<IndexKey, Index>,
    /// Non-index statements, deduplicated, in first-seen order
    settings: Vec<String>,
    /// Statements dropped at parse time
    skipped: Vec<String>,
}

impl Configuration {
    /// Partition raw statements into indexes and settings.
    ///
    /// Every accepted index is renamed `<proposed>_<n>` with `n` drawn from
    /// `sequence`, so names are unique across all configurations parsed with
    /// the same sequence. Duplicate `(table, column)` targets keep the first
    /// definition.
    pub fn parse<I, S>(statements: I, sequence: &mut IndexNameSequence) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Configuration::default();

        for raw in statements {
            let statement = raw.as_ref().trim();

            if statement.is_empty() {
                continue;
            }

            if !is_index_statement(statement) {
                if !config.settings.iter().any(|s| s == statement) {
                    config.settings.push(statement.to_string());
                }
                continue;
            }

            let Some(index) = Index::parse(statement) else {
                log_event_with_fields(
                    Event::StatementSkipped,
                    &[("reason", "malformed index statement"), ("statement", statement)],
                );
                config.skipped.push(statement.to_string());
                continue;
            };

            if config.indexes.contains_key(index.key()) {
                trace_event(
                    Event::StatementSkipped,
                    &[("reason", "duplicate index target"), ("statement", statement)],
                );
                continue;
            }

            let unique = index.renamed(sequence.fresh_name(index.name()));
            config.indexes.insert(unique.key().clone(), unique);
        }

        config
    }

    /// Indexes ordered by `(table, column)`
    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Index targeting `key`, if any
    pub fn index(&self, key: &IndexKey) -> Option<&Index> {
        self.indexes.get(key)
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// `CREATE INDEX` statements for every index, ordered by target
    pub fn index_statements(&self) -> Vec<String> {
        self.indexes.values().map(Index::create_statement).collect()
    }

    /// Non-index setting statements in application order
    pub fn setting_statements(&self) -> &[String] {
        &self.settings
    }

    /// Statements dropped while parsing
    pub fn skipped_statements(&self) -> &[String] {
        &self.skipped
    }

    /// Remove indexes by target. Returns how many were removed.
    pub fn remove_indexes(&mut self, keys: &[IndexKey]) -> usize {
        keys.iter()
            .filter(|key| self.indexes.remove(key).is_some())
            .count()
    }

    /// Remove settings by exact statement text. Returns how many were removed.
    pub fn remove_settings<S: AsRef<str>>(&mut self, values: &[S]) -> usize {
        let before = self.settings.len();
        self.settings
            .retain(|s| !values.iter().any(|v| v.as_ref() == s.as_str()));
        before - self.settings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn commands() -> Vec<&'static str> {
        vec![
            "ALTER SYSTEM SET shared_buffers = '4GB';",
            "CREATE INDEX idx_l_orderkey ON lineitem (l_orderkey);",
            "CREATE INDEX idx_o_custkey ON orders (o_custkey);",
            "ALTER SYSTEM SET work_mem = '64MB';",
            "ALTER SYSTEM SET shared_buffers = '4GB';",
        ]
    }

    #[test]
    fn test_partition() {
        let mut seq = IndexNameSequence::new();
        let config = Configuration::parse(commands(), &mut seq);

        assert_eq!(config.index_count(), 2);
        assert_eq!(
            config.setting_statements(),
            &[
                "ALTER SYSTEM SET shared_buffers = '4GB';".to_string(),
                "ALTER SYSTEM SET work_mem = '64MB';".to_string(),
            ]
        );
        assert!(config.skipped_statements().is_empty());
    }

    #[test]
    fn test_same_target_collapses() {
        let mut seq = IndexNameSequence::new();
        let config = Configuration::parse(
            [
                "CREATE INDEX a ON orders (o_custkey);",
                "CREATE INDEX b ON orders (o_custkey);",
            ],
            &mut seq,
        );

        assert_eq!(config.index_count(), 1);
        let index = config.index(&IndexKey::new("orders", "o_custkey")).unwrap();
        assert_eq!(index.name(), "a_0");
    }

    #[test]
    fn test_names_unique_across_configurations() {
        let mut seq = IndexNameSequence::new();
        let first = Configuration::parse(["CREATE INDEX i ON t (a);"], &mut seq);
        let second = Configuration::parse(["CREATE INDEX i ON t (a);"], &mut seq);

        let n1 = first.indexes().next().unwrap().name().to_string();
        let n2 = second.indexes().next().unwrap().name().to_string();
        assert_ne!(n1, n2);
    }

    #[test]
    fn test_malformed_index_skipped() {
        let mut seq = IndexNameSequence::new();
        let config = Configuration::parse(
            ["CREATE INDEX ON lineitem;", "  ", "CREATE INDEX ok ON t (a);"],
            &mut seq,
        );

        assert_eq!(config.index_count(), 1);
        assert_eq!(config.skipped_statements(), &["CREATE INDEX ON lineitem;".to_string()]);
    }

    #[test]
    fn test_reparse_index_statements_keeps_targets() {
        let mut seq = IndexNameSequence::new();
        let config = Configuration::parse(commands(), &mut seq);
        let again = Configuration::parse(config.index_statements(), &mut seq);

        let keys = |c: &Configuration| -> BTreeSet<IndexKey> {
            c.indexes().map(|i| i.key().clone()).collect()
        };
        assert_eq!(keys(&config), keys(&again));
        assert!(again.setting_statements().is_empty());
    }

    #[test]
    fn test_removals() {
        let mut seq = IndexNameSequence::new();
        let mut config = Configuration::parse(commands(), &mut seq);

        let removed = config.remove_indexes(&[
            IndexKey::new("lineitem", "l_orderkey"),
            IndexKey::new("nation", "n_name"),
        ]);
        assert_eq!(removed, 1);
        assert_eq!(config.index_count(), 1);

        let removed = config.remove_settings(&["ALTER SYSTEM SET work_mem = '64MB';"]);
        assert_eq!(removed, 1);
        assert_eq!(config.setting_statements().len(), 1);
    }
}
