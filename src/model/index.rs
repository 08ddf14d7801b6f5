//! Index definitions
//!
//! Identity is the physical target `(table, column)`, never the name: two
//! proposals for the same column under different names are the same index.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Physical target of an index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    /// Target table
    pub table: String,
    /// Target column list, normalized as `a, b`
    pub column: String,
}

impl IndexKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.column)
    }
}

/// A single-table index definition. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    name: String,
    #[serde(flatten)]
    key: IndexKey,
}

impl Index {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: IndexKey::new(table, column),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.key.table
    }

    pub fn column(&self) -> &str {
        &self.key.column
    }

    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    /// Individual column names (one for single-column indexes)
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.key
            .column
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Same target, different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: self.key.clone(),
        }
    }

    /// `CREATE INDEX <name> ON <table> (<column>);`
    pub fn create_statement(&self) -> String {
        format!(
            "CREATE INDEX {} ON {} ({});",
            self.name, self.key.table, self.key.column
        )
    }

    /// `DROP INDEX <name>;`
    pub fn drop_statement(&self) -> String {
        format!("DROP INDEX {};", self.name)
    }

    /// Parse an index-creation statement.
    ///
    /// Accepts `CREATE [UNIQUE] INDEX [CONCURRENTLY] [IF NOT EXISTS] <name>
    /// ON <table> [USING <method>] (<col>[, <col>...])[;]`, case-insensitive.
    /// Returns `None` for anything else.
    pub fn parse(statement: &str) -> Option<Self> {
        let caps = create_index_regex().captures(statement)?;

        let columns: Vec<&str> = caps["cols"]
            .split(',')
            .map(|c| c.trim().trim_matches('"').trim_matches('`'))
            .collect();
        if columns.iter().any(|c| c.is_empty()) {
            return None;
        }

        Some(Self::new(
            &caps["name"],
            caps["table"].trim_matches('"').trim_matches('`'),
            columns.join(", "),
        ))
    }
}

/// Whether a statement claims to create an index (it may still be malformed)
pub fn is_index_statement(statement: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\b").expect("static regex")
    })
    .is_match(statement)
}

fn create_index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)^\s*CREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(?P<name>[A-Za-z_][A-Za-z0-9_$]*)\s+ON\s+(?:ONLY\s+)?(?P<table>[A-Za-z_"`][A-Za-z0-9_$."`]*)\s*(?:USING\s+[A-Za-z_]+\s*)?\((?P<cols>[^()]*)\)\s*;?\s*$"#,
        )
        .expect("static regex")
    })
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index({}, {}, {})",
            self.name, self.key.table, self.key.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_simple() {
        let index = Index::parse("CREATE INDEX idx_l_orderkey ON lineitem (l_orderkey);").unwrap();
        assert_eq!(index.name(), "idx_l_orderkey");
        assert_eq!(index.table(), "lineitem");
        assert_eq!(index.column(), "l_orderkey");
    }

    #[test]
    fn test_parse_variants() {
        let index = Index::parse(
            "create unique index if not exists i1 on orders using btree (o_custkey,  o_orderdate)",
        )
        .unwrap();
        assert_eq!(index.table(), "orders");
        assert_eq!(index.column(), "o_custkey, o_orderdate");
        assert_eq!(index.columns().collect::<Vec<_>>(), vec!["o_custkey", "o_orderdate"]);

        let index = Index::parse("CREATE INDEX i2 ON part(p_partkey)").unwrap();
        assert_eq!(index.key(), &IndexKey::new("part", "p_partkey"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Index::parse("CREATE INDEX ON lineitem (l_orderkey);").is_none());
        assert!(Index::parse("CREATE INDEX i ON lineitem ();").is_none());
        assert!(Index::parse("CREATE INDEX i lineitem (a);").is_none());
        assert!(Index::parse("ALTER SYSTEM SET work_mem = '64MB';").is_none());
    }

    #[test]
    fn test_is_index_statement() {
        assert!(is_index_statement("  CREATE INDEX i ON t (a);"));
        assert!(is_index_statement("create unique index i on t (a)"));
        assert!(!is_index_statement("ALTER SYSTEM SET shared_buffers = '4GB';"));
    }

    #[test]
    fn test_identity_is_table_and_column() {
        let a = Index::new("idx_a", "orders", "o_custkey");
        let b = Index::new("idx_b", "orders", "o_custkey");
        let c = Index::new("idx_a", "orders", "o_orderdate");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Index> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_statements_are_deterministic() {
        let index = Index::new("idx_3", "customer", "c_nationkey");
        assert_eq!(
            index.create_statement(),
            "CREATE INDEX idx_3 ON customer (c_nationkey);"
        );
        assert_eq!(index.drop_statement(), "DROP INDEX idx_3;");
        assert_eq!(Index::parse(&index.create_statement()).unwrap(), index);
    }
}
