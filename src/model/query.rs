//! Workload queries

use serde::{Deserialize, Serialize};

/// Query identifier, e.g. `q01` or `17a`
pub type QueryId = String;

/// A workload query. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub text: String,
}

impl Query {
    pub fn new(id: impl Into<QueryId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// An ordered collection of queries with unique ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    queries: Vec<Query>,
}

impl Workload {
    /// Build a workload. Later duplicates of an id are dropped.
    pub fn new(queries: impl IntoIterator<Item = Query>) -> Self {
        let mut unique: Vec<Query> = Vec::new();
        for query in queries {
            if !unique.iter().any(|q| q.id == query.id) {
                unique.push(query);
            }
        }
        Self { queries: unique }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn get(&self, id: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &QueryId> {
        self.queries.iter().map(|q| &q.id)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
