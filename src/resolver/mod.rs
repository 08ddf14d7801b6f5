//! Query-to-index dependency resolution
//!
//! A `DependencyResolver` decides which candidate indexes each query may
//! use. Mistakes only cost performance (an unneeded index gets built or a
//! useful one gets built late), never correctness, so the default
//! `TextualResolver` is a cheap word-boundary heuristic.

mod textual;

pub use textual::TextualResolver;

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Index, Query, QueryId};

static NO_DEPENDENCIES: BTreeSet<Index> = BTreeSet::new();

/// Strategy for computing query -> index dependencies
pub trait DependencyResolver {
    /// Dependencies of every query on the given candidate indexes.
    /// Must be deterministic and free of side effects.
    fn resolve(&self, queries: &[&Query], indexes: &[Index]) -> QueryIndexMap;
}

/// Query id -> indexes relevant to that query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryIndexMap {
    dependencies: BTreeMap<QueryId, BTreeSet<Index>>,
}

impl QueryIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `query` depends on `index`
    pub fn insert(&mut self, query: impl Into<QueryId>, index: Index) {
        self.dependencies
            .entry(query.into())
            .or_default()
            .insert(index);
    }

    /// Dependencies of `query`; empty when it needs no index
    pub fn dependencies(&self, query: &str) -> &BTreeSet<Index> {
        self.dependencies.get(query).unwrap_or(&NO_DEPENDENCIES)
    }

    /// Distinct indexes needed by `queries`, in order of first appearance
    pub fn distinct_indexes<'a, I>(&'a self, queries: I) -> Vec<&'a Index>
    where
        I: IntoIterator<Item = &'a QueryId>,
    {
        let mut seen: Vec<&Index> = Vec::new();
        for query in queries {
            for index in self.dependencies(query) {
                if !seen.contains(&index) {
                    seen.push(index);
                }
            }
        }
        seen
    }

    /// Number of queries with at least one dependency
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
