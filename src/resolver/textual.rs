//! Word-boundary textual resolver
//!
//! A query depends on an index when its text mentions the index table and
//! every index column as whole words (case-sensitive). No SQL parsing.

use regex::Regex;

use crate::model::{Index, Query};

use super::{DependencyResolver, QueryIndexMap};

/// Regex-based `DependencyResolver`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualResolver;

impl TextualResolver {
    pub fn new() -> Self {
        Self
    }

    fn word(term: &str) -> Option<Regex> {
        Regex::new(&format!(r"\b{}\b", regex::escape(term))).ok()
    }

    /// Patterns that must all match for a query to use `index`
    fn patterns(index: &Index) -> Option<Vec<Regex>> {
        let mut patterns = vec![Self::word(index.table())?];
        for column in index.columns() {
            patterns.push(Self::word(column)?);
        }
        Some(patterns)
    }
}

impl DependencyResolver for TextualResolver {
    fn resolve(&self, queries: &[&Query], indexes: &[Index]) -> QueryIndexMap {
        let mut map = QueryIndexMap::new();

        for index in indexes {
            let Some(patterns) = Self::patterns(index) else {
                continue;
            };

            for query in queries {
                if patterns.iter().all(|p| p.is_match(&query.text)) {
                    map.insert(query.id.clone(), index.clone());
                }
            }
        }

        map
    }
}
