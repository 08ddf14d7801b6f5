//! Query clustering
//!
//! Queries with identical dependency sets form one cluster. When that
//! yields more than `max_clusters` groups, queries are re-clustered with
//! k-means over their binary index-membership vectors so the exponential
//! ordering step sees a bounded number of items. The reduction is lossy:
//! a reduced cluster's index set is the union of its members' sets.

mod kmeans;

pub use kmeans::KMeans;

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Index, QueryId};
use crate::observability::Logger;
use crate::resolver::QueryIndexMap;

/// Default cluster cap
pub const DEFAULT_MAX_CLUSTERS: usize = 13;

/// Seed for the k-means reduction
pub const KMEANS_SEED: u64 = 0;

/// A group of queries sharing (or approximated as sharing) an index set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCluster {
    pub cluster_id: usize,
    pub queries: Vec<QueryId>,
    pub indexes: BTreeSet<Index>,
}

/// Group `query_ids` by dependency set, reducing to at most `max_clusters`.
///
/// Clusters are numbered from 0 in order of first appearance. Each input
/// query appears in exactly one cluster.
pub fn cluster_queries(
    query_ids: &[QueryId],
    dependencies: &QueryIndexMap,
    max_clusters: usize,
) -> Vec<QueryCluster> {
    let mut position: BTreeMap<&BTreeSet<Index>, usize> = BTreeMap::new();
    let mut clusters: Vec<QueryCluster> = Vec::new();

    for query in query_ids {
        let indexes = dependencies.dependencies(query);
        match position.get(indexes) {
            Some(&pos) => clusters[pos].queries.push(query.clone()),
            None => {
                position.insert(indexes, clusters.len());
                clusters.push(QueryCluster {
                    cluster_id: clusters.len(),
                    queries: vec![query.clone()],
                    indexes: indexes.clone(),
                });
            }
        }
    }

    if max_clusters == 0 || clusters.len() <= max_clusters {
        return clusters;
    }

    Logger::trace(
        "CLUSTER_REDUCTION",
        &[
            ("groups", &clusters.len().to_string()),
            ("max_clusters", &max_clusters.to_string()),
        ],
    );

    reduce(query_ids, dependencies, max_clusters)
}

/// Binary membership vector per query, one dimension per distinct index
pub fn membership_vectors(query_ids: &[QueryId], dependencies: &QueryIndexMap) -> Vec<Vec<f64>> {
    let dimensions = dependencies.distinct_indexes(query_ids.iter());

    query_ids
        .iter()
        .map(|query| {
            let deps = dependencies.dependencies(query);
            dimensions
                .iter()
                .map(|index| if deps.contains(*index) { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

fn reduce(
    query_ids: &[QueryId],
    dependencies: &QueryIndexMap,
    max_clusters: usize,
) -> Vec<QueryCluster> {
    let vectors = membership_vectors(query_ids, dependencies);
    let labels = KMeans::new(max_clusters, KMEANS_SEED).fit(&vectors);

    let mut clusters: Vec<QueryCluster> = Vec::new();
    for label in 0..max_clusters {
        let mut queries = Vec::new();
        let mut indexes = BTreeSet::new();

        for (query, _) in query_ids.iter().zip(&labels).filter(|(_, l)| **l == label) {
            queries.push(query.clone());
            indexes.extend(dependencies.dependencies(query).iter().cloned());
        }

        if queries.is_empty() {
            continue;
        }
        clusters.push(QueryCluster {
            cluster_id: clusters.len(),
            queries,
            indexes,
        });
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<QueryId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn flatten(clusters: &[QueryCluster]) -> Vec<QueryId> {
        let mut all: Vec<QueryId> = clusters.iter().flat_map(|c| c.queries.clone()).collect();
        all.sort();
        all
    }

    #[test]
    fn test_groups_identical_sets() {
        let a = Index::new("a", "t", "x");
        let b = Index::new("b", "t", "y");

        let mut deps = QueryIndexMap::new();
        deps.insert("q1", a.clone());
        deps.insert("q2", a.clone());
        deps.insert("q3", b.clone());

        let clusters = cluster_queries(&ids(&["q1", "q2", "q3", "q4"]), &deps, 13);

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].queries, ids(&["q1", "q2"]));
        assert_eq!(clusters[1].queries, ids(&["q3"]));
        // q4 needs nothing and forms its own cluster
        assert_eq!(clusters[2].queries, ids(&["q4"]));
        assert!(clusters[2].indexes.is_empty());
        assert_eq!(clusters.iter().map(|c| c.cluster_id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reduction_bounds_count_and_partitions() {
        let mut deps = QueryIndexMap::new();
        let mut names = Vec::new();
        for i in 0..20 {
            let name = format!("q{:02}", i);
            deps.insert(name.clone(), Index::new(format!("i{}", i), "t", format!("c{}", i)));
            if i % 2 == 0 {
                deps.insert(name.clone(), Index::new("shared", "t", "shared"));
            }
            names.push(name);
        }

        let clusters = cluster_queries(&names, &deps, 5);

        assert!(clusters.len() <= 5);
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(flatten(&clusters), expected);

        for cluster in &clusters {
            for query in &cluster.queries {
                assert!(deps.dependencies(query).is_subset(&cluster.indexes));
            }
        }
    }

    #[test]
    fn test_reduction_is_deterministic() {
        let mut deps = QueryIndexMap::new();
        let mut names = Vec::new();
        for i in 0..8 {
            let name = format!("q{}", i);
            deps.insert(name.clone(), Index::new("x", "t", format!("c{}", i % 4)));
            deps.insert(name.clone(), Index::new("y", "u", format!("d{}", i % 3)));
            names.push(name);
        }

        assert_eq!(cluster_queries(&names, &deps, 3), cluster_queries(&names, &deps, 3));
    }

    #[test]
    fn test_membership_vectors() {
        let a = Index::new("a", "t", "x");
        let b = Index::new("b", "t", "y");
        let mut deps = QueryIndexMap::new();
        deps.insert("q1", a.clone());
        deps.insert("q2", a);
        deps.insert("q2", b);

        let vectors = membership_vectors(&ids(&["q1", "q2", "q3"]), &deps);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]]);
    }
}
