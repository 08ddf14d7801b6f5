//! Fixed-k k-means over dense vectors
//!
//! k-means++ seeding from a fixed seed, then Lloyd iterations until the
//! assignment is stable. Ties go to the lowest centroid index, so the
//! result is a pure function of `(points, k, seed)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default Lloyd iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// k-means clustering with deterministic seeding
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Cluster label (`0..k`) for every point.
    ///
    /// Fewer than `k` labels are used when there are fewer than `k`
    /// distinct points.
    pub fn fit(&self, points: &[Vec<f64>]) -> Vec<usize> {
        if points.is_empty() || self.k == 0 {
            return vec![0; points.len()];
        }
        if points.len() <= self.k {
            return (0..points.len()).collect();
        }

        let mut centroids = self.seed_centroids(points);
        let mut labels = assign(points, &centroids);

        for _ in 0..self.max_iterations {
            update_centroids(points, &labels, &mut centroids);
            let next = assign(points, &centroids);
            if next == labels {
                break;
            }
            labels = next;
        }

        labels
    }

    /// k-means++ seeding: each next centroid is sampled with probability
    /// proportional to its squared distance from the chosen ones.
    fn seed_centroids(&self, points: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(self.k);
        centroids.push(points[rng.gen_range(0..points.len())].clone());

        while centroids.len() < self.k {
            let distances: Vec<f64> = points
                .iter()
                .map(|p| nearest(p, &centroids).1)
                .collect();
            let total: f64 = distances.iter().sum();
            if total <= 0.0 {
                // Every point coincides with a centroid already.
                break;
            }

            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, d) in distances.iter().enumerate() {
                if *d <= 0.0 {
                    continue;
                }
                cumulative += d;
                chosen = Some(i);
                if cumulative >= threshold {
                    break;
                }
            }

            match chosen {
                Some(i) => centroids.push(points[i].clone()),
                None => break,
            }
        }

        centroids
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// (index, squared distance) of the nearest centroid; first wins on ties
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points.iter().map(|p| nearest(p, centroids).0).collect()
}

/// Move each centroid to the mean of its members; empty clusters stay put
fn update_centroids(points: &[Vec<f64>], labels: &[usize], centroids: &mut [Vec<f64>]) {
    let dim = points[0].len();
    let mut sums = vec![vec![0.0; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(point) {
            *s += v;
        }
    }

    for (ci, centroid) in centroids.iter_mut().enumerate() {
        if counts[ci] == 0 {
            continue;
        }
        let n = counts[ci] as f64;
        for (c, s) in centroid.iter_mut().zip(&sums[ci]) {
            *c = s / n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ]
    }

    #[test]
    fn test_separates_obvious_groups() {
        let labels = KMeans::new(2, 0).fit(&blobs());

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[5]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let a = KMeans::new(3, 7).fit(&blobs());
        let b = KMeans::new(3, 7).fit(&blobs());
        assert_eq!(a, b);
    }

    #[test]
    fn test_labels_in_range() {
        let labels = KMeans::new(4, 0).fit(&blobs());
        assert!(labels.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_few_points() {
        assert_eq!(KMeans::new(5, 0).fit(&blobs()[..2]), vec![0, 1]);
        assert!(KMeans::new(2, 0).fit(&[]).is_empty());
    }
}
