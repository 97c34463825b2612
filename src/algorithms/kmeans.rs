//! Lloyd's k-means over 2-D points with greedy k-means++ seeding
//!
//! Randomness comes from a seeded `StdRng`, so fitting the same points with the same
//! configuration always yields the same model.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while fitting a k-means model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    #[error("no points to cluster")]
    NoPoints,

    #[error("{available} observations available, at least {required} required")]
    TooFewObservations { available: usize, required: usize },

    #[error("cluster count must be at least 1")]
    ZeroClusters,

    #[error("cannot form {requested} clusters from {distinct} distinct points")]
    TooFewDistinctPoints { requested: usize, distinct: usize },

    #[error("non-finite point at index {index}")]
    NonFinitePoint { index: usize },

    #[error("seeding stopped after {chosen} of {requested} centers: all points already covered")]
    DegenerateSeeding { chosen: usize, requested: usize },

    #[error("fit produced a non-finite inertia")]
    NonFiniteInertia,
}

/// k-means fitting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Maximum Lloyd iterations per run
    pub max_iterations: usize,
    /// Convergence tolerance relative to the mean per-axis variance
    pub tolerance: f64,
    /// Independent seedings; the lowest-inertia run is kept
    pub n_init: usize,
    /// Seed for the random number generator
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 10,
            seed: 0,
        }
    }
}

/// Fitted partition of a point set
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Cluster centers, indexed by label
    pub centroids: Vec<Vector2<f64>>,
    /// Cluster label of each input point
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its centroid
    pub inertia: f64,
    /// Lloyd iterations of the winning run
    pub iterations: usize,
}

impl KMeansModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Number of points assigned to each cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Points of `points` labelled `cluster`
    pub fn members(&self, cluster: usize, points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
        points
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| **label == cluster)
            .map(|(p, _)| *p)
            .collect()
    }
}

/// k-means estimator for a fixed cluster count
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    config: KMeansConfig,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self::with_config(n_clusters, KMeansConfig::default())
    }

    pub fn with_config(n_clusters: usize, config: KMeansConfig) -> Self {
        Self { n_clusters, config }
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Fit the model to `points`
    pub fn fit(&self, points: &[Vector2<f64>]) -> Result<KMeansModel, ClusteringError> {
        if points.is_empty() {
            return Err(ClusteringError::NoPoints);
        }
        if self.n_clusters == 0 {
            return Err(ClusteringError::ZeroClusters);
        }
        if let Some(index) = points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(ClusteringError::NonFinitePoint { index });
        }
        let distinct = count_distinct(points);
        if self.n_clusters > distinct {
            return Err(ClusteringError::TooFewDistinctPoints {
                requested: self.n_clusters,
                distinct,
            });
        }

        let tolerance = self.config.tolerance * mean_variance(points);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<KMeansModel> = None;

        for _ in 0..self.config.n_init.max(1) {
            let centers = self.seed_centers(points, &mut rng)?;
            let model = self.lloyd(points, centers, tolerance);
            if !model.inertia.is_finite() {
                return Err(ClusteringError::NonFiniteInertia);
            }
            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }

        best.ok_or(ClusteringError::NoPoints)
    }

    /// Greedy k-means++: each new center is the best of several D^2-weighted candidates
    fn seed_centers(&self, points: &[Vector2<f64>], rng: &mut StdRng) -> Result<Vec<Vector2<f64>>, ClusteringError> {
        let k = self.n_clusters;
        let trials = 2 + (k as f64).ln().floor() as usize;

        let first = points[rng.gen_range(0..points.len())];
        let mut centers = Vec::with_capacity(k);
        centers.push(first);

        let mut closest: Vec<f64> = points.iter().map(|p| (p - first).norm_squared()).collect();
        let mut potential: f64 = closest.iter().sum();

        while centers.len() < k {
            if potential <= 0.0 {
                return Err(ClusteringError::DegenerateSeeding {
                    chosen: centers.len(),
                    requested: k,
                });
            }

            let mut best: Option<(usize, f64, Vec<f64>)> = None;
            for _ in 0..trials {
                let candidate = weighted_index(&closest, potential, rng);
                let candidate_closest: Vec<f64> = points
                    .iter()
                    .zip(&closest)
                    .map(|(p, &d)| d.min((p - points[candidate]).norm_squared()))
                    .collect();
                let candidate_potential: f64 = candidate_closest.iter().sum();

                if best.as_ref().map_or(true, |(_, pot, _)| candidate_potential < *pot) {
                    best = Some((candidate, candidate_potential, candidate_closest));
                }
            }

            let Some((index, new_potential, new_closest)) = best else {
                return Err(ClusteringError::DegenerateSeeding {
                    chosen: centers.len(),
                    requested: k,
                });
            };
            centers.push(points[index]);
            potential = new_potential;
            closest = new_closest;
        }

        Ok(centers)
    }

    fn lloyd(&self, points: &[Vector2<f64>], mut centroids: Vec<Vector2<f64>>, tolerance: f64) -> KMeansModel {
        let mut labels = vec![0; points.len()];
        let mut iterations = 0;

        for _ in 0..self.config.max_iterations.max(1) {
            iterations += 1;
            assign_labels(points, &centroids, &mut labels);
            let updated = update_centroids(points, &labels, &centroids);

            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| (old - new).norm_squared())
                .sum();
            centroids = updated;

            if shift <= tolerance {
                break;
            }
        }

        assign_labels(points, &centroids, &mut labels);
        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &label)| (p - centroids[label]).norm_squared())
            .sum();

        KMeansModel {
            centroids,
            labels,
            inertia,
            iterations,
        }
    }
}

/// Number of pairwise-distinct points
pub fn count_distinct(points: &[Vector2<f64>]) -> usize {
    let mut seen: Vec<&Vector2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.iter().any(|s| *s == p) {
            seen.push(p);
        }
    }
    seen.len()
}

fn mean_variance(points: &[Vector2<f64>]) -> f64 {
    let n = points.len() as f64;
    let mean = points.iter().fold(Vector2::<f64>::zeros(), |acc, p| acc + p) / n;
    let variance = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + (p - mean).component_mul(&(p - mean)))
        / n;
    (variance.x + variance.y) / 2.0
}

fn weighted_index(weights: &[f64], total: f64, rng: &mut StdRng) -> usize {
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > target {
            return i;
        }
    }
    // Accumulated rounding can leave the target just past the end
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(weights.len() - 1)
}

fn assign_labels(points: &[Vector2<f64>], centroids: &[Vector2<f64>], labels: &mut [usize]) {
    for (p, label) in points.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = (p - centroid).norm_squared();
            if d < best_distance {
                best = c;
                best_distance = d;
            }
        }
        *label = best;
    }
}

fn update_centroids(points: &[Vector2<f64>], labels: &[usize], centroids: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let k = centroids.len();
    let mut sums = vec![Vector2::<f64>::zeros(); k];
    let mut counts = vec![0usize; k];
    for (p, &label) in points.iter().zip(labels) {
        sums[label] += p;
        counts[label] += 1;
    }

    // Empty clusters take the points farthest from their current centroid
    let mut farthest = Vec::new();
    if counts.iter().any(|&c| c == 0) {
        farthest = (0..points.len()).collect();
        farthest.sort_by(|&a, &b| {
            let da = (points[a] - centroids[labels[a]]).norm_squared();
            let db = (points[b] - centroids[labels[b]]).norm_squared();
            db.total_cmp(&da)
        });
    }
    let mut farthest = farthest.into_iter();

    (0..k)
        .map(|c| {
            if counts[c] > 0 {
                sums[c] / counts[c] as f64
            } else {
                farthest.next().map_or(centroids[c], |i| points[i])
            }
        })
        .collect()
}
