//! Centroid of the most prominent k-means cluster
//!
//! The reducer fits k-means for every candidate cluster count, picks the count at the
//! elbow of the inertia curve and returns the centroid of one cluster of that partition.

use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::algorithms::elbow::KneeLocator;
use crate::algorithms::kmeans::{count_distinct, ClusteringError, KMeans, KMeansConfig, KMeansModel};
use crate::algorithms::Reducer;
use crate::core::{Coordinate, ObservationSet, MAX_CANDIDATE_CLUSTERS, MIN_CLUSTERING_OBSERVATIONS, RESULT_DECIMAL_PLACES};

/// Which cluster of the selected partition supplies the result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterSelection {
    /// Lowest inertia when the cluster is re-fit on its own
    #[default]
    MostCompact,
    /// Most member points
    Largest,
    /// Cluster at index 0
    First,
}

/// Clustering reducer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// k-means parameters used for every fit
    pub kmeans: KMeansConfig,
    /// Kneedle sensitivity for elbow detection
    pub elbow_sensitivity: f64,
    /// Upper bound on swept cluster counts
    pub max_candidate_clusters: usize,
    /// Cluster selection policy
    pub selection: ClusterSelection,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            kmeans: KMeansConfig::default(),
            elbow_sensitivity: 1.0,
            max_candidate_clusters: MAX_CANDIDATE_CLUSTERS,
            selection: ClusterSelection::MostCompact,
        }
    }
}

/// Result of a full clustering pass
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAnalysis {
    /// Swept `(k, inertia)` pairs
    pub candidates: Vec<(usize, f64)>,
    /// Cluster count of the chosen partition
    pub selected_k: usize,
    /// Whether the elbow detector found a knee (otherwise `k = 1`)
    pub knee_found: bool,
    /// Label of the chosen cluster
    pub cluster_index: usize,
    /// Member count of the chosen cluster
    pub cluster_size: usize,
    /// Rounded centroid of the chosen cluster
    pub centroid: Coordinate,
}

/// k-means cluster reducer
#[derive(Debug, Clone, Default)]
pub struct Clustering {
    config: ClusteringConfig,
}

impl Clustering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Run the sweep, elbow selection and cluster choice
    pub fn analyze(&self, observations: &ObservationSet) -> Result<ClusterAnalysis, ClusteringError> {
        let points: Vec<Vector2<f64>> = observations
            .iter()
            .filter_map(|(source, c)| {
                if c.is_finite() {
                    Some(c.to_vector2())
                } else {
                    warn!("Observation from {} excluded from Clustering: non-finite value", source);
                    None
                }
            })
            .collect();

        let n = points.len();
        if n < MIN_CLUSTERING_OBSERVATIONS {
            return Err(ClusteringError::TooFewObservations {
                available: n,
                required: MIN_CLUSTERING_OBSERVATIONS,
            });
        }

        let distinct = count_distinct(&points);
        if distinct < 2 {
            return Err(ClusteringError::TooFewDistinctPoints { requested: 2, distinct });
        }

        // Counts above the distinct point count repeat the saturated partition
        let k_max = (n - 1).min(self.config.max_candidate_clusters.max(1));
        let mut models: Vec<KMeansModel> = Vec::with_capacity(k_max);
        for k in 1..=k_max {
            let model = match models.last() {
                Some(previous) if k > distinct => previous.clone(),
                _ => KMeans::with_config(k, self.config.kmeans.clone()).fit(&points)?,
            };
            debug!("K-Means model for k = {}: inertia {:.6}", k, model.inertia);
            models.push(model);
        }

        let ks: Vec<f64> = (1..=k_max).map(|k| k as f64).collect();
        let inertias: Vec<f64> = models.iter().map(|m| m.inertia).collect();
        let knee = KneeLocator::elbow()
            .with_sensitivity(self.config.elbow_sensitivity)
            .find_knee(&ks, &inertias);

        let selected = match knee {
            Some(index) => {
                debug!("Knee of the inertia curve at k = {}", index + 1);
                index
            }
            None => {
                warn!("No knee found in K-Means inertia curve, using k = 1 (similar to Average)");
                0
            }
        };
        let model = &models[selected];

        let cluster_index = self.choose_cluster(model, &points)?;
        let cluster_size = model.cluster_sizes()[cluster_index];
        let centroid = Coordinate::from_vector2(&model.centroids[cluster_index]).rounded(RESULT_DECIMAL_PLACES);

        Ok(ClusterAnalysis {
            candidates: (1..=k_max).zip(inertias).collect(),
            selected_k: model.n_clusters(),
            knee_found: knee.is_some(),
            cluster_index,
            cluster_size,
            centroid,
        })
    }

    fn choose_cluster(&self, model: &KMeansModel, points: &[Vector2<f64>]) -> Result<usize, ClusteringError> {
        let sizes = model.cluster_sizes();

        match self.config.selection {
            ClusterSelection::First => Ok(0),
            ClusterSelection::Largest => Ok(sizes
                .iter()
                .enumerate()
                .fold(0, |best, (c, &size)| if size > sizes[best] { c } else { best })),
            ClusterSelection::MostCompact => {
                let mut best: Option<(usize, f64)> = None;
                for cluster in 0..model.n_clusters() {
                    let members = model.members(cluster, points);
                    if members.is_empty() {
                        continue;
                    }
                    let inertia = KMeans::with_config(1, self.config.kmeans.clone()).fit(&members)?.inertia;
                    debug!("Cluster {} ({} points): single-cluster inertia {:.6}", cluster, members.len(), inertia);

                    let better = match best {
                        None => true,
                        Some((b, b_inertia)) => inertia < b_inertia || (inertia == b_inertia && sizes[cluster] > sizes[b]),
                    };
                    if better {
                        best = Some((cluster, inertia));
                    }
                }
                best.map(|(cluster, _)| cluster).ok_or(ClusteringError::NoPoints)
            }
        }
    }
}

impl Reducer for Clustering {
    fn name(&self) -> &'static str {
        "Clustering"
    }

    fn calculate(&self, observations: &ObservationSet) -> Option<Coordinate> {
        info!("Calculation of location data cluster centroid started for {} observations", observations.len());

        match self.analyze(observations) {
            Ok(analysis) => {
                info!(
                    "Calculated Clustering location from {} observations (k = {}, cluster of {}): {}",
                    observations.len(),
                    analysis.selected_k,
                    analysis.cluster_size,
                    analysis.centroid
                );
                Some(analysis.centroid)
            }
            Err(e) => {
                warn!("Clustering could not produce a location: {}", e);
                None
            }
        }
    }
}
