//! Location reduction algorithms
//!
//! Every reducer is a pure function of an [`ObservationSet`]: it returns a single
//! consensus coordinate rounded to four decimal places, or `None` when the set does not
//! hold enough usable observations for the method.

pub mod average;
pub mod median;
pub mod clustering;
pub mod kmeans;
pub mod elbow;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{Coordinate, ObservationSet};

pub use average::Average;
pub use median::Median;
pub use clustering::{ClusterAnalysis, ClusterSelection, Clustering, ClusteringConfig};
pub use kmeans::{ClusteringError, KMeans, KMeansConfig, KMeansModel};
pub use elbow::{Curve, Direction, KneeLocator};

/// Maps an observation set to a single consensus coordinate
pub trait Reducer {
    /// Display name of the method
    fn name(&self) -> &'static str;

    /// Consensus coordinate, or `None` when the observations are insufficient
    fn calculate(&self, observations: &ObservationSet) -> Option<Coordinate>;
}

/// Selectable reduction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Average,
    Median,
    Clustering,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Average, Method::Median, Method::Clustering];

    pub fn name(&self) -> &'static str {
        match self {
            Method::Average => "Average",
            Method::Median => "Median",
            Method::Clustering => "Clustering",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "average" => Ok(Method::Average),
            "median" => Ok(Method::Median),
            "clustering" => Ok(Method::Clustering),
            other => Err(format!("Unknown calculation method '{}'", other)),
        }
    }
}

/// Reducer for `method` built from `clustering` parameters
pub fn reducer_for(method: Method, clustering: &ClusteringConfig) -> Box<dyn Reducer> {
    match method {
        Method::Average => Box::new(Average),
        Method::Median => Box::new(Median),
        Method::Clustering => Box::new(Clustering::with_config(clustering.clone())),
    }
}

/// Reduce `observations` with `method` using default parameters
pub fn reduce(method: Method, observations: &ObservationSet) -> Option<Coordinate> {
    reducer_for(method, &ClusteringConfig::default()).calculate(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ObservationSet {
        vec![
            ("A", Coordinate::new(10.0, 10.0)),
            ("B", Coordinate::new(20.0, 20.0)),
            ("C", Coordinate::new(30.0, 30.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_reduce_dispatch() {
        let observations = grid();
        assert_eq!(reduce(Method::Average, &observations), Some(Coordinate::new(20.0, 20.0)));
        assert_eq!(reduce(Method::Median, &observations), Some(Coordinate::new(20.0, 20.0)));
        assert_eq!(reduce(Method::Clustering, &observations), Some(Coordinate::new(20.0, 20.0)));
    }

    #[test]
    fn test_reduce_is_pure() {
        let observations = grid();
        for method in Method::ALL {
            assert_eq!(reduce(method, &observations), reduce(method, &observations));
        }
    }

    #[test]
    fn test_empty_set_is_none_for_every_method() {
        for method in Method::ALL {
            assert_eq!(reduce(method, &ObservationSet::new()), None);
        }
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("Median".parse::<Method>(), Ok(Method::Median));
        assert_eq!("clustering".parse::<Method>(), Ok(Method::Clustering));
        assert!("mode".parse::<Method>().is_err());
        assert_eq!(Method::Average.to_string(), "Average");
    }

    #[test]
    fn test_reducer_names() {
        let config = ClusteringConfig::default();
        for method in Method::ALL {
            assert_eq!(reducer_for(method, &config).name(), method.name());
        }
    }
}
