//! Common API types and data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::algorithms::Method;
use crate::core::{Coordinate, ObservationSet};
use crate::map::MapError;
use crate::sources::{SourceError, SourceKind};
use crate::utils::config::ConfigError;
use crate::validation::RejectReason;

/// Result type for facade operations
pub type LocateResult<T> = Result<T, LocateError>;

/// Facade error types
#[derive(Debug, Error)]
pub enum LocateError {
    /// Too few observations survived fetching and filtering
    #[error("Not enough locations to start calculation ({available} available, {required} required)")]
    InsufficientObservations { available: usize, required: usize },

    /// A named source is not configured
    #[error("Unknown source '{name}'")]
    UnknownSource { name: String },

    /// A named source cannot run with the current settings
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The selection matched no usable source
    #[error("No source matches the selection")]
    NoSources,

    /// Observation input could not be decoded
    #[error("Invalid observation input: {details}")]
    InvalidInput { details: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which configured sources to query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceSelection {
    /// Every source marked active in the settings
    #[default]
    All,
    /// Active commercial sources
    Commercial,
    /// Active noncommercial sources
    Noncommercial,
    /// Sources named explicitly, whether active or not
    Named(Vec<String>),
}

impl SourceSelection {
    /// Whether a source identified by `key` or `name` is selected
    pub fn matches(&self, key: &str, name: &str, kind: SourceKind, active: bool) -> bool {
        match self {
            SourceSelection::All => active,
            SourceSelection::Commercial => active && kind == SourceKind::Commercial,
            SourceSelection::Noncommercial => active && kind == SourceKind::Noncommercial,
            SourceSelection::Named(names) => names.iter().any(|n| names_match(n, key, name)),
        }
    }
}

pub(crate) fn names_match(requested: &str, key: &str, name: &str) -> bool {
    requested == key || requested.eq_ignore_ascii_case(name)
}

/// Result of every requested method
///
/// A requested method maps to `Some(coordinate)` or to `None` when its input was
/// insufficient; methods that were not requested are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Estimates {
    results: BTreeMap<Method, Option<Coordinate>>,
}

impl Estimates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, location: Option<Coordinate>) {
        self.results.insert(method, location);
    }

    /// `None` when `method` was not requested
    pub fn get(&self, method: Method) -> Option<Option<Coordinate>> {
        self.results.get(&method).copied()
    }

    /// Location produced by `method`, if any
    pub fn location(&self, method: Method) -> Option<Coordinate> {
        self.get(method).flatten()
    }

    pub fn is_requested(&self, method: Method) -> bool {
        self.results.contains_key(&method)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Method, Option<Coordinate>)> + '_ {
        self.results.iter().map(|(m, c)| (*m, *c))
    }

    /// Methods that produced a location
    pub fn produced(&self) -> impl Iterator<Item = (Method, Coordinate)> + '_ {
        self.iter().filter_map(|(m, c)| c.map(|c| (m, c)))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Outcome of querying the selected sources
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub ip: Ipv4Addr,
    pub observations: ObservationSet,
    /// Sources whose response was dropped, with the reason
    pub rejected: Vec<(String, RejectReason)>,
    /// Sources whose lookup failed, with the error
    pub errors: Vec<(String, SourceError)>,
}

impl FetchReport {
    pub fn queried(&self) -> usize {
        self.observations.len() + self.rejected.len()
    }
}

/// Everything the output formatters render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateReport {
    pub ip: Option<Ipv4Addr>,
    pub observations: ObservationSet,
    pub estimates: Estimates,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One sentence per method
    #[default]
    Text,
    /// Single JSON document
    Json,
    /// `method,latitude,longitude` rows
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimates_distinguish_requested_and_insufficient() {
        let mut estimates = Estimates::new();
        estimates.insert(Method::Average, Some(Coordinate::new(50.1, 14.2)));
        estimates.insert(Method::Clustering, None);

        assert_eq!(estimates.get(Method::Average), Some(Some(Coordinate::new(50.1, 14.2))));
        assert_eq!(estimates.get(Method::Clustering), Some(None));
        assert_eq!(estimates.get(Method::Median), None);
        assert!(estimates.is_requested(Method::Clustering));
        assert_eq!(estimates.produced().count(), 1);
    }

    #[test]
    fn test_estimates_serialize_by_method() {
        let mut estimates = Estimates::new();
        estimates.insert(Method::Median, None);
        estimates.insert(Method::Average, Some(Coordinate::new(1.5, 2.5)));
        let json = serde_json::to_string(&estimates).unwrap();
        assert_eq!(json, r#"{"average":{"latitude":1.5,"longitude":2.5},"median":null}"#);
    }

    #[test]
    fn test_selection_matching() {
        let all = SourceSelection::All;
        assert!(all.matches("host_ip", "HostIP", SourceKind::Noncommercial, true));
        assert!(!all.matches("ip_info", "IpInfo", SourceKind::Commercial, false));

        assert!(!SourceSelection::Commercial.matches("host_ip", "HostIP", SourceKind::Noncommercial, true));
        assert!(SourceSelection::Noncommercial.matches("host_ip", "HostIP", SourceKind::Noncommercial, true));

        let named = SourceSelection::Named(vec!["hostip".to_string(), "ip_info".to_string()]);
        assert!(named.matches("host_ip", "HostIP", SourceKind::Noncommercial, false));
        assert!(named.matches("ip_info", "IpInfo", SourceKind::Commercial, false));
        assert!(!named.matches("ip_api", "IpApi", SourceKind::Noncommercial, true));
    }
}
