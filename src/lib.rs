//! IP Geolocation Consensus
//!
//! Refines the location of an IPv4 address by querying several lookup services and
//! reducing their answers with statistical methods: per-axis average, per-axis median,
//! and the centroid of the most compact k-means cluster with k chosen by elbow detection.

pub mod core;
pub mod algorithms;
pub mod validation;
pub mod sources;
pub mod api;
pub mod map;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{Coordinate, ObservationSet};
pub use crate::algorithms::{reduce, Average, Clustering, ClusteringConfig, Median, Method, Reducer};
pub use crate::validation::ObservationFilter;
pub use crate::sources::{LocationSource, SourceError, SourceKind, SourceRecord};
pub use crate::api::{EstimateReport, Estimates, LocateError, Locator, OutputFormat, SourceSelection};
pub use crate::map::{HtmlMap, MapSink};
pub use crate::utils::config::{ConfigurationManager, Settings};
