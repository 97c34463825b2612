//! Location lookup sources
//!
//! A source answers "where is this IPv4 address" with a [`SourceRecord`]. Fetching is
//! decoupled from map rendering: the facade decides whether a record becomes a marker.

pub mod database;
pub mod error;
pub mod http;
pub mod static_source;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::core::Coordinate;

pub use database::{DatabaseSource, MAX_MIND_LITE};
pub use error::{SourceError, SourceResult};
pub use http::{HttpSource, Provider};
pub use static_source::StaticSource;

/// Licensing class of a source, mirrored by the settings file sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Commercial,
    Noncommercial,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Commercial => write!(f, "commercial"),
            SourceKind::Noncommercial => write!(f, "noncommercial"),
        }
    }
}

/// What a source reported for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub ip: Ipv4Addr,
    pub coordinate: Option<Coordinate>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl SourceRecord {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            coordinate: None,
            country: None,
            region: None,
            city: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_place(mut self, country: Option<String>, region: Option<String>, city: Option<String>) -> Self {
        self.country = country;
        self.region = region;
        self.city = city;
        self
    }
}

/// Observation name of the connector behind a settings key
pub fn connector_name(key: &str) -> Option<&'static str> {
    match Provider::from_key(key) {
        Some(provider) => Some(provider.display_name()),
        None if key == MAX_MIND_LITE => Some(database::MAX_MIND_LITE_NAME),
        None => None,
    }
}

/// Capability contract for a location lookup service
pub trait LocationSource {
    /// Name used as the observation key
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Query the service for `ip`
    fn lookup(&self, ip: Ipv4Addr) -> SourceResult<SourceRecord>;

    /// Coordinate for `ip`, with every failure mapped to `None`
    fn fetch(&self, ip: Ipv4Addr) -> Option<Coordinate> {
        match self.lookup(ip) {
            Ok(record) => {
                if record.coordinate.is_none() {
                    warn!("{} returned no coordinates for {}", self.name(), ip);
                }
                record.coordinate
            }
            Err(e) => {
                warn!("{} lookup failed: {}", self.name(), e);
                None
            }
        }
    }
}
