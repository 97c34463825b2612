//! Map output
//!
//! The facade reports markers and distance lines through [`MapSink`]; [`HtmlMap`] collects
//! them and renders a standalone Leaflet page.

pub mod html;

use std::net::Ipv4Addr;

use crate::algorithms::Method;
use crate::core::Coordinate;
use crate::sources::{SourceKind, SourceRecord};

pub use html::{HtmlMap, MapError};

/// Receiver for map features produced during a lookup
pub trait MapSink {
    /// Marker for a source response
    fn add_source_marker(&mut self, name: &str, kind: SourceKind, record: &SourceRecord);

    /// Marker for a calculated location
    fn add_estimate_marker(&mut self, method: Method, ip: Ipv4Addr, location: &Coordinate);

    /// Line between an observation and an estimate
    fn add_distance_line(&mut self, from: &Coordinate, to: &Coordinate);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MapSink for NullSink {
    fn add_source_marker(&mut self, _name: &str, _kind: SourceKind, _record: &SourceRecord) {}

    fn add_estimate_marker(&mut self, _method: Method, _ip: Ipv4Addr, _location: &Coordinate) {}

    fn add_distance_line(&mut self, _from: &Coordinate, _to: &Coordinate) {}
}

/// Marker colour by origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    /// Noncommercial source
    Green,
    /// Commercial source
    Red,
    /// Calculated estimate
    Blue,
}

impl MarkerColor {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Noncommercial => MarkerColor::Green,
            SourceKind::Commercial => MarkerColor::Red,
        }
    }

    pub fn css(&self) -> &'static str {
        match self {
            MarkerColor::Green => "green",
            MarkerColor::Red => "red",
            MarkerColor::Blue => "blue",
        }
    }
}

/// A point feature
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: Coordinate,
    pub tooltip: String,
    /// HTML content, already escaped
    pub popup: String,
    pub color: MarkerColor,
}

/// Line annotated with its great-circle length
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceLine {
    pub from: Coordinate,
    pub to: Coordinate,
    pub distance_km: f64,
}

impl DistanceLine {
    pub fn new(from: Coordinate, to: Coordinate) -> Self {
        Self {
            from,
            to,
            distance_km: from.distance_km(&to),
        }
    }

    pub fn tooltip(&self) -> String {
        format!("Distance: {:.3} km", self.distance_km)
    }
}
