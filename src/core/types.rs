//! Core data types for location reduction

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::geo;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both fields are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Copy rounded to `places` decimal places on both axes
    pub fn rounded(&self, places: u32) -> Self {
        Self {
            latitude: round_to(self.latitude, places),
            longitude: round_to(self.longitude, places),
        }
    }

    pub fn to_vector2(&self) -> Vector2<f64> {
        Vector2::new(self.latitude, self.longitude)
    }

    pub fn from_vector2(v: &Vector2<f64>) -> Self {
        Self::new(v.x, v.y)
    }

    /// Great-circle distance to `other` (km)
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        geo::haversine_km(self, other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} N, {:.6} E", self.latitude, self.longitude)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Nearest `places`-decimal value to the exact binary value of `value`
///
/// Decimal formatting is correctly rounded, so `0.00035` (stored just below the tie)
/// becomes `0.0003`. Scaling by `10^places` first would round it up.
pub fn round_to(value: f64, places: u32) -> f64 {
    format!("{:.*}", places as usize, value).parse().unwrap_or(value)
}

/// Coordinates reported by lookup sources for one address, keyed by source name.
///
/// Sources that returned nothing are never present. Iteration is ordered by source name
/// so every reducer sees the same sequence for the same set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationSet {
    entries: BTreeMap<String, Coordinate>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the observation for `source`, returning the previous one
    pub fn insert(&mut self, source: impl Into<String>, coordinate: Coordinate) -> Option<Coordinate> {
        self.entries.insert(source.into(), coordinate)
    }

    pub fn get(&self, source: &str) -> Option<&Coordinate> {
        self.entries.get(source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
        self.entries.iter().map(|(name, coordinate)| (name.as_str(), coordinate))
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.entries.values()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// First observation in iteration order
    pub fn first(&self) -> Option<(&str, &Coordinate)> {
        self.iter().next()
    }
}

impl<S: Into<String>> FromIterator<(S, Coordinate)> for ObservationSet {
    fn from_iter<I: IntoIterator<Item = (S, Coordinate)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(name, c)| (name.into(), c)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ObservationSet {
    type Item = (&'a String, &'a Coordinate);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_keeps_four_places() {
        let c = Coordinate::new(50.123456, -14.987654).rounded(4);
        assert_eq!(c, Coordinate::new(50.1235, -14.9877));
    }

    #[test]
    fn test_rounding_uses_stored_value() {
        assert_eq!(round_to(0.00035, 4), 0.0003);
        assert_eq!(round_to(-0.00035, 4), -0.0003);
        assert_eq!(round_to(0.00036, 4), 0.0004);
        assert_eq!(round_to(1.00005, 4), 1.0001);
        assert!(round_to(f64::NAN, 4).is_nan());
    }

    #[test]
    fn test_observation_set_iterates_by_name() {
        let set: ObservationSet = vec![
            ("ipstack", Coordinate::new(1.0, 1.0)),
            ("hostip", Coordinate::new(2.0, 2.0)),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = set.sources().collect();
        assert_eq!(names, vec!["hostip", "ipstack"]);
        assert_eq!(set.first().map(|(n, _)| n), Some("hostip"));
    }

    #[test]
    fn test_observation_set_json_is_a_plain_map() {
        let mut set = ObservationSet::new();
        set.insert("A", Coordinate::new(50.0, 14.0));

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"A":{"latitude":50.0,"longitude":14.0}}"#);

        let back: ObservationSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_range_check() {
        assert!(Coordinate::new(90.0, -180.0).is_in_range());
        assert!(!Coordinate::new(90.5, 0.0).is_in_range());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_finite());
    }
}
