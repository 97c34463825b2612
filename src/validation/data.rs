use crate::core::{Coordinate, ObservationSet};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for observation filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Reject latitudes outside [-90, 90] and longitudes outside [-180, 180]
    pub check_range: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { check_range: true }
    }
}

/// Why a source response did not make it into the observation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Source returned no coordinate
    NoData,
    /// Latitude or longitude is NaN or infinite
    NonFinite,
    /// Coordinate outside the valid geographic range
    OutOfRange,
    /// Source name already seen in this batch
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoData => write!(f, "no data returned"),
            RejectReason::NonFinite => write!(f, "non-finite coordinate"),
            RejectReason::OutOfRange => write!(f, "coordinate out of range"),
            RejectReason::Duplicate => write!(f, "duplicate source"),
        }
    }
}

/// Accepted observations plus the rejected sources and their reasons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterResult {
    pub observations: ObservationSet,
    pub rejected: Vec<(String, RejectReason)>,
}

impl FilterResult {
    pub fn accepted_count(&self) -> usize {
        self.observations.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Turns raw source responses into an observation set
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    config: FilterConfig,
}

impl ObservationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Check a single response
    pub fn check(&self, coordinate: Option<&Coordinate>) -> Result<Coordinate, RejectReason> {
        let coordinate = coordinate.ok_or(RejectReason::NoData)?;
        if !coordinate.is_finite() {
            return Err(RejectReason::NonFinite);
        }
        if self.config.check_range && !coordinate.is_in_range() {
            return Err(RejectReason::OutOfRange);
        }
        Ok(*coordinate)
    }

    /// Filter a batch of `(source, response)` pairs; the first response per source wins
    pub fn filter<I, S>(&self, responses: I) -> FilterResult
    where
        I: IntoIterator<Item = (S, Option<Coordinate>)>,
        S: Into<String>,
    {
        let mut result = FilterResult::default();

        for (source, response) in responses {
            let source = source.into();
            if result.observations.contains(&source) {
                warn!("Duplicate response from {} ignored", source);
                result.rejected.push((source, RejectReason::Duplicate));
                continue;
            }
            match self.check(response.as_ref()) {
                Ok(coordinate) => {
                    debug!("Accepted observation from {}: {}", source, coordinate);
                    result.observations.insert(source, coordinate);
                }
                Err(reason) => {
                    if reason == RejectReason::NoData {
                        debug!("No data from {}", source);
                    } else {
                        warn!("Observation from {} rejected: {}", source, reason);
                    }
                    result.rejected.push((source, reason));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_drops_missing_and_malformed() {
        let filter = ObservationFilter::new();
        let result = filter.filter(vec![
            ("HostIP", Some(Coordinate::new(50.0, 14.0))),
            ("DbIpCity", None),
            ("Ipstack", Some(Coordinate::new(f64::NAN, 14.0))),
            ("IpInfo", Some(Coordinate::new(95.0, 14.0))),
            ("IpApi", Some(Coordinate::new(50.2, 14.4))),
        ]);

        assert_eq!(result.accepted_count(), 2);
        assert!(result.observations.contains("HostIP"));
        assert!(result.observations.contains("IpApi"));
        assert_eq!(
            result.rejected,
            vec![
                ("DbIpCity".to_string(), RejectReason::NoData),
                ("Ipstack".to_string(), RejectReason::NonFinite),
                ("IpInfo".to_string(), RejectReason::OutOfRange),
            ]
        );
    }

    #[test]
    fn test_range_check_can_be_disabled() {
        let filter = ObservationFilter::with_config(FilterConfig { check_range: false });
        let result = filter.filter(vec![("A", Some(Coordinate::new(120.0, 400.0)))]);
        assert_eq!(result.accepted_count(), 1);
    }

    #[test]
    fn test_first_response_per_source_wins() {
        let filter = ObservationFilter::new();
        let result = filter.filter(vec![
            ("A", Some(Coordinate::new(1.0, 1.0))),
            ("A", Some(Coordinate::new(2.0, 2.0))),
        ]);
        assert_eq!(result.observations.get("A"), Some(&Coordinate::new(1.0, 1.0)));
        assert_eq!(result.rejected, vec![("A".to_string(), RejectReason::Duplicate)]);
    }
}
