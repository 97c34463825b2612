//! Coordinate-wise median of observed coordinates
//!
//! Latitudes and longitudes are sorted independently, so the median point can combine
//! the latitude of one source with the longitude of another.

use log::{debug, info, warn};

use crate::algorithms::Reducer;
use crate::core::{Coordinate, ObservationSet, RESULT_DECIMAL_PLACES};

/// Per-axis median over every valid observation
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Median {
    pub fn new() -> Self {
        Self
    }
}

/// Median of an ascending slice; even lengths average the two middle values
fn sorted_median(values: &[f64]) -> Option<f64> {
    let len = values.len();
    if len == 0 {
        return None;
    }
    if len % 2 == 0 {
        let index = len / 2;
        Some((values[index] + values[index - 1]) / 2.0)
    } else {
        Some(values[(len - 1) / 2])
    }
}

impl Reducer for Median {
    fn name(&self) -> &'static str {
        "Median"
    }

    fn calculate(&self, observations: &ObservationSet) -> Option<Coordinate> {
        info!("Calculation of Median location started for {} observations", observations.len());

        let mut latitudes = Vec::with_capacity(observations.len());
        let mut longitudes = Vec::with_capacity(observations.len());

        for (source, coordinate) in observations.iter() {
            if !coordinate.is_finite() {
                warn!("Observation from {} excluded from Median: non-finite value", source);
                continue;
            }
            latitudes.push(coordinate.latitude);
            longitudes.push(coordinate.longitude);
        }

        latitudes.sort_by(f64::total_cmp);
        longitudes.sort_by(f64::total_cmp);
        debug!("Median: sorted {} latitudes and longitudes", latitudes.len());

        let (Some(latitude), Some(longitude)) = (sorted_median(&latitudes), sorted_median(&longitudes)) else {
            warn!("No usable observations for Median");
            return None;
        };

        let result = Coordinate::new(latitude, longitude).rounded(RESULT_DECIMAL_PLACES);
        info!("Calculated Median location from {} observations: {}", latitudes.len(), result);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(points: &[(&str, f64, f64)]) -> ObservationSet {
        points
            .iter()
            .map(|(name, lat, lon)| (*name, Coordinate::new(*lat, *lon)))
            .collect()
    }

    #[test]
    fn test_single_observation() {
        let observations = set(&[("A", 49.123456, 16.654321)]);
        assert_eq!(Median.calculate(&observations), Some(Coordinate::new(49.1235, 16.6543)));
    }

    #[test]
    fn test_odd_count() {
        let observations = set(&[("A", 10.0, 10.0), ("B", 20.0, 20.0), ("C", 30.0, 30.0)]);
        assert_eq!(Median.calculate(&observations), Some(Coordinate::new(20.0, 20.0)));
    }

    #[test]
    fn test_even_count() {
        let observations = set(&[
            ("A", 10.0, 10.0),
            ("B", 20.0, 20.0),
            ("C", 30.0, 30.0),
            ("D", 40.0, 40.0),
        ]);
        assert_eq!(Median.calculate(&observations), Some(Coordinate::new(25.0, 25.0)));
    }

    #[test]
    fn test_axes_are_independent() {
        // Latitude median comes from B, longitude median from C
        let observations = set(&[("A", 1.0, 9.0), ("B", 5.0, 1.0), ("C", 9.0, 5.0)]);
        let result = Median.calculate(&observations).unwrap();

        assert_eq!(result, Coordinate::new(5.0, 5.0));
        assert!(observations.coordinates().all(|c| *c != result));
    }

    #[test]
    fn test_even_count_axes_are_independent() {
        let observations = set(&[
            ("A", 0.0, 40.0),
            ("B", 10.0, 0.0),
            ("C", 20.0, 30.0),
            ("D", 30.0, 10.0),
        ]);
        // Sorted latitudes 0,10,20,30 -> 15; sorted longitudes 0,10,30,40 -> 20
        let result = Median.calculate(&observations).unwrap();
        assert_eq!(result, Coordinate::new(15.0, 20.0));
        assert!(observations.coordinates().all(|c| *c != result));
    }

    #[test]
    fn test_empty_set_is_none() {
        assert_eq!(Median.calculate(&ObservationSet::new()), None);
    }

    #[test]
    fn test_sorted_median_helper() {
        assert_eq!(sorted_median(&[]), None);
        assert_eq!(sorted_median(&[3.0]), Some(3.0));
        assert_eq!(sorted_median(&[1.0, 2.0]), Some(1.5));
    }
}
