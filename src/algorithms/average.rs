//! Arithmetic mean of observed coordinates

use log::{debug, info, warn};

use crate::algorithms::Reducer;
use crate::core::{Coordinate, ObservationSet, RESULT_DECIMAL_PLACES};

/// Per-axis arithmetic mean over every valid observation
#[derive(Debug, Clone, Copy, Default)]
pub struct Average;

impl Average {
    pub fn new() -> Self {
        Self
    }
}

impl Reducer for Average {
    fn name(&self) -> &'static str {
        "Average"
    }

    fn calculate(&self, observations: &ObservationSet) -> Option<Coordinate> {
        info!("Calculation of Average location started for {} observations", observations.len());

        let mut latitude_sum = 0.0;
        let mut longitude_sum = 0.0;
        let mut count = 0usize;

        for (source, coordinate) in observations.iter() {
            if !coordinate.is_finite() {
                warn!("Observation from {} excluded from Average: non-finite value", source);
                continue;
            }
            latitude_sum += coordinate.latitude;
            longitude_sum += coordinate.longitude;
            count += 1;
            debug!(
                "Average iteration {}: latitude sum {:.3}, longitude sum {:.3}",
                count, latitude_sum, longitude_sum
            );
        }

        if count == 0 {
            warn!("No usable observations for Average");
            return None;
        }

        let n = count as f64;
        let result = Coordinate::new(latitude_sum / n, longitude_sum / n).rounded(RESULT_DECIMAL_PLACES);
        info!("Calculated Average location from {} observations: {}", count, result);
        Some(result)
    }
}
