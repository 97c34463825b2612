//! Knee/elbow detection on a sampled curve (Kneedle)
//!
//! Both axes are normalised to [0, 1] and the curve is flipped so the knee becomes a
//! maximum of the difference curve `y - x`. The knee is the first local maximum after
//! which the difference curve drops below `max - S * mean step`.

use serde::{Deserialize, Serialize};

/// Curvature of the sampled curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Convex,
    Concave,
}

/// Monotonic direction of the sampled curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Kneedle knee locator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KneeLocator {
    curve: Curve,
    direction: Direction,
    sensitivity: f64,
}

impl Default for KneeLocator {
    fn default() -> Self {
        Self {
            curve: Curve::Convex,
            direction: Direction::Decreasing,
            sensitivity: 1.0,
        }
    }
}

impl KneeLocator {
    pub fn new(curve: Curve, direction: Direction) -> Self {
        Self {
            curve,
            direction,
            ..Self::default()
        }
    }

    /// Convex, decreasing curve such as k-means inertia over cluster count
    pub fn elbow() -> Self {
        Self::default()
    }

    /// Sensitivity `S`; larger values wait for a more pronounced knee
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Index into `x` of the knee, if one exists.
    ///
    /// `x` must be increasing. Returns `None` for fewer than two samples, mismatched
    /// lengths, non-finite or flat input, or a curve without a knee.
    pub fn find_knee(&self, x: &[f64], y: &[f64]) -> Option<usize> {
        let n = x.len();
        if n < 2 || n != y.len() {
            return None;
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return None;
        }

        let (x_t, y_t) = self.transform(normalize(x)?, normalize(y)?);
        let difference: Vec<f64> = y_t.iter().zip(&x_t).map(|(y, x)| y - x).collect();

        let maxima = relative_extrema(&difference, |a, b| a >= b);
        let minima = relative_extrema(&difference, |a, b| a <= b);
        let first_maximum = *maxima.first()?;

        let mean_step = x_t.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;
        let offset = self.sensitivity * mean_step.abs();

        let mut threshold = 0.0;
        let mut threshold_index = first_maximum;
        for i in first_maximum..n - 1 {
            if maxima.contains(&i) {
                threshold = difference[i] - offset;
                threshold_index = i;
            }
            if minima.contains(&i) {
                threshold = 0.0;
            }
            if difference[i + 1] < threshold {
                return Some(self.knee_index(threshold_index, n));
            }
        }

        None
    }

    /// Map every curve shape onto a concave increasing one
    fn transform(&self, mut x: Vec<f64>, mut y: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
        if self.curve == Curve::Convex {
            let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            x.iter_mut().for_each(|v| *v = x_max - *v);
            y.iter_mut().for_each(|v| *v = y_max - *v);
        }
        if self.direction == Direction::Decreasing {
            y.reverse();
        }
        if self.curve == Curve::Convex {
            x.reverse();
            y.reverse();
        }
        (x, y)
    }

    fn knee_index(&self, threshold_index: usize, n: usize) -> usize {
        match (self.curve, self.direction) {
            (Curve::Convex, Direction::Decreasing) | (Curve::Concave, Direction::Increasing) => threshold_index,
            (Curve::Convex, Direction::Increasing) | (Curve::Concave, Direction::Decreasing) => n - 1 - threshold_index,
        }
    }
}

fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - min) / range).collect())
}

/// Indices whose value satisfies `cmp` against both neighbours, clipping at the ends
fn relative_extrema(data: &[f64], cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let last = data.len().saturating_sub(1);
    (0..data.len())
        .filter(|&i| {
            let previous = data[i.saturating_sub(1)];
            let next = data[(i + 1).min(last)];
            cmp(data[i], previous) && cmp(data[i], next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ks(n: usize) -> Vec<f64> {
        (1..=n).map(|k| k as f64).collect()
    }

    #[test]
    fn test_sharp_elbow() {
        let y = [100.0, 20.0, 15.0, 12.0, 10.0, 9.0, 8.0, 7.0];
        let knee = KneeLocator::elbow().find_knee(&ks(8), &y);
        assert_eq!(knee, Some(1)); // k = 2
    }

    #[test]
    fn test_reciprocal_curve() {
        let x = ks(9);
        let y: Vec<f64> = x.iter().map(|k| 1.0 / k).collect();
        assert_eq!(KneeLocator::elbow().find_knee(&x, &y), Some(2)); // k = 3
    }

    #[test]
    fn test_too_few_points() {
        assert_eq!(KneeLocator::elbow().find_knee(&ks(2), &[10.0, 5.0]), None);
        assert_eq!(KneeLocator::elbow().find_knee(&ks(3), &[10.0, 5.0, 4.0]), None);
        assert_eq!(KneeLocator::elbow().find_knee(&[], &[]), None);
    }

    #[test]
    fn test_flat_and_straight_curves() {
        assert_eq!(KneeLocator::elbow().find_knee(&ks(4), &[5.0; 4]), None);
        assert_eq!(KneeLocator::elbow().find_knee(&ks(5), &[10.0, 8.0, 6.0, 4.0, 2.0]), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(KneeLocator::elbow().find_knee(&ks(3), &[1.0, 2.0]), None);
        assert_eq!(KneeLocator::elbow().find_knee(&ks(3), &[3.0, f64::NAN, 1.0]), None);
    }

    #[test]
    fn test_relative_extrema_clips_ends() {
        let data = [0.0, 1.0, 1.0, 0.5];
        assert_eq!(relative_extrema(&data, |a, b| a >= b), vec![1, 2]);
        assert_eq!(relative_extrema(&data, |a, b| a <= b), vec![0, 3]);
    }
}
