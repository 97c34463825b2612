//! Great-circle distance helpers

use crate::core::{Coordinate, EARTH_RADIUS_KM};

/// Haversine great-circle distance between two coordinates (km)
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinate::new(50.08, 14.42);
        assert!(haversine_km(&p, &p).abs() < 1e-12);
    }

    #[test]
    fn test_prague_to_brno() {
        let prague = Coordinate::new(50.0755, 14.4378);
        let brno = Coordinate::new(49.1951, 16.6068);
        let d = haversine_km(&prague, &brno);
        assert!((d - 185.0).abs() < 3.0, "distance was {}", d);
    }

    #[test]
    fn test_symmetric() {
        let a = Coordinate::new(-33.86, 151.21);
        let b = Coordinate::new(51.5, -0.12);
        assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-9);
    }
}
