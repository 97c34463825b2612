//! Numeric constants shared by the reducers and geodesy helpers

/// Decimal places kept in every reduction result
///
/// Results are rounded to the nearest decimal of the exact stored value (see
/// [`round_to`](crate::core::round_to)), not by scaling and rounding half away from zero.
pub const RESULT_DECIMAL_PLACES: u32 = 4;

/// Minimum observations the clustering reducer needs to compare cluster counts
pub const MIN_CLUSTERING_OBSERVATIONS: usize = 3;

/// Minimum observations the facade needs before running any calculation
pub const MIN_CALCULATION_OBSERVATIONS: usize = 2;

/// Upper bound on candidate cluster counts swept by the clustering reducer
pub const MAX_CANDIDATE_CLUSTERS: usize = 64;

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
