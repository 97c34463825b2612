//! Settings and geodesy helpers

pub mod config;
pub mod geo;

pub use config::{ConfigError, ConfigurationManager, Settings, SourceSettings, ValidationResult};
pub use geo::haversine_km;
