//! Observation filtering ahead of the reducers

pub mod data;

pub use data::{FilterConfig, FilterResult, ObservationFilter, RejectReason};
