//! Core types and constants for location reduction

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
