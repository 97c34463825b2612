//! Lookup facade and output formatting
//!
//! [`Locator`] gathers observations from the configured sources, runs the requested
//! reduction methods and reports features to a [`MapSink`](crate::map::MapSink).

pub mod formatting;
pub mod locator;
pub mod types;

pub use formatting::{CsvFormatter, EstimateFormatter, JsonFormatter, TextFormatter};
pub use locator::Locator;
pub use types::{EstimateReport, Estimates, FetchReport, LocateError, LocateResult, OutputFormat, SourceSelection};
