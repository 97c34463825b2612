//! Output formatting for estimates

use super::types::{EstimateReport, LocateResult, OutputFormat};

/// Renders an [`EstimateReport`] as text
pub trait EstimateFormatter {
    fn format(&self, report: &EstimateReport) -> LocateResult<String>;
}

impl OutputFormat {
    /// Formatter for this format with default options
    pub fn formatter(&self) -> Box<dyn EstimateFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter::new()),
            OutputFormat::Json => Box::new(JsonFormatter::pretty()),
            OutputFormat::Csv => Box::new(CsvFormatter::new()),
        }
    }
}

/// Human-readable text formatter
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// List the observations before the estimates
    pub include_observations: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        Self {
            include_observations: true,
        }
    }
}

impl EstimateFormatter for TextFormatter {
    fn format(&self, report: &EstimateReport) -> LocateResult<String> {
        let mut lines = Vec::new();

        if self.include_observations {
            match report.ip {
                Some(ip) => lines.push(format!("Observations for {}:", ip)),
                None => lines.push("Observations:".to_string()),
            }
            for (source, coordinate) in report.observations.iter() {
                lines.push(format!("  {}: {}", source, coordinate));
            }
        }

        for (method, location) in report.estimates.iter() {
            match location {
                Some(location) => lines.push(format!("Location estimated by {} is: {}", method, location)),
                None => lines.push(format!("Insufficient data for {}", method)),
            }
        }

        Ok(lines.join("\n"))
    }
}

/// JSON formatter for structured output
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl EstimateFormatter for JsonFormatter {
    fn format(&self, report: &EstimateReport) -> LocateResult<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }
}

/// CSV formatter, one row per requested method
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> &'static str {
        "method,latitude,longitude"
    }
}

impl EstimateFormatter for CsvFormatter {
    fn format(&self, report: &EstimateReport) -> LocateResult<String> {
        let mut rows = Vec::new();
        if self.include_header {
            rows.push(self.header().to_string());
        }
        for (method, location) in report.estimates.iter() {
            rows.push(match location {
                Some(c) => format!("{},{},{}", method, c.latitude, c.longitude),
                None => format!("{},,", method),
            });
        }
        Ok(rows.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::Method;
    use crate::api::types::Estimates;
    use crate::core::{Coordinate, ObservationSet};
    use std::net::Ipv4Addr;

    fn report() -> EstimateReport {
        let observations: ObservationSet = vec![
            ("A", Coordinate::new(50.0, 14.0)),
            ("B", Coordinate::new(50.2, 14.4)),
        ]
        .into_iter()
        .collect();
        let mut estimates = Estimates::new();
        estimates.insert(Method::Average, Some(Coordinate::new(50.1, 14.2)));
        estimates.insert(Method::Clustering, None);
        EstimateReport {
            ip: Some(Ipv4Addr::new(147, 229, 2, 90)),
            observations,
            estimates,
        }
    }

    #[test]
    fn test_text_output() {
        let text = TextFormatter::new().format(&report()).unwrap();
        assert_eq!(
            text,
            "Location estimated by Average is: 50.100000 N, 14.200000 E\nInsufficient data for Clustering"
        );
    }

    #[test]
    fn test_verbose_text_lists_observations() {
        let text = TextFormatter::verbose().format(&report()).unwrap();
        assert!(text.starts_with("Observations for 147.229.2.90:\n  A: 50.000000 N, 14.000000 E"));
    }

    #[test]
    fn test_json_output() {
        let json = JsonFormatter::new().format(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ip"], "147.229.2.90");
        assert_eq!(value["observations"]["B"]["longitude"], 14.4);
        assert_eq!(value["estimates"]["average"]["latitude"], 50.1);
        assert!(value["estimates"]["clustering"].is_null());
        assert!(value["estimates"].get("median").is_none());
    }

    #[test]
    fn test_csv_output() {
        let csv = CsvFormatter::new().format(&report()).unwrap();
        assert_eq!(csv, "method,latitude,longitude\nAverage,50.1,14.2\nClustering,,");
    }

    #[test]
    fn test_format_dispatch() {
        let csv = OutputFormat::Csv.formatter().format(&report()).unwrap();
        assert!(csv.starts_with("method,"));
    }
}
