//! In-memory lookup source

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::{LocationSource, SourceError, SourceKind, SourceRecord, SourceResult};
use crate::core::Coordinate;

/// Source answering from preconfigured records
///
/// Lookup order: configured failure, then the per-address record, then the
/// coordinate shared by every address. Anything else is `NotFound`.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    kind: SourceKind,
    records: HashMap<Ipv4Addr, SourceRecord>,
    fallback: Option<Coordinate>,
    failure: Option<SourceError>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            records: HashMap::new(),
            fallback: None,
            failure: None,
        }
    }

    pub fn with_record(mut self, record: SourceRecord) -> Self {
        self.records.insert(record.ip, record);
        self
    }

    pub fn with_coordinate_for_all(mut self, coordinate: Coordinate) -> Self {
        self.fallback = Some(coordinate);
        self
    }

    /// Every lookup fails with `error`
    pub fn failing(mut self, error: SourceError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl LocationSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn lookup(&self, ip: Ipv4Addr) -> SourceResult<SourceRecord> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some(record) = self.records.get(&ip) {
            return Ok(record.clone());
        }
        match self.fallback {
            Some(coordinate) => Ok(SourceRecord::new(ip).with_coordinate(coordinate)),
            None => Err(SourceError::NotFound {
                provider: self.name.clone(),
                ip,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let known = Ipv4Addr::new(1, 1, 1, 1);
        let other = Ipv4Addr::new(9, 9, 9, 9);
        let source = StaticSource::new("Fixture", SourceKind::Commercial)
            .with_record(SourceRecord::new(known).with_coordinate(Coordinate::new(-33.9, 151.2)))
            .with_coordinate_for_all(Coordinate::new(0.0, 0.0));

        assert_eq!(source.lookup(known).unwrap().coordinate, Some(Coordinate::new(-33.9, 151.2)));
        assert_eq!(source.lookup(other).unwrap().coordinate, Some(Coordinate::new(0.0, 0.0)));
    }

    #[test]
    fn test_unknown_address_not_found() {
        let source = StaticSource::new("Empty", SourceKind::Noncommercial);
        assert!(matches!(
            source.lookup(Ipv4Addr::LOCALHOST),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_failure_wins() {
        let source = StaticSource::new("Down", SourceKind::Noncommercial)
            .with_coordinate_for_all(Coordinate::new(1.0, 1.0))
            .failing(SourceError::Service {
                provider: "Down".into(),
                status: 503,
            });
        assert!(source.lookup(Ipv4Addr::LOCALHOST).is_err());
    }
}
