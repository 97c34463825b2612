//! Offline lookups in a MaxMind GeoLite2 City database file

use log::{debug, info};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use super::{LocationSource, SourceError, SourceKind, SourceRecord, SourceResult};
use crate::core::Coordinate;

/// Settings key of the GeoLite2 City source
pub const MAX_MIND_LITE: &str = "max_mind_lite";

/// Observation name of the GeoLite2 City source
pub const MAX_MIND_LITE_NAME: &str = "MaxMindGeoLite2City";

/// Source reading a local `.mmdb` file
///
/// The file is read on the first lookup, so an unused source costs nothing.
pub struct DatabaseSource {
    kind: SourceKind,
    path: PathBuf,
    reader: OnceCell<SourceResult<Reader<Vec<u8>>>>,
}

impl DatabaseSource {
    /// Source for the database at `path`, which must exist
    pub fn new(kind: SourceKind, path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(not_configured("a database file is required"));
        }
        if !path.is_file() {
            return Err(not_configured(&format!("database file '{}' not found", path.display())));
        }

        Ok(Self {
            kind,
            path: path.to_path_buf(),
            reader: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> SourceResult<&Reader<Vec<u8>>> {
        self.reader
            .get_or_init(|| {
                debug!("Opening {}", self.path.display());
                Reader::open_readfile(&self.path)
                    .map_err(|e| not_configured(&format!("cannot open '{}': {}", self.path.display(), e)))
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl LocationSource for DatabaseSource {
    fn name(&self) -> &str {
        MAX_MIND_LITE_NAME
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn lookup(&self, ip: Ipv4Addr) -> SourceResult<SourceRecord> {
        let city: geoip2::City = match self.reader()?.lookup(IpAddr::V4(ip)) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                return Err(SourceError::NotFound {
                    provider: MAX_MIND_LITE_NAME.to_string(),
                    ip,
                })
            }
            Err(e) => {
                return Err(SourceError::InvalidResponse {
                    provider: MAX_MIND_LITE_NAME.to_string(),
                    details: e.to_string(),
                })
            }
        };

        let location = city.location.as_ref();
        let coordinate = match (
            location.and_then(|l| l.latitude),
            location.and_then(|l| l.longitude),
        ) {
            (Some(latitude), Some(longitude)) => Coordinate::new(latitude, longitude),
            _ => {
                return Err(SourceError::MissingCoordinates {
                    provider: MAX_MIND_LITE_NAME.to_string(),
                    ip,
                })
            }
        };
        info!("{} returned location {}", MAX_MIND_LITE_NAME, coordinate);

        let country = city
            .country
            .as_ref()
            .and_then(|c| c.iso_code.map(str::to_string).or_else(|| english(&c.names)));
        let region = city
            .subdivisions
            .as_ref()
            .and_then(|s| s.first())
            .and_then(|s| english(&s.names));
        let name = city.city.as_ref().and_then(|c| english(&c.names));

        Ok(SourceRecord::new(ip)
            .with_coordinate(coordinate)
            .with_place(country, region, name))
    }
}

fn english(names: &Option<BTreeMap<&str, &str>>) -> Option<String> {
    names.as_ref()?.get("en").map(|name| name.to_string())
}

fn not_configured(details: &str) -> SourceError {
    SourceError::NotConfigured {
        provider: MAX_MIND_LITE_NAME.to_string(),
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_not_configured() {
        assert!(matches!(
            DatabaseSource::new(SourceKind::Noncommercial, ""),
            Err(SourceError::NotConfigured { .. })
        ));

        let dir = tempdir().unwrap();
        assert!(matches!(
            DatabaseSource::new(SourceKind::Noncommercial, dir.path().join("GeoLite2-City.mmdb")),
            Err(SourceError::NotConfigured { .. })
        ));
    }

    #[test]
    fn test_unreadable_database_fails_on_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("GeoLite2-City.mmdb");
        fs::write(&path, b"not a maxmind database").unwrap();

        let source = DatabaseSource::new(SourceKind::Noncommercial, &path).unwrap();
        assert_eq!(source.name(), MAX_MIND_LITE_NAME);
        assert_eq!(source.path(), path.as_path());

        let ip = Ipv4Addr::new(147, 229, 2, 90);
        assert!(matches!(source.lookup(ip), Err(SourceError::NotConfigured { .. })));
        assert_eq!(source.fetch(ip), None);
    }

    #[test]
    fn test_english_names() {
        let mut names = BTreeMap::new();
        names.insert("de", "Brünn");
        names.insert("en", "Brno");
        assert_eq!(english(&Some(names)), Some("Brno".to_string()));
        assert_eq!(english(&None), None);
    }
}
