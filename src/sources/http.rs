//! HTTP JSON lookup services

use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use super::{LocationSource, SourceError, SourceKind, SourceRecord, SourceResult};
use crate::core::Coordinate;

/// Supported HTTP lookup services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    IpApi,
    IpInfo,
    Ipstack,
    HostIp,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Provider::IpApi, Provider::IpInfo, Provider::Ipstack, Provider::HostIp];

    /// Key used in the settings file
    pub fn key(&self) -> &'static str {
        match self {
            Provider::IpApi => "ip_api",
            Provider::IpInfo => "ip_info",
            Provider::Ipstack => "ipstack",
            Provider::HostIp => "host_ip",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Name used as the observation key
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::IpApi => "IpApi",
            Provider::IpInfo => "IpInfo",
            Provider::Ipstack => "Ipstack",
            Provider::HostIp => "HostIP",
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Provider::IpInfo => SourceKind::Commercial,
            Provider::IpApi | Provider::Ipstack | Provider::HostIp => SourceKind::Noncommercial,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Provider::IpInfo | Provider::Ipstack)
    }

    /// Request URL for `ip`
    pub fn url(&self, ip: Ipv4Addr, api_key: Option<&str>) -> String {
        let key = api_key.unwrap_or_default();
        match self {
            Provider::IpApi => format!("http://ip-api.com/json/{}", ip),
            Provider::IpInfo => format!("https://ipinfo.io/{}/json?token={}", ip, key),
            Provider::Ipstack => format!("http://api.ipstack.com/{}?access_key={}", ip, key),
            Provider::HostIp => format!("http://api.hostip.info/get_json.php?ip={}&position=true", ip),
        }
    }

    /// Decode a provider response body
    pub fn parse(&self, ip: Ipv4Addr, body: &Value) -> SourceResult<SourceRecord> {
        if !body.is_object() {
            return Err(self.invalid("expected a JSON object"));
        }

        let (coordinate, country, region, city) = match self {
            Provider::IpApi => {
                if text_field(body, "status").as_deref() == Some("fail") {
                    let message = text_field(body, "message").unwrap_or_else(|| "unknown failure".to_string());
                    return Err(match message.as_str() {
                        "private range" | "reserved range" => self.not_found(ip),
                        "invalid query" => self.invalid(&message),
                        _ => SourceError::Service {
                            provider: self.display_name().to_string(),
                            status: 200,
                        },
                    });
                }
                (
                    coordinate_pair(number_field(body, "lat"), number_field(body, "lon")),
                    text_field(body, "country"),
                    text_field(body, "regionName"),
                    text_field(body, "city"),
                )
            }
            Provider::IpInfo => {
                if body.get("bogon").and_then(Value::as_bool) == Some(true) {
                    return Err(self.not_found(ip));
                }
                let coordinate = match text_field(body, "loc") {
                    Some(loc) => Some(parse_loc(&loc).ok_or_else(|| self.invalid(&format!("bad loc '{}'", loc)))?),
                    None => None,
                };
                (
                    coordinate,
                    text_field(body, "country"),
                    text_field(body, "region"),
                    text_field(body, "city"),
                )
            }
            Provider::Ipstack => {
                if let Some(error) = body.get("error") {
                    let code = error.get("code").and_then(Value::as_u64).unwrap_or_default();
                    let provider = self.display_name().to_string();
                    return Err(match code {
                        101..=103 => SourceError::PermissionRequired { provider },
                        104 => SourceError::LimitExceeded { provider },
                        _ => SourceError::InvalidResponse {
                            provider,
                            details: text_field(error, "info").unwrap_or_else(|| format!("error code {}", code)),
                        },
                    });
                }
                (
                    coordinate_pair(number_field(body, "latitude"), number_field(body, "longitude")),
                    text_field(body, "country_name"),
                    text_field(body, "region_name"),
                    text_field(body, "city"),
                )
            }
            Provider::HostIp => (
                coordinate_pair(number_field(body, "lat"), number_field(body, "lng")),
                text_field(body, "country_name").filter(|c| !c.starts_with("(Unknown")),
                None,
                text_field(body, "city").filter(|c| !c.starts_with("(Unknown")),
            ),
        };

        let coordinate = coordinate.ok_or_else(|| SourceError::MissingCoordinates {
            provider: self.display_name().to_string(),
            ip,
        })?;

        Ok(SourceRecord::new(ip)
            .with_coordinate(coordinate)
            .with_place(country, region, city))
    }

    fn invalid(&self, details: &str) -> SourceError {
        SourceError::InvalidResponse {
            provider: self.display_name().to_string(),
            details: details.to_string(),
        }
    }

    fn not_found(&self, ip: Ipv4Addr) -> SourceError {
        SourceError::NotFound {
            provider: self.display_name().to_string(),
            ip,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A provider reached over a blocking HTTP client
#[derive(Debug, Clone)]
pub struct HttpSource {
    provider: Provider,
    api_key: Option<String>,
    client: Client,
}

impl HttpSource {
    /// Build a source whose requests are bounded by `timeout`
    pub fn new(provider: Provider, api_key: Option<String>, timeout: Duration) -> SourceResult<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if provider.requires_api_key() && api_key.is_none() {
            return Err(SourceError::NotConfigured {
                provider: provider.display_name().to_string(),
                details: "an API key is required".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geolocator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::NotConfigured {
                provider: provider.display_name().to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            provider,
            api_key,
            client,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

impl LocationSource for HttpSource {
    fn name(&self) -> &str {
        self.provider.display_name()
    }

    fn kind(&self) -> SourceKind {
        self.provider.kind()
    }

    fn lookup(&self, ip: Ipv4Addr) -> SourceResult<SourceRecord> {
        let url = self.provider.url(ip, self.api_key.as_deref());
        debug!("Querying {} for {}", self.name(), ip);

        let response = self.client.get(&url).send().map_err(|e| SourceError::Request {
            provider: self.name().to_string(),
            details: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status(self.name(), ip, status.as_u16()));
        }

        let body: Value = response.json().map_err(|e| SourceError::InvalidResponse {
            provider: self.name().to_string(),
            details: e.to_string(),
        })?;

        let record = self.provider.parse(ip, &body)?;
        if let Some(coordinate) = &record.coordinate {
            info!(
                "{} returned location {:.3} N, {:.3} E",
                self.name(),
                coordinate.latitude,
                coordinate.longitude
            );
        }
        Ok(record)
    }
}

/// Non-empty string field
fn text_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numeric field, accepting numbers encoded as strings
fn number_field(body: &Value, key: &str) -> Option<f64> {
    match body.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coordinate_pair(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinate> {
    Some(Coordinate::new(latitude?, longitude?))
}

/// "lat,lon" as returned by ipinfo
fn parse_loc(loc: &str) -> Option<Coordinate> {
    let (lat, lon) = loc.split_once(',')?;
    Some(Coordinate::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IP: Ipv4Addr = Ipv4Addr::new(147, 229, 2, 90);

    #[test]
    fn test_parse_ip_api() {
        let body = json!({
            "status": "success",
            "country": "Czechia",
            "regionName": "South Moravian",
            "city": "Brno",
            "lat": 49.1951,
            "lon": 16.6068
        });
        let record = Provider::IpApi.parse(IP, &body).unwrap();
        assert_eq!(record.coordinate, Some(Coordinate::new(49.1951, 16.6068)));
        assert_eq!(record.city.as_deref(), Some("Brno"));
        assert_eq!(record.region.as_deref(), Some("South Moravian"));

        let fail = json!({"status": "fail", "message": "private range"});
        assert!(matches!(
            Provider::IpApi.parse(Ipv4Addr::new(10, 0, 0, 1), &fail),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_parse_ipinfo() {
        let body = json!({"ip": "147.229.2.90", "city": "Brno", "region": "South Moravian", "country": "CZ", "loc": "49.1952,16.6080"});
        let record = Provider::IpInfo.parse(IP, &body).unwrap();
        assert_eq!(record.coordinate, Some(Coordinate::new(49.1952, 16.608)));
        assert_eq!(record.country.as_deref(), Some("CZ"));

        let bogon = json!({"ip": "10.0.0.1", "bogon": true});
        assert!(matches!(Provider::IpInfo.parse(IP, &bogon), Err(SourceError::NotFound { .. })));

        let broken = json!({"loc": "north"});
        assert!(matches!(
            Provider::IpInfo.parse(IP, &broken),
            Err(SourceError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_parse_ipstack_errors() {
        let denied = json!({"success": false, "error": {"code": 101, "type": "invalid_access_key"}});
        assert!(matches!(
            Provider::Ipstack.parse(IP, &denied),
            Err(SourceError::PermissionRequired { .. })
        ));

        let limit = json!({"success": false, "error": {"code": 104}});
        assert!(matches!(Provider::Ipstack.parse(IP, &limit), Err(SourceError::LimitExceeded { .. })));

        let empty = json!({"ip": "147.229.2.90", "latitude": null, "longitude": null});
        assert!(matches!(
            Provider::Ipstack.parse(IP, &empty),
            Err(SourceError::MissingCoordinates { .. })
        ));
    }

    #[test]
    fn test_parse_hostip_string_coordinates() {
        let body = json!({"country_name": "CZECH REPUBLIC", "city": "Brno", "lat": "49.2", "lng": "16.6333"});
        let record = Provider::HostIp.parse(IP, &body).unwrap();
        assert_eq!(record.coordinate, Some(Coordinate::new(49.2, 16.6333)));

        let unknown = json!({"country_name": "(Unknown Country?)", "city": "(Unknown City?)"});
        assert!(matches!(
            Provider::HostIp.parse(IP, &unknown),
            Err(SourceError::MissingCoordinates { .. })
        ));
    }

    #[test]
    fn test_non_object_body_rejected() {
        assert!(matches!(
            Provider::IpApi.parse(IP, &json!([1, 2])),
            Err(SourceError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_keys_and_urls() {
        for provider in Provider::ALL {
            assert_eq!(Provider::from_key(provider.key()), Some(provider));
        }
        assert_eq!(Provider::from_key("max_mind"), None);
        assert_eq!(
            Provider::Ipstack.url(IP, Some("abc")),
            "http://api.ipstack.com/147.229.2.90?access_key=abc"
        );
    }

    #[test]
    fn test_missing_api_key_is_not_configured() {
        let result = HttpSource::new(Provider::IpInfo, Some("  ".to_string()), Duration::from_secs(5));
        assert!(matches!(result, Err(SourceError::NotConfigured { .. })));
        let source = HttpSource::new(Provider::HostIp, None, Duration::from_secs(5)).unwrap();
        assert_eq!(source.name(), "HostIP");
        assert_eq!(source.kind(), SourceKind::Noncommercial);
    }
}
