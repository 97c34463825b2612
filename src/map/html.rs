use log::{debug, info, warn};
use std::fmt::Write as _;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

use super::{DistanceLine, MapSink, Marker, MarkerColor};
use crate::algorithms::Method;
use crate::core::Coordinate;
use crate::sources::{SourceKind, SourceRecord};

const LEAFLET_VERSION: &str = "1.9.4";
const DEFAULT_ZOOM: u8 = 5;

/// Map output errors
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Failed to write map file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Nothing to centre the map on")]
    NoCenter,
}

/// Collects markers and lines and renders them as a Leaflet page
#[derive(Debug, Clone, Default)]
pub struct HtmlMap {
    markers: Vec<Marker>,
    lines: Vec<DistanceLine>,
}

impl HtmlMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn lines(&self) -> &[DistanceLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.lines.is_empty()
    }

    /// Standalone HTML document centred on `center`
    pub fn render(&self, center: &Coordinate) -> String {
        let mut features = String::new();

        for marker in &self.markers {
            let _ = writeln!(
                features,
                "      L.circleMarker([{}, {}], {{color: \"{}\", fillOpacity: 0.6, radius: 9}})\
                 .bindTooltip({}).bindPopup({}).addTo(map);",
                marker.position.latitude,
                marker.position.longitude,
                marker.color.css(),
                js_string(&escape_html(&marker.tooltip)),
                js_string(&marker.popup),
            );
        }

        for line in &self.lines {
            let _ = writeln!(
                features,
                "      L.polyline([[{}, {}], [{}, {}]], {{weight: 3, opacity: 1}}).bindTooltip({}).addTo(map);",
                line.from.latitude,
                line.from.longitude,
                line.to.latitude,
                line.to.longitude,
                js_string(&line.tooltip()),
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Geolocation results</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@{version}/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@{version}/dist/leaflet.js"></script>
    <style>html, body, #map {{ height: 100%; margin: 0; }}</style>
  </head>
  <body>
    <div id="map"></div>
    <script>
      var map = L.map("map").setView([{lat}, {lon}], {zoom});
      L.tileLayer("https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
        attribution: "&copy; OpenStreetMap contributors"
      }}).addTo(map);
{features}    </script>
  </body>
</html>
"#,
            version = LEAFLET_VERSION,
            lat = center.latitude,
            lon = center.longitude,
            zoom = DEFAULT_ZOOM,
            features = features,
        )
    }

    /// Write the page to `<file_name>.html`
    pub fn save(&self, center: &Coordinate, file_name: &str) -> Result<PathBuf, MapError> {
        let path = PathBuf::from(format!("{}.html", file_name));
        debug!(
            "Rendering map with {} markers and {} lines",
            self.markers.len(),
            self.lines.len()
        );
        fs::write(&path, self.render(center)).map_err(|source| MapError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Generated map file {}", path.display());
        Ok(path)
    }
}

impl MapSink for HtmlMap {
    fn add_source_marker(&mut self, name: &str, kind: SourceKind, record: &SourceRecord) {
        let Some(position) = record.coordinate else {
            warn!("Cannot add marker for {} without coordinates", name);
            return;
        };
        info!("Adding marker for {} source {}", kind, name);

        let field = |value: &Option<String>| escape_html(value.as_deref().unwrap_or("unknown"));
        let popup = format!(
            "<b>IP: {}</b><p>Country: {}</p><p>Region: {}</p><p>City: {}</p><p>Location: {:.3} N, {:.3} E</p>",
            record.ip,
            field(&record.country),
            field(&record.region),
            field(&record.city),
            position.latitude,
            position.longitude,
        );

        self.markers.push(Marker {
            position,
            tooltip: name.to_string(),
            popup,
            color: MarkerColor::for_kind(kind),
        });
    }

    fn add_estimate_marker(&mut self, method: Method, ip: Ipv4Addr, location: &Coordinate) {
        info!("Adding marker for {} calculation", method);
        let popup = format!(
            "<p><b>{}</b> location of IP: {} is:</p><p>{:.6} N {:.6} E</p>",
            method, ip, location.latitude, location.longitude
        );
        self.markers.push(Marker {
            position: *location,
            tooltip: method.name().to_string(),
            popup,
            color: MarkerColor::Blue,
        });
    }

    fn add_distance_line(&mut self, from: &Coordinate, to: &Coordinate) {
        self.lines.push(DistanceLine::new(*from, *to));
    }
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JavaScript string literal; `<` is escaped so content cannot close the script element
fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string())
        .to_string()
        .replace('<', "\\u003c")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> SourceRecord {
        SourceRecord::new(Ipv4Addr::new(147, 229, 2, 90))
            .with_coordinate(Coordinate::new(49.1951, 16.6068))
            .with_place(Some("Czechia".into()), None, Some("<Brno>".into()))
    }

    #[test]
    fn test_marker_colors() {
        let mut map = HtmlMap::new();
        map.add_source_marker("IpApi", SourceKind::Noncommercial, &record());
        map.add_source_marker("IpInfo", SourceKind::Commercial, &record());
        map.add_estimate_marker(Method::Average, Ipv4Addr::new(147, 229, 2, 90), &Coordinate::new(49.0, 16.0));

        let colors: Vec<MarkerColor> = map.markers().iter().map(|m| m.color).collect();
        assert_eq!(colors, vec![MarkerColor::Green, MarkerColor::Red, MarkerColor::Blue]);
    }

    #[test]
    fn test_popup_is_escaped() {
        let mut map = HtmlMap::new();
        map.add_source_marker("HostIP", SourceKind::Noncommercial, &record());
        let popup = &map.markers()[0].popup;
        assert!(popup.contains("City: &lt;Brno&gt;"));
        assert!(popup.contains("Region: unknown"));
        assert!(popup.contains("Location: 49.195 N, 16.607 E"));
    }

    #[test]
    fn test_record_without_coordinates_skipped() {
        let mut map = HtmlMap::new();
        map.add_source_marker("HostIP", SourceKind::Noncommercial, &SourceRecord::new(Ipv4Addr::LOCALHOST));
        assert!(map.is_empty());
    }

    #[test]
    fn test_distance_line_tooltip() {
        let mut map = HtmlMap::new();
        map.add_distance_line(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 1.0));
        assert_eq!(map.lines()[0].tooltip(), "Distance: 111.195 km");
    }

    #[test]
    fn test_render_and_save() {
        let mut map = HtmlMap::new();
        map.add_source_marker("IpApi", SourceKind::Noncommercial, &record());
        map.add_distance_line(&Coordinate::new(49.1951, 16.6068), &Coordinate::new(50.0, 14.0));

        let html = map.render(&Coordinate::new(49.5, 15.5));
        assert!(html.contains("setView([49.5, 15.5]"));
        assert!(html.contains("L.circleMarker([49.1951, 16.6068]"));
        assert!(html.contains("L.polyline("));
        assert!(!html.contains("<Brno>"));

        let dir = tempdir().unwrap();
        let base = dir.path().join("locations");
        let path = map.save(&Coordinate::new(49.5, 15.5), &base.to_string_lossy()).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("html"));
        assert_eq!(fs::read_to_string(path).unwrap(), html);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a & "b" <c>"#), "a &amp; &quot;b&quot; &lt;c&gt;");
    }
}
