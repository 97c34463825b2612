//! Aggregation facade: sources in, estimates out

use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use super::types::{names_match, EstimateReport, Estimates, FetchReport, LocateError, LocateResult, SourceSelection};
use crate::algorithms::{reducer_for, Method};
use crate::core::{Coordinate, ObservationSet};
use crate::map::{MapSink, NullSink};
use crate::sources::{
    connector_name, DatabaseSource, HttpSource, LocationSource, Provider, SourceError, StaticSource,
    MAX_MIND_LITE,
};
use crate::utils::config::Settings;
use crate::validation::{FilterResult, ObservationFilter};

struct RegisteredSource {
    key: String,
    active: bool,
    generate_marker: bool,
    source: Box<dyn LocationSource>,
    /// Why the source could not be built; lookups fail with the same error
    unavailable: Option<SourceError>,
}

/// Queries lookup sources and reduces their answers to location estimates
pub struct Locator {
    settings: Settings,
    sources: Vec<RegisteredSource>,
    filter: ObservationFilter,
}

impl Locator {
    /// Build a source for every configured key that has a connector
    ///
    /// Keys without a connector are skipped. A source that cannot be built (missing API
    /// key or database file) stays registered and reports why on every lookup.
    pub fn new(settings: Settings) -> Self {
        let timeout = Duration::from_secs(settings.http.timeout_secs);
        let mut sources = Vec::new();

        for (kind, key, source_settings) in settings.sources() {
            let Some(name) = connector_name(key) else {
                if source_settings.active {
                    warn!("No connector available for source '{}'", key);
                }
                continue;
            };

            let built: Result<Box<dyn LocationSource>, SourceError> = match Provider::from_key(key) {
                Some(provider) => HttpSource::new(provider, source_settings.api_key().map(str::to_string), timeout)
                    .map(|s| Box::new(s) as Box<dyn LocationSource>),
                None if key == MAX_MIND_LITE => DatabaseSource::new(kind, source_settings.db_file().unwrap_or(""))
                    .map(|s| Box::new(s) as Box<dyn LocationSource>),
                None => continue,
            };

            let (source, unavailable) = match built {
                Ok(source) => (source, None),
                Err(e) => {
                    if source_settings.active {
                        warn!("Source '{}' unavailable: {}", key, e);
                    } else {
                        debug!("Source '{}' unavailable: {}", key, e);
                    }
                    let kind = Provider::from_key(key).map_or(kind, |p| p.kind());
                    let placeholder: Box<dyn LocationSource> =
                        Box::new(StaticSource::new(name, kind).failing(e.clone()));
                    (placeholder, Some(e))
                }
            };

            sources.push(RegisteredSource {
                key: key.to_string(),
                active: source_settings.active,
                generate_marker: source_settings.generate_marker,
                source,
                unavailable,
            });
        }

        Self::build(settings, sources)
    }

    /// Use `sources` instead of the configured providers; all of them count as active
    pub fn with_sources(settings: Settings, sources: Vec<Box<dyn LocationSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| {
                let generate_marker = settings
                    .source(source.name())
                    .map(|(_, s)| s.generate_marker)
                    .unwrap_or(true);
                RegisteredSource {
                    key: source.name().to_string(),
                    active: true,
                    generate_marker,
                    source,
                    unavailable: None,
                }
            })
            .collect();

        Self::build(settings, sources)
    }

    fn build(settings: Settings, sources: Vec<RegisteredSource>) -> Self {
        let filter = ObservationFilter::with_config(settings.calculation.filter.clone());
        debug!("Locator ready with {} sources", sources.len());
        Self {
            settings,
            sources,
            filter,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Names of the usable sources and whether each is active
    pub fn source_names(&self) -> Vec<(&str, bool)> {
        self.sources.iter().map(|s| (s.source.name(), s.active)).collect()
    }

    pub fn fetch_observations(&self, ip: Ipv4Addr, selection: &SourceSelection) -> LocateResult<FetchReport> {
        self.fetch_observations_with_sink(ip, selection, &mut NullSink)
    }

    /// Query the selected sources in order, adding markers for sources that want them
    pub fn fetch_observations_with_sink(
        &self,
        ip: Ipv4Addr,
        selection: &SourceSelection,
        sink: &mut dyn MapSink,
    ) -> LocateResult<FetchReport> {
        if let SourceSelection::Named(names) = selection {
            for name in names {
                let registered = self
                    .sources
                    .iter()
                    .find(|s| names_match(name, &s.key, s.source.name()))
                    .ok_or_else(|| LocateError::UnknownSource { name: name.clone() })?;
                if let Some(e) = &registered.unavailable {
                    return Err(LocateError::Source(e.clone()));
                }
            }
        }

        let selected: Vec<&RegisteredSource> = self
            .sources
            .iter()
            .filter(|s| selection.matches(&s.key, s.source.name(), s.source.kind(), s.active))
            .collect();
        if selected.is_empty() {
            return Err(LocateError::NoSources);
        }

        info!("Gathering location records for IP address {}", ip);
        let mut responses = Vec::with_capacity(selected.len());
        let mut errors = Vec::new();

        for registered in selected {
            let source = &registered.source;
            let name = source.name().to_string();
            match source.lookup(ip) {
                Ok(record) => {
                    if registered.generate_marker && self.filter.check(record.coordinate.as_ref()).is_ok() {
                        sink.add_source_marker(&name, source.kind(), &record);
                    }
                    responses.push((name, record.coordinate));
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("{}: {}", name, e);
                    } else {
                        error!("{}: {}", name, e);
                    }
                    errors.push((name.clone(), e));
                    responses.push((name, None));
                }
            }
        }

        let filtered = self.filter.filter(responses);
        info!(
            "Collected {} observations, {} sources without usable data",
            filtered.accepted_count(),
            filtered.rejected_count()
        );

        Ok(FetchReport {
            ip,
            observations: filtered.observations,
            rejected: filtered.rejected,
            errors,
        })
    }

    /// Run each requested method once; results are keyed in [`Method`] order
    pub fn calculate(&self, observations: &ObservationSet, methods: &[Method]) -> LocateResult<Estimates> {
        debug!("Calculation started for {} observations", observations.len());

        let required = self.settings.calculation.min_observations;
        if observations.len() < required {
            error!("Not enough locations to start calculation!");
            return Err(LocateError::InsufficientObservations {
                available: observations.len(),
                required,
            });
        }

        let mut estimates = Estimates::new();
        for &method in methods {
            if estimates.is_requested(method) {
                continue;
            }
            debug!("Calculation of {} location is active", method);
            let location = reducer_for(method, &self.settings.calculation.clustering).calculate(observations);
            if location.is_none() {
                warn!("{} could not produce a location from the observations", method);
            }
            estimates.insert(method, location);
        }

        Ok(estimates)
    }

    /// [`calculate`](Self::calculate), then mark every estimate and join it to each observation
    pub fn calculate_with_sink(
        &self,
        ip: Ipv4Addr,
        observations: &ObservationSet,
        methods: &[Method],
        sink: &mut dyn MapSink,
    ) -> LocateResult<Estimates> {
        let estimates = self.calculate(observations, methods)?;

        for (method, location) in estimates.produced() {
            sink.add_estimate_marker(method, ip, &location);
            for observation in observations.coordinates() {
                sink.add_distance_line(observation, &location);
            }
        }

        Ok(estimates)
    }

    pub fn locate(&self, ip: Ipv4Addr, selection: &SourceSelection, methods: &[Method]) -> LocateResult<EstimateReport> {
        self.locate_with_sink(ip, selection, methods, &mut NullSink)
    }

    pub fn locate_with_sink(
        &self,
        ip: Ipv4Addr,
        selection: &SourceSelection,
        methods: &[Method],
        sink: &mut dyn MapSink,
    ) -> LocateResult<EstimateReport> {
        let fetched = self.fetch_observations_with_sink(ip, selection, sink)?;
        let estimates = self.calculate_with_sink(ip, &fetched.observations, methods, sink)?;
        Ok(EstimateReport {
            ip: Some(ip),
            observations: fetched.observations,
            estimates,
        })
    }

    /// Decode `{"source": {"latitude": .., "longitude": ..} | null}` and filter it
    pub fn observations_from_json(&self, json: &str) -> LocateResult<FilterResult> {
        let raw: BTreeMap<String, Option<Coordinate>> =
            serde_json::from_str(json).map_err(|e| LocateError::InvalidInput { details: e.to_string() })?;
        Ok(self.filter.filter(raw))
    }

    /// Where a map should be centred: first estimate, else first observation
    pub fn map_center(observations: &ObservationSet, estimates: &Estimates) -> Option<Coordinate> {
        estimates
            .produced()
            .map(|(_, location)| location)
            .next()
            .or_else(|| observations.first().map(|(_, c)| *c))
    }
}
