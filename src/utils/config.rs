use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::algorithms::ClusteringConfig;
use crate::sources::{connector_name, Provider, SourceKind, MAX_MIND_LITE};
use crate::validation::FilterConfig;

/// Default settings file name
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Per-source settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Query this source
    pub active: bool,
    /// Place a marker for this source on the map
    pub generate_marker: bool,
    /// API key or access token
    pub api_key: Option<String>,
    /// Local database file
    pub db_file: Option<String>,
}

impl SourceSettings {
    fn enabled() -> Self {
        Self {
            active: true,
            generate_marker: true,
            ..Self::default()
        }
    }

    fn keyed() -> Self {
        Self {
            api_key: Some(String::new()),
            ..Self::default()
        }
    }

    fn local_database() -> Self {
        Self {
            db_file: Some(String::new()),
            ..Self::default()
        }
    }

    /// Non-empty API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Non-empty database file path
    pub fn db_file(&self) -> Option<&str> {
        self.db_file.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }
}

/// Parameters for the calculation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSettings {
    /// Fewer observations than this and no method is run
    pub min_observations: usize,
    pub clustering: ClusteringConfig,
    pub filter: FilterConfig,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            min_observations: crate::core::MIN_CALCULATION_OBSERVATIONS,
            clustering: ClusteringConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

/// Map output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Write a map on every lookup
    pub generate: bool,
    /// Output name without the `.html` extension
    pub file_name: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            generate: false,
            file_name: "map".to_string(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Contents of the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub noncommercial: BTreeMap<String, SourceSettings>,
    pub commercial: BTreeMap<String, SourceSettings>,
    pub calculation: CalculationSettings,
    pub map: MapSettings,
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut noncommercial = BTreeMap::new();
        noncommercial.insert(Provider::IpApi.key().to_string(), SourceSettings::enabled());
        noncommercial.insert(Provider::HostIp.key().to_string(), SourceSettings::enabled());
        noncommercial.insert(Provider::Ipstack.key().to_string(), SourceSettings::keyed());
        noncommercial.insert(MAX_MIND_LITE.to_string(), SourceSettings::local_database());

        let mut commercial = BTreeMap::new();
        commercial.insert(Provider::IpInfo.key().to_string(), SourceSettings::keyed());

        Self {
            noncommercial,
            commercial,
            calculation: CalculationSettings::default(),
            map: MapSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl Settings {
    /// All configured sources, noncommercial first
    pub fn sources(&self) -> impl Iterator<Item = (SourceKind, &str, &SourceSettings)> {
        self.noncommercial
            .iter()
            .map(|(k, s)| (SourceKind::Noncommercial, k.as_str(), s))
            .chain(
                self.commercial
                    .iter()
                    .map(|(k, s)| (SourceKind::Commercial, k.as_str(), s)),
            )
    }

    /// Settings for `key` in whichever section holds it
    pub fn source(&self, key: &str) -> Option<(SourceKind, &SourceSettings)> {
        self.sources().find(|(_, k, _)| *k == key).map(|(kind, _, s)| (kind, s))
    }

    fn source_mut(&mut self, key: &str) -> Option<&mut SourceSettings> {
        if self.noncommercial.contains_key(key) {
            self.noncommercial.get_mut(key)
        } else {
            self.commercial.get_mut(key)
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid parameter {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Unknown source '{name}'")]
    UnknownSource { name: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Outcome of validating a settings value
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn into_result(self) -> Result<(), ConfigError> {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Loads, validates, updates and saves the settings file
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    settings: Settings,
    config_file_path: Option<PathBuf>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Manager holding default settings, not bound to a file
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager holding `settings` after validation
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        Self::validate_settings(&settings).into_result()?;
        Ok(Self {
            settings,
            config_file_path: None,
            is_modified: false,
        })
    }

    /// Load settings from an existing file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    /// Load settings, writing the defaults first when the file does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        info!("Settings file {} not found, creating defaults", path.display());
        let mut manager = Self::new();
        manager.save_to_file(path)?;
        Ok(manager)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Replace all settings after validation
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).into_result()?;
        self.settings = settings;
        self.is_modified = true;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            message: format!("Failed to read settings file '{}': {}", path.display(), e),
        })?;

        let settings: Settings = serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
            message: format!("Failed to parse settings file '{}': {}", path.display(), e),
        })?;

        Self::validate_settings(&settings).into_result()?;

        self.settings = settings;
        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        info!("Loaded settings from {}", path.display());
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.settings).map_err(|e| ConfigError::Serialization {
            message: format!("Failed to serialize settings: {}", e),
        })?;

        fs::write(path, content).map_err(|e| ConfigError::Io {
            message: format!("Failed to write settings file '{}': {}", path.display(), e),
        })?;

        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the settings were loaded from
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::Io {
                message: "No file path set for saving settings".to_string(),
            }),
        }
    }

    pub fn set_source_active(&mut self, key: &str, active: bool) -> Result<bool, ConfigError> {
        self.source_entry(key)?.active = active;
        self.is_modified = true;
        Ok(active)
    }

    pub fn set_generate_marker(&mut self, key: &str, generate: bool) -> Result<bool, ConfigError> {
        self.source_entry(key)?.generate_marker = generate;
        self.is_modified = true;
        Ok(generate)
    }

    pub fn set_api_key(&mut self, key: &str, api_key: Option<String>) -> Result<(), ConfigError> {
        self.source_entry(key)?.api_key = api_key;
        self.is_modified = true;
        Ok(())
    }

    pub fn set_db_file(&mut self, key: &str, db_file: Option<String>) -> Result<(), ConfigError> {
        self.source_entry(key)?.db_file = db_file;
        self.is_modified = true;
        Ok(())
    }

    pub fn set_min_observations(&mut self, count: usize) -> Result<usize, ConfigError> {
        if count == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "calculation.min_observations".to_string(),
                value: count.to_string(),
                reason: "At least one observation is required".to_string(),
            });
        }
        self.settings.calculation.min_observations = count;
        self.is_modified = true;
        Ok(count)
    }

    pub fn set_http_timeout(&mut self, timeout_secs: u64) -> Result<u64, ConfigError> {
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "http.timeout_secs".to_string(),
                value: timeout_secs.to_string(),
                reason: "Timeout must be positive".to_string(),
            });
        }
        self.settings.http.timeout_secs = timeout_secs;
        self.is_modified = true;
        Ok(timeout_secs)
    }

    pub fn set_map_generation(&mut self, generate: bool, file_name: Option<String>) -> Result<(), ConfigError> {
        if let Some(name) = file_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidParameter {
                    parameter: "map.file_name".to_string(),
                    value: name,
                    reason: "Map file name cannot be empty".to_string(),
                });
            }
            self.settings.map.file_name = name;
        }
        self.settings.map.generate = generate;
        self.is_modified = true;
        Ok(())
    }

    fn source_entry(&mut self, key: &str) -> Result<&mut SourceSettings, ConfigError> {
        self.settings.source_mut(key).ok_or_else(|| ConfigError::UnknownSource {
            name: key.to_string(),
        })
    }

    /// Check a settings value without applying it
    pub fn validate_settings(settings: &Settings) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let calculation = &settings.calculation;
        if calculation.min_observations == 0 {
            errors.push(invalid(
                "calculation.min_observations",
                calculation.min_observations,
                "At least one observation is required",
            ));
        } else if calculation.min_observations == 1 {
            warnings.push("A single observation is reported as its own estimate".to_string());
        }

        let clustering = &calculation.clustering;
        if !(clustering.elbow_sensitivity.is_finite() && clustering.elbow_sensitivity > 0.0) {
            errors.push(invalid(
                "calculation.clustering.elbow_sensitivity",
                clustering.elbow_sensitivity,
                "Sensitivity must be a positive number",
            ));
        }
        if clustering.max_candidate_clusters == 0 {
            errors.push(invalid(
                "calculation.clustering.max_candidate_clusters",
                clustering.max_candidate_clusters,
                "At least one candidate cluster count is required",
            ));
        }
        if clustering.kmeans.n_init == 0 {
            errors.push(invalid(
                "calculation.clustering.kmeans.n_init",
                clustering.kmeans.n_init,
                "At least one k-means run is required",
            ));
        }
        if clustering.kmeans.max_iterations == 0 {
            errors.push(invalid(
                "calculation.clustering.kmeans.max_iterations",
                clustering.kmeans.max_iterations,
                "At least one iteration is required",
            ));
        }
        if !(clustering.kmeans.tolerance.is_finite() && clustering.kmeans.tolerance >= 0.0) {
            errors.push(invalid(
                "calculation.clustering.kmeans.tolerance",
                clustering.kmeans.tolerance,
                "Tolerance must be a non-negative number",
            ));
        }

        if settings.http.timeout_secs == 0 {
            errors.push(invalid("http.timeout_secs", settings.http.timeout_secs, "Timeout must be positive"));
        } else if settings.http.timeout_secs > 120 {
            warnings.push("Very long HTTP timeout may stall lookups".to_string());
        }

        if settings.map.generate && settings.map.file_name.trim().is_empty() {
            errors.push(invalid("map.file_name", "\"\"", "Map file name cannot be empty"));
        }

        for (_, key, source) in settings.sources().filter(|(_, _, s)| s.active) {
            if connector_name(key).is_none() {
                warnings.push(format!("Source '{}' is active but has no connector", key));
            } else if key == MAX_MIND_LITE && source.db_file().is_none() {
                warnings.push(format!("Source '{}' is active but has no database file", key));
            } else if Provider::from_key(key).is_some_and(|p| p.requires_api_key()) && source.api_key().is_none() {
                warnings.push(format!("Source '{}' is active but has no API key", key));
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
