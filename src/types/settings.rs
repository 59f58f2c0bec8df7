//! Configuration read from the JSON settings file.
//!
//! Key names follow the layout of the `Settings/config.json` file used by
//! existing deployments. `"Tags"` and `"Fields"` map the output name to the
//! metadata field it is read from (`{"Site Code": "@SiteCode"}`), so older
//! files that list the metadata field first must have those maps inverted.

use crate::error::ConfigError;
use crate::types::point::Point;
use crate::types::window::WINDOW_DAYS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest number of species the export endpoint accepts in one request.
pub const MAX_SPECIES_PER_REQUEST: usize = 6;

/// Number of species requested per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Top-level settings for one harvesting run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(rename = "LAQN")]
    pub source: SourceConfig,
    /// Quantity codes to request; empty means every code in `"Pollutant Codes"`.
    #[serde(rename = "Pollutants", default)]
    pub quantities: Vec<String>,
    /// Sampling period passed to the export (e.g. "hour", "15min").
    #[serde(rename = "Frequency")]
    pub period: String,
    #[serde(rename = "Measurement", default = "default_measurement")]
    pub measurement: String,
    #[serde(rename = "Influx", default)]
    pub influx: Option<InfluxConfig>,
    #[serde(rename = "Pipeline", default)]
    pub pipeline: PipelineOptions,
    #[serde(rename = "Debug Stats", default)]
    pub debug_stats: bool,
}

/// Addresses and name projections for the LAQN API and tabular export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    #[serde(rename = "API Address")]
    pub api_address: String,
    #[serde(rename = "Metadata Address")]
    pub metadata_path: String,
    /// Prefix of the export locator, including the trailing `?`.
    #[serde(rename = "csv Address")]
    pub csv_address: String,
    /// Output tag name -> source field name.
    #[serde(rename = "Tags", default)]
    pub tags: BTreeMap<String, String>,
    /// Output field name -> source field name.
    #[serde(rename = "Fields", default)]
    pub fields: BTreeMap<String, String>,
    /// Quantity code -> the export's species code.
    #[serde(rename = "Pollutant Codes")]
    pub quantity_codes: BTreeMap<String, String>,
    #[serde(rename = "Site Code Field", default = "default_site_code_field")]
    pub site_code_field: String,
    #[serde(rename = "Site Name Field", default = "default_site_name_field")]
    pub site_name_field: String,
}

/// Connection details for an InfluxDB 2.x bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfluxConfig {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Org")]
    pub org: String,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Token")]
    pub token: String,
}

/// How the pipeline reacts to per-station and per-row failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Unparsable rows are skipped; a failed fetch skips the station-window.
    #[default]
    SkipRow,
    /// Any fetch or row error skips the whole station-window.
    SkipStation,
    /// Any error terminates the run.
    AbortRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineOptions {
    #[serde(rename = "Batch Size", default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(rename = "Window Days", default = "default_window_days")]
    pub window_days: u32,
    /// Stations of one window fetched at the same time.
    #[serde(rename = "Station Concurrency", default = "default_station_concurrency")]
    pub station_concurrency: usize,
    #[serde(rename = "Failure Policy", default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            window_days: WINDOW_DAYS,
            station_concurrency: default_station_concurrency(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_measurement() -> String {
    "LAQN".to_string()
}

fn default_site_code_field() -> String {
    "@SiteCode".to_string()
}

fn default_site_name_field() -> String {
    "@SiteName".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_window_days() -> u32 {
    WINDOW_DAYS
}

fn default_station_concurrency() -> usize {
    1
}

impl Settings {
    /// Reads and validates the settings file at `path`.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Quantity codes to request, in request order.
    pub fn requested_quantities(&self) -> Vec<String> {
        if self.quantities.is_empty() {
            self.source.quantity_codes.keys().cloned().collect()
        } else {
            self.quantities.clone()
        }
    }

    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = &self.pipeline;
        if options.batch_size == 0 || options.batch_size > MAX_SPECIES_PER_REQUEST {
            return Err(ConfigError::Invalid(format!(
                "\"Batch Size\" must be between 1 and {}, got {}",
                MAX_SPECIES_PER_REQUEST, options.batch_size
            )));
        }
        if options.window_days == 0 {
            return Err(ConfigError::Invalid(
                "\"Window Days\" must be at least 1".to_string(),
            ));
        }
        if options.station_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "\"Station Concurrency\" must be at least 1".to_string(),
            ));
        }
        if let Some(unknown) = self
            .quantities
            .iter()
            .find(|q| !self.source.quantity_codes.contains_key(*q))
        {
            return Err(ConfigError::Invalid(format!(
                "pollutant \"{}\" has no entry in \"Pollutant Codes\"",
                unknown
            )));
        }
        // Readings are keyed by the export's species code, which may differ
        // from the quantity code.
        let dynamic_keys = self
            .source
            .quantity_codes
            .iter()
            .flat_map(|(quantity, species)| [quantity, species]);
        for quantity in dynamic_keys {
            if self.source.fields.contains_key(quantity) {
                return Err(ConfigError::Invalid(format!(
                    "field \"{}\" collides with the pollutant of the same name",
                    quantity
                )));
            }
            for tag in [Point::status_tag(quantity), Point::units_tag(quantity)] {
                if self.source.tags.contains_key(&tag) {
                    return Err(ConfigError::Invalid(format!(
                        "tag \"{}\" collides with a pollutant tag",
                        tag
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Settings against the public LAQN endpoints, requesting `quantities`
    /// with species codes equal to the quantity codes.
    pub fn settings(quantities: &[&str]) -> Settings {
        Settings {
            source: SourceConfig {
                api_address: "https://api.erg.ic.ac.uk/AirQuality".to_string(),
                metadata_path: "Information/MonitoringSites/GroupName=London/Json".to_string(),
                csv_address: "https://www.londonair.org.uk/london/asp/downloadsite.asp?"
                    .to_string(),
                tags: BTreeMap::from([("Site Code".to_string(), "@SiteCode".to_string())]),
                fields: BTreeMap::from([("Latitude".to_string(), "@Latitude".to_string())]),
                quantity_codes: quantities
                    .iter()
                    .map(|q| (q.to_string(), q.to_string()))
                    .collect(),
                site_code_field: default_site_code_field(),
                site_name_field: default_site_name_field(),
            },
            quantities: quantities.iter().map(|q| q.to_string()).collect(),
            period: "hour".to_string(),
            measurement: default_measurement(),
            influx: None,
            pipeline: PipelineOptions::default(),
            debug_stats: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"{
        "Debug Stats": true,
        "LAQN": {
            "API Address": "https://api.erg.ic.ac.uk/AirQuality",
            "Metadata Address": "Information/MonitoringSites/GroupName=London/Json",
            "csv Address": "https://www.londonair.org.uk/london/asp/downloadsite.asp?",
            "Tags": {"Site Code": "@SiteCode", "Area": "@LocalAuthorityName"},
            "Fields": {"Latitude": "@Latitude", "Longitude": "@Longitude"},
            "Pollutant Codes": {"NO2": "NO2", "PM10": "PM10", "O3": "O3"}
        },
        "Pollutants": ["NO2"],
        "Frequency": "hour"
    }"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_with_defaults() -> Result<(), ConfigError> {
        let file = write_config(CONFIG);
        let settings = Settings::load(file.path())?;

        assert!(settings.debug_stats);
        assert_eq!(settings.period, "hour");
        assert_eq!(settings.measurement, "LAQN");
        assert_eq!(settings.pipeline, PipelineOptions::default());
        assert_eq!(settings.pipeline.batch_size, 5);
        assert_eq!(settings.source.site_code_field, "@SiteCode");
        assert_eq!(settings.source.tags["Area"], "@LocalAuthorityName");
        assert!(settings.influx.is_none());
        Ok(())
    }

    #[test]
    fn test_requested_quantities_defaults_to_all() {
        let file = write_config(CONFIG);
        let mut settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.requested_quantities(), vec!["NO2"]);

        settings.quantities.clear();
        assert_eq!(settings.requested_quantities(), vec!["NO2", "O3", "PM10"]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Settings::load(Path::new("/nonexistent/laqn/config.json"));
        assert!(matches!(result, Err(ConfigError::Read(_, _))));
    }

    #[test]
    fn test_load_malformed_file() {
        let file = write_config("{ not json");
        let result = Settings::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_validate_rejects_bad_batch_size() {
        let file = write_config(CONFIG);
        let mut settings = Settings::load(file.path()).unwrap();
        settings.pipeline.batch_size = 7;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        settings.pipeline.batch_size = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        settings.pipeline.batch_size = 6;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_pollutant() {
        let file = write_config(CONFIG);
        let mut settings = Settings::load(file.path()).unwrap();
        settings.quantities.push("SO2".to_string());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("SO2"));
    }

    #[test]
    fn test_validate_rejects_colliding_names() {
        let file = write_config(CONFIG);
        let mut settings = Settings::load(file.path()).unwrap();
        settings
            .source
            .fields
            .insert("PM10".to_string(), "@PM10".to_string());
        assert!(settings.validate().is_err());

        let mut settings = Settings::load(file.path()).unwrap();
        settings
            .source
            .tags
            .insert("NO2 Units".to_string(), "@Units".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_names_colliding_with_species_codes() {
        let file = write_config(CONFIG);
        let mut settings = Settings::load(file.path()).unwrap();
        settings
            .source
            .quantity_codes
            .insert("NO2".to_string(), "NO2_ROADSIDE".to_string());
        settings
            .source
            .fields
            .insert("NO2_ROADSIDE".to_string(), "@Roadside".to_string());
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::load(file.path()).unwrap();
        settings
            .source
            .quantity_codes
            .insert("O3".to_string(), "OZONE".to_string());
        settings
            .source
            .tags
            .insert("OZONE status".to_string(), "@Status".to_string());
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }
}
