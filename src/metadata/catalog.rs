//! Downloads the LAQN site list and projects each site onto a [`Station`].

use crate::metadata::error::MetadataError;
use crate::transport::HttpSource;
use crate::types::settings::SourceConfig;
use crate::types::station::{tag_from_json, FieldValue, Station};
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Key path of the site list inside the metadata response.
const SITES_PATH: [&str; 2] = ["Sites", "Site"];

/// The stations known to the run, in the order the metadata API lists them.
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    stations: Vec<Station>,
    by_name: HashMap<String, usize>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from already projected stations.
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let mut catalog = Self::new();
        catalog.replace(stations);
        catalog
    }

    /// Downloads the site list and replaces the catalog's content with it.
    ///
    /// On error the previous content is kept.
    pub async fn fetch<T: HttpSource>(
        &mut self,
        source: &T,
        config: &SourceConfig,
    ) -> Result<(), MetadataError> {
        let url = metadata_url(config);
        info!("Downloading station metadata from {}", url);
        let body = source.get(&url).await?;
        let stations = parse_stations(&url, &body, config)?;
        info!("Loaded metadata for {} stations", stations.len());
        self.replace(stations);
        Ok(())
    }

    /// Looks up a station by its display name.
    pub fn station(&self, name: &str) -> Result<&Station, MetadataError> {
        self.by_name
            .get(name)
            .map(|&i| &self.stations[i])
            .ok_or_else(|| MetadataError::UnknownStation(name.to_string()))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    fn replace(&mut self, stations: Vec<Station>) {
        self.stations.clear();
        self.by_name.clear();
        for station in stations {
            match self.by_name.get(&station.name) {
                Some(&i) => {
                    warn!(
                        "Station name '{}' listed twice, keeping site {}",
                        station.name, station.id
                    );
                    self.stations[i] = station;
                }
                None => {
                    self.by_name.insert(station.name.clone(), self.stations.len());
                    self.stations.push(station);
                }
            }
        }
    }
}

pub(crate) fn metadata_url(config: &SourceConfig) -> String {
    format!(
        "{}/{}",
        config.api_address.trim_end_matches('/'),
        config.metadata_path.trim_start_matches('/')
    )
}

/// Parses a metadata response body into projected stations.
pub(crate) fn parse_stations(
    url: &str,
    body: &[u8],
    config: &SourceConfig,
) -> Result<Vec<Station>, MetadataError> {
    let root: Value = serde_json::from_slice(body).map_err(|e| MetadataError::JsonParse {
        url: url.to_string(),
        source: e,
    })?;

    let mut node = &root;
    for (depth, key) in SITES_PATH.iter().enumerate() {
        node = node.get(key).ok_or_else(|| MetadataError::UnexpectedShape {
            url: url.to_string(),
            path: SITES_PATH[..=depth].join("."),
        })?;
    }

    // A network with a single site is encoded as an object instead of a list.
    let records: Vec<&Value> = match node {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![node],
        _ => {
            return Err(MetadataError::UnexpectedShape {
                url: url.to_string(),
                path: SITES_PATH.join("."),
            })
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let record = record
                .as_object()
                .ok_or(MetadataError::MalformedStation { index })?;
            project_station(record, config)
        })
        .collect()
}

fn project_station(
    record: &Map<String, Value>,
    config: &SourceConfig,
) -> Result<Station, MetadataError> {
    let name = match record.get(&config.site_name_field) {
        Some(value) => tag_from_json(value),
        None => {
            return Err(MetadataError::FieldMissing {
                station: record
                    .get(&config.site_code_field)
                    .map(tag_from_json)
                    .unwrap_or_else(|| "<unnamed>".to_string()),
                field: config.site_name_field.clone(),
            })
        }
    };
    let lookup = |field: &str| {
        record.get(field).ok_or_else(|| MetadataError::FieldMissing {
            station: name.clone(),
            field: field.to_string(),
        })
    };

    let id = tag_from_json(lookup(&config.site_code_field)?);

    let mut tags = BTreeMap::new();
    for (output, source_field) in &config.tags {
        tags.insert(output.clone(), tag_from_json(lookup(source_field)?));
    }

    let mut fields = BTreeMap::new();
    for (output, source_field) in &config.fields {
        fields.insert(output.clone(), FieldValue::from_json(lookup(source_field)?));
    }

    Ok(Station {
        id,
        name,
        tags,
        fields,
    })
}
