//! Defines the data structures representing LAQN monitoring stations and the
//! static tags and fields attached to every point measured at them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// --- Data Structures ---

/// Represents a single LAQN monitoring station and its projected metadata.
///
/// Stations are built once by [`crate::MetadataCatalog`] from the metadata API and
/// are never modified afterwards. The `tags` and `fields` maps hold the output
/// names configured in the `"Tags"` and `"Fields"` sections of the settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// The LAQN site code (e.g. "BL0"), used in tabular export requests.
    pub id: String,
    /// The display name of the site (e.g. "Camden - Bloomsbury"), used as the lookup key.
    pub name: String,
    /// Static descriptive attributes, copied onto every point of this station.
    pub tags: BTreeMap<String, String>,
    /// Static numeric or text attributes, copied onto every point of this station.
    pub fields: BTreeMap<String, FieldValue>,
}

/// A single field value of a time-series point.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl FieldValue {
    /// Converts a metadata attribute into a field value.
    ///
    /// LAQN reports almost every attribute as a string, so strings holding a
    /// number (latitude, longitude, ...) become [`FieldValue::Float`].
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => FieldValue::Float(f),
                _ => FieldValue::Text(s.clone()),
            },
            Value::Null => FieldValue::Text(String::new()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Converts a metadata attribute into a tag value.
///
/// Strings are kept verbatim, `null` becomes an empty string and anything else
/// uses its JSON text.
pub(crate) fn tag_from_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
