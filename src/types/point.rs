use crate::types::station::FieldValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One normalized, tagged, timestamped measurement ready for a time-series store.
///
/// `fields` always holds the station's static fields plus exactly one quantity
/// field; `tags` holds the station's static tags plus the `"<code> status"` and
/// `"<code> Units"` tags of that quantity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Point {
    /// Start of the reading, as reported by the export (treated as UTC).
    pub timestamp: NaiveDateTime,
    pub measurement: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub tags: BTreeMap<String, String>,
}

impl Point {
    /// Tag key holding the ratification status of `quantity`.
    pub fn status_tag(quantity: &str) -> String {
        format!("{} status", quantity)
    }

    /// Tag key holding the units of `quantity`.
    pub fn units_tag(quantity: &str) -> String {
        format!("{} Units", quantity)
    }
}
