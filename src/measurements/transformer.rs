//! Converts rows of an export table into time-series [`Point`]s.

use crate::measurements::error::MeasurementError;
use crate::types::point::Point;
use crate::types::station::{FieldValue, Station};
use chrono::NaiveDateTime;
use log::{debug, warn};
use polars::prelude::*;

pub const SITE_COLUMN: &str = "Site";
pub const SPECIES_COLUMN: &str = "Species";
pub const READING_TIME_COLUMN: &str = "ReadingDateTime";
pub const VALUE_COLUMN: &str = "Value";
pub const UNITS_COLUMN: &str = "Units";
pub const STATUS_COLUMN: &str = "Provisional or Ratified";

/// Format of the `ReadingDateTime` column ("31/12/2020 23:00").
pub const READING_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// One measurement record of an export table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow<'a> {
    pub site: Option<&'a str>,
    pub species: &'a str,
    pub reading_time: &'a str,
    pub value: Option<f64>,
    pub units: &'a str,
    pub status: &'a str,
}

/// Points built from a table, plus the rows that could not be converted.
#[derive(Debug, Default)]
pub struct Transformed {
    pub points: Vec<Point>,
    pub rejected: Vec<MeasurementError>,
}

#[derive(Debug, Clone)]
pub struct PointTransformer {
    measurement: String,
}

struct TextColumns<'a> {
    site: Option<&'a StringChunked>,
    species: &'a StringChunked,
    reading_time: &'a StringChunked,
    value: &'a StringChunked,
    units: &'a StringChunked,
    status: &'a StringChunked,
}

impl<'a> TextColumns<'a> {
    fn new(table: &'a DataFrame) -> Result<Self, MeasurementError> {
        let required = |name: &str| -> Result<&'a StringChunked, MeasurementError> {
            let column = table
                .column(name)
                .map_err(|_| MeasurementError::MissingColumn(name.to_string()))?;
            Ok(column.str()?)
        };
        Ok(Self {
            site: table.column(SITE_COLUMN).ok().and_then(|c| c.str().ok()),
            species: required(SPECIES_COLUMN)?,
            reading_time: required(READING_TIME_COLUMN)?,
            value: required(VALUE_COLUMN)?,
            units: required(UNITS_COLUMN)?,
            status: required(STATUS_COLUMN)?,
        })
    }

    fn row(&self, idx: usize) -> RawRow<'a> {
        RawRow {
            site: self.site.and_then(|c| c.get(idx)),
            species: self.species.get(idx).unwrap_or_default(),
            reading_time: self.reading_time.get(idx).unwrap_or_default(),
            value: parse_value(self.value.get(idx)),
            units: self.units.get(idx).unwrap_or_default(),
            status: self.status.get(idx).unwrap_or_default(),
        }
    }
}

/// Absent, empty, non-numeric and NaN cells are all missing readings.
fn parse_value(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

impl PointTransformer {
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
        }
    }

    /// Converts every row with a value into a point, in row order.
    ///
    /// Rows without a value are skipped. The first unparsable reading time
    /// fails the whole table with [`MeasurementError::TimestampParse`].
    pub fn to_points(
        &self,
        table: &DataFrame,
        station: &Station,
    ) -> Result<Vec<Point>, MeasurementError> {
        let mut points = Vec::with_capacity(table.height());
        self.for_each_row(table, station, |result| {
            if let Some(point) = result? {
                points.push(point);
            }
            Ok(())
        })?;
        Ok(points)
    }

    /// Like [`PointTransformer::to_points`], but rows with an unparsable
    /// reading time are set aside instead of failing the table.
    pub fn to_points_skipping(
        &self,
        table: &DataFrame,
        station: &Station,
    ) -> Result<Transformed, MeasurementError> {
        let mut transformed = Transformed {
            points: Vec::with_capacity(table.height()),
            rejected: Vec::new(),
        };
        self.for_each_row(table, station, |result| {
            match result {
                Ok(Some(point)) => transformed.points.push(point),
                Ok(None) => {}
                Err(e) if e.is_row_error() => {
                    warn!("Skipping row for {}: {}", station.id, e);
                    transformed.rejected.push(e);
                }
                Err(e) => return Err(e),
            }
            Ok(())
        })?;
        Ok(transformed)
    }

    fn for_each_row<F>(
        &self,
        table: &DataFrame,
        station: &Station,
        mut visit: F,
    ) -> Result<(), MeasurementError>
    where
        F: FnMut(Result<Option<Point>, MeasurementError>) -> Result<(), MeasurementError>,
    {
        if table.height() == 0 {
            return Ok(());
        }
        let columns = TextColumns::new(table)?;
        for idx in 0..table.height() {
            visit(self.row_to_point(idx, &columns.row(idx), station))?;
        }
        Ok(())
    }

    /// Builds the point of one row, or `None` if the row has no reading.
    pub fn row_to_point(
        &self,
        idx: usize,
        row: &RawRow<'_>,
        station: &Station,
    ) -> Result<Option<Point>, MeasurementError> {
        let Some(value) = row.value else {
            return Ok(None);
        };
        if row.species.is_empty() {
            debug!("Row {} for {} has a value but no species", idx, station.id);
            return Ok(None);
        }
        let timestamp = NaiveDateTime::parse_from_str(row.reading_time.trim(), READING_TIME_FORMAT)
            .map_err(|e| MeasurementError::TimestampParse {
                row: idx,
                value: row.reading_time.to_string(),
                source: e,
            })?;

        // A point carries exactly one reading; it may not hide behind a static key.
        let status_tag = Point::status_tag(row.species);
        let units_tag = Point::units_tag(row.species);
        let collision = if station.fields.contains_key(row.species) {
            Some(row.species.to_string())
        } else {
            [&status_tag, &units_tag]
                .into_iter()
                .find(|tag| station.tags.contains_key(tag.as_str()))
                .cloned()
        };
        if let Some(key) = collision {
            return Err(MeasurementError::KeyCollision { row: idx, key });
        }

        let mut fields = station.fields.clone();
        fields.insert(row.species.to_string(), FieldValue::Float(value));

        let mut tags = station.tags.clone();
        tags.insert(status_tag, row.status.to_string());
        tags.insert(units_tag, row.units.to_string());

        Ok(Some(Point {
            timestamp,
            measurement: self.measurement.clone(),
            fields,
            tags,
        }))
    }
}
