use crate::transport::TransportError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("Pollutant '{0}' has no configured species code")]
    UnknownQuantity(String),

    #[error("Batch size must be between 1 and {max}, got {size}")]
    InvalidBatchSize { size: usize, max: usize },

    #[error("Batch {batch} failed for {locator}")]
    RangeFetch {
        batch: usize,
        locator: String,
        #[source]
        source: Box<MeasurementError>,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to parse CSV payload")]
    CsvRead(#[source] PolarsError),

    #[error("Failed processing measurement table: {0}")]
    Table(#[from] PolarsError),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Unparsable reading time '{value}' in row {row}")]
    TimestampParse {
        row: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Reading '{key}' in row {row} collides with a station field or tag of the same name")]
    KeyCollision { row: usize, key: String },
}

impl MeasurementError {
    /// Whether this error only concerns a single row of a table.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            MeasurementError::TimestampParse { .. } | MeasurementError::KeyCollision { .. }
        )
    }

    /// Whether this error stems from the settings rather than the data, in
    /// which case every station would fail the same way.
    pub fn is_config_error(&self) -> bool {
        match self {
            MeasurementError::UnknownQuantity(_) | MeasurementError::InvalidBatchSize { .. } => {
                true
            }
            MeasurementError::RangeFetch { source, .. } => source.is_config_error(),
            _ => false,
        }
    }
}
