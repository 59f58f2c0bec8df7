use crate::measurements::error::MeasurementError;
use crate::metadata::error::MetadataError;
use crate::sink::SinkError;
use crate::transport::TransportError;
use crate::types::window::{WindowError, WindowKey};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaqnError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("End date {end} precedes start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Aborted while processing {key}")]
    Aborted {
        key: WindowKey,
        #[source]
        source: MeasurementError,
    },
}

impl From<WindowError> for LaqnError {
    fn from(e: WindowError) -> Self {
        match e {
            WindowError::InvalidRange { start, end } => LaqnError::InvalidRange { start, end },
            WindowError::ZeroWidth => {
                ConfigError::Invalid("\"Window Days\" must be at least 1".to_string()).into()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse settings file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
