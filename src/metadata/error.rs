use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to download station metadata")]
    Transport(#[from] TransportError),

    #[error("Failed to parse station metadata from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected metadata shape from {url}: missing '{path}'")]
    UnexpectedShape { url: String, path: String },

    #[error("Station record {index} is not an object")]
    MalformedStation { index: usize },

    #[error("Station '{station}' has no field '{field}'")]
    FieldMissing { station: String, field: String },

    #[error("Unknown station '{0}'")]
    UnknownStation(String),
}
