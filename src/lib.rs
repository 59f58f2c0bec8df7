mod error;
pub mod measurements;
pub mod metadata;
mod pipeline;
pub mod sink;
mod transport;
mod types;
mod utils;

pub use error::{ConfigError, LaqnError};
pub use pipeline::*;
pub use transport::{HttpSource, ReqwestSource, TransportError};

pub use sink::{InfluxSink, LineProtocolSink, MemorySink, PointSink, SinkError};

pub use types::point::Point;
pub use types::settings::*;
pub use types::station::{FieldValue, Station};
pub use types::window::{
    day_difference, window_count, DateWindow, TimeWindower, WindowError, WindowKey, WINDOW_DAYS,
};

pub use measurements::batcher::{batches, build_locator, Batch, Slot};
pub use measurements::error::MeasurementError;
pub use measurements::fetcher::{parse_csv_table, RangeFetcher};
pub use measurements::transformer::{PointTransformer, RawRow, Transformed};
pub use metadata::catalog::MetadataCatalog;
pub use metadata::error::MetadataError;

pub use utils::{parse_date_arg, DateArgError};
