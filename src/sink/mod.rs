//! Destinations for the points produced by the pipeline.

pub mod influx;
pub mod line_protocol;

use crate::types::point::Point;
use reqwest::StatusCode;
use std::future::Future;
use thiserror::Error;

pub use influx::InfluxSink;
pub use line_protocol::LineProtocolSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write points")]
    Io(#[from] std::io::Error),

    #[error("Network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("Destination rejected write with status {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

/// Persists the points of one station-window.
///
/// A call either stores every point or returns an error; the pipeline never
/// retries a failed write.
pub trait PointSink {
    fn write(&mut self, points: &[Point]) -> impl Future<Output = Result<(), SinkError>>;
}

/// Keeps every flushed batch in memory, including empty ones.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    batches: Vec<Vec<Point>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write call, in call order.
    pub fn batches(&self) -> &[Vec<Point>] {
        &self.batches
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.batches.iter().flatten()
    }
}

impl PointSink for MemorySink {
    async fn write(&mut self, points: &[Point]) -> Result<(), SinkError> {
        self.batches.push(points.to_vec());
        Ok(())
    }
}
