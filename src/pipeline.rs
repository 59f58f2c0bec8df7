//! Drives the acquisition loop: windows × stations → fetch → transform → flush.

use crate::error::LaqnError;
use crate::measurements::error::MeasurementError;
use crate::measurements::fetcher::RangeFetcher;
use crate::measurements::transformer::PointTransformer;
use crate::metadata::catalog::MetadataCatalog;
use crate::sink::PointSink;
use crate::transport::HttpSource;
use crate::types::point::Point;
use crate::types::settings::{FailurePolicy, Settings};
use crate::types::station::Station;
use crate::types::window::{DateWindow, TimeWindower, WindowKey};
use bon::bon;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use std::collections::HashMap;

/// Where a [`PipelineDriver`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    MetadataLoaded,
    Windowing { window: usize },
    Done,
}

/// Transient state of one station-window.
#[derive(Debug, Default)]
pub struct WindowEntry {
    pub table: Option<DataFrame>,
    pub points: Vec<Point>,
}

/// Explicit owner of the per-station-window tables and point lists.
///
/// Entries are created when a fetch completes and removed by
/// [`WindowStore::release`] once the points are flushed, so the store holds at
/// most the station-windows currently in flight.
#[derive(Debug, Default)]
pub struct WindowStore {
    entries: HashMap<WindowKey, WindowEntry>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, key: WindowKey, table: DataFrame) {
        self.entries.entry(key).or_default().table = Some(table);
    }

    pub fn insert_points(&mut self, key: WindowKey, points: Vec<Point>) {
        self.entries.entry(key).or_default().points = points;
    }

    pub fn table(&self, key: &WindowKey) -> Option<&DataFrame> {
        self.entries.get(key).and_then(|e| e.table.as_ref())
    }

    pub fn points(&self, key: &WindowKey) -> &[Point] {
        self.entries
            .get(key)
            .map(|e| e.points.as_slice())
            .unwrap_or_default()
    }

    /// Drops the table and points of `key`. Returns whether anything was held.
    pub fn release(&mut self, key: &WindowKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A station-window that produced no points because of an error.
#[derive(Debug, Clone, PartialEq)]
pub struct StationFailure {
    pub key: WindowKey,
    pub reason: String,
}

/// Outcome of [`PipelineDriver::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub windows: usize,
    /// Station-windows whose points were flushed.
    pub processed: usize,
    /// Station-windows skipped because of a fetch or table error.
    pub skipped: usize,
    pub rows_skipped: usize,
    pub points_written: usize,
    pub failures: Vec<StationFailure>,
}

/// Runs the harvesting loop against an [`HttpSource`] and a [`PointSink`].
///
/// # Examples
///
/// ```no_run
/// # use laqn::{PipelineDriver, ReqwestSource, MemorySink, Settings};
/// # use chrono::NaiveDate;
/// # use std::path::Path;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = Settings::load(Path::new("Settings/config.json"))?;
/// let mut driver = PipelineDriver::builder()
///     .settings(settings)
///     .source(ReqwestSource::new()?)
///     .sink(MemorySink::new())
///     .build();
///
/// let summary = driver
///     .run()
///     .start(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap())
///     .end(NaiveDate::from_ymd_opt(2021, 2, 1).unwrap())
///     .call()
///     .await?;
/// println!("{} points written", summary.points_written);
/// # Ok(())
/// # }
/// ```
pub struct PipelineDriver<T, S> {
    settings: Settings,
    catalog: MetadataCatalog,
    fetcher: RangeFetcher<T>,
    transformer: PointTransformer,
    sink: S,
    store: WindowStore,
    state: DriverState,
}

#[bon]
impl<T: HttpSource, S: PointSink> PipelineDriver<T, S> {
    #[builder]
    pub fn new(settings: Settings, source: T, sink: S) -> Self {
        let transformer = PointTransformer::new(&settings.measurement);
        Self {
            settings,
            catalog: MetadataCatalog::new(),
            fetcher: RangeFetcher::new(source),
            transformer,
            sink,
            store: WindowStore::new(),
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Downloads the station list. Moves the driver to `MetadataLoaded`.
    pub async fn load_metadata(&mut self) -> Result<(), LaqnError> {
        self.catalog
            .fetch(self.fetcher.source(), &self.settings.source)
            .await?;
        self.state = DriverState::MetadataLoaded;
        Ok(())
    }

    /// Harvests every station over `[start, end)`, one window at a time.
    ///
    /// Loads the metadata first if that has not happened yet. Per-station
    /// failures are handled according to the configured [`FailurePolicy`] and
    /// reported in the returned [`RunSummary`]; configuration, metadata and
    /// sink errors end the run. The settings are validated before any request.
    #[builder]
    pub async fn run(&mut self, start: NaiveDate, end: NaiveDate) -> Result<RunSummary, LaqnError> {
        self.settings.validate()?;
        let windower = TimeWindower::new(start, end, self.settings.pipeline.window_days)?;

        if self.state == DriverState::Idle {
            self.load_metadata().await?;
        }

        let mut summary = RunSummary {
            windows: windower.window_count(),
            ..RunSummary::default()
        };
        info!(
            "Harvesting {} stations from {} to {} in {} windows",
            self.catalog.len(),
            start,
            end,
            summary.windows
        );

        for (index, window) in windower.windows().enumerate() {
            self.state = DriverState::Windowing { window: index };
            self.run_window(window, &mut summary).await?;
            info!("Finished window {}", window);
        }

        self.state = DriverState::Done;
        info!(
            "Run finished: {} station-windows processed, {} skipped, {} rows skipped, {} points written",
            summary.processed, summary.skipped, summary.rows_skipped, summary.points_written
        );
        Ok(summary)
    }

    async fn run_window(
        &mut self,
        window: DateWindow,
        summary: &mut RunSummary,
    ) -> Result<(), LaqnError> {
        let Self {
            settings,
            catalog,
            fetcher,
            transformer,
            sink,
            store,
            ..
        } = self;
        let settings = &*settings;
        let fetcher = &*fetcher;
        let policy = settings.pipeline.failure_policy;

        // Fetches may overlap, but results are consumed in catalog order.
        let mut fetches = stream::iter(catalog.stations())
            .map(|station| async move {
                debug!("Downloading {} for {}", station.id, window);
                let fetched = fetcher
                    .fetch(station, window.start, window.end, settings)
                    .await;
                (station, fetched)
            })
            .buffered(settings.pipeline.station_concurrency.max(1));

        while let Some((station, fetched)) = fetches.next().await {
            let key = WindowKey::new(&station.id, window.start);
            let table = match fetched {
                Ok(table) => table,
                Err(e) => {
                    record_failure(summary, policy, key, e)?;
                    continue;
                }
            };
            store.insert_table(key.clone(), table);

            let converted = match store.table(&key) {
                Some(table) => convert(transformer, policy, table, station),
                None => Ok((Vec::new(), 0)),
            };
            let points = match converted {
                Ok((points, rows_skipped)) => {
                    summary.rows_skipped += rows_skipped;
                    points
                }
                Err(e) => {
                    store.release(&key);
                    record_failure(summary, policy, key, e)?;
                    continue;
                }
            };
            store.insert_points(key.clone(), points);

            let flushed = sink.write(store.points(&key)).await;
            let written = store.points(&key).len();
            store.release(&key);
            flushed?;

            debug!("Flushed {} points for {}", written, key);
            summary.points_written += written;
            summary.processed += 1;
        }
        Ok(())
    }
}

/// Converts a table according to `policy`, returning the points and the
/// number of rows set aside.
fn convert(
    transformer: &PointTransformer,
    policy: FailurePolicy,
    table: &DataFrame,
    station: &Station,
) -> Result<(Vec<Point>, usize), MeasurementError> {
    match policy {
        FailurePolicy::SkipRow => {
            let transformed = transformer.to_points_skipping(table, station)?;
            Ok((transformed.points, transformed.rejected.len()))
        }
        FailurePolicy::SkipStation | FailurePolicy::AbortRun => {
            Ok((transformer.to_points(table, station)?, 0))
        }
    }
}

fn record_failure(
    summary: &mut RunSummary,
    policy: FailurePolicy,
    key: WindowKey,
    error: MeasurementError,
) -> Result<(), LaqnError> {
    if error.is_config_error() {
        return Err(error.into());
    }
    if policy == FailurePolicy::AbortRun {
        return Err(LaqnError::Aborted { key, source: error });
    }
    warn!("Skipping {}: {}", key, error);
    summary.skipped += 1;
    summary.failures.push(StationFailure {
        key,
        reason: error.to_string(),
    });
    Ok(())
}
