use crate::measurements::batcher::{batches, build_locator};
use crate::measurements::error::MeasurementError;
use crate::transport::HttpSource;
use crate::types::settings::Settings;
use crate::types::station::Station;
use chrono::NaiveDate;
use log::debug;
use polars::functions::concat_df_diagonal;
use polars::prelude::*;
use std::io::Cursor;

/// Downloads the measurements of one station over one date range.
pub struct RangeFetcher<T> {
    source: T,
}

impl<T: HttpSource> RangeFetcher<T> {
    pub fn new(source: T) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    /// Requests every batch of pollutants for `station` between `start` and
    /// `end` and concatenates the responses into one table.
    ///
    /// Rows keep batch order, then the order of each response. The first
    /// failing batch abandons the whole fetch with [`MeasurementError::RangeFetch`].
    pub async fn fetch(
        &self,
        station: &Station,
        start: NaiveDate,
        end: NaiveDate,
        settings: &Settings,
    ) -> Result<DataFrame, MeasurementError> {
        let quantity_codes = &settings.source.quantity_codes;
        let batches = batches(
            &settings.quantities,
            quantity_codes,
            settings.pipeline.batch_size,
        )?;

        let mut tables = Vec::with_capacity(batches.len());
        for (index, batch) in batches.iter().enumerate() {
            let locator = build_locator(
                &settings.source.csv_address,
                &station.id,
                batch,
                start,
                end,
                &settings.period,
                quantity_codes,
            )?;
            let wrap = |source: MeasurementError| MeasurementError::RangeFetch {
                batch: index,
                locator: locator.clone(),
                source: Box::new(source),
            };

            let body = self
                .source
                .get(&locator)
                .await
                .map_err(|e| wrap(e.into()))?;
            let table = parse_csv_table(body).map_err(wrap)?;
            debug!(
                "Batch {} for {} returned {} rows",
                index,
                station.id,
                table.height()
            );
            tables.push(table);
        }

        concat_tables(tables)
    }
}

/// Parses an export payload, reading every column as text.
///
/// An empty payload gives an empty table.
pub fn parse_csv_table(body: Vec<u8>) -> Result<DataFrame, MeasurementError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DataFrame::empty());
    }
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(body))
        .finish()
        .map_err(MeasurementError::CsvRead)
}

/// Stacks tables vertically over the union of their columns.
fn concat_tables(tables: Vec<DataFrame>) -> Result<DataFrame, MeasurementError> {
    let mut tables: Vec<DataFrame> = tables.into_iter().filter(|t| t.width() > 0).collect();
    if tables.len() <= 1 {
        return Ok(tables.pop().unwrap_or_else(DataFrame::empty));
    }
    Ok(concat_df_diagonal(&tables)?)
}
