//! Splits the requested pollutants into fixed-size batches and renders the
//! export locator for each batch.
//!
//! The export endpoint accepts a handful of `speciesN` parameters per request
//! and expects every one of them to be present, so a short batch is padded
//! with [`Slot::Empty`] rather than truncated.

use crate::measurements::error::MeasurementError;
use crate::types::settings::MAX_SPECIES_PER_REQUEST;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

/// Date format of the `start` and `end` export parameters ("01-Jan-2021").
pub const LOCATOR_DATE_FORMAT: &str = "%d-%b-%Y";

/// Value of the export's `res` parameter, selecting raw readings.
pub const RESOLUTION: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Quantity(String),
    Empty,
}

impl Slot {
    pub fn quantity(&self) -> Option<&str> {
        match self {
            Slot::Quantity(code) => Some(code),
            Slot::Empty => None,
        }
    }
}

/// Exactly `batch_size` slots; trailing unused slots are [`Slot::Empty`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Batch {
    slots: Vec<Slot>,
}

impl Batch {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The quantity codes of the batch, without padding.
    pub fn quantities(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(Slot::quantity)
    }
}

/// Partitions `requested` (or every configured quantity, if `requested` is
/// empty) into `ceil(count / batch_size)` batches of exactly `batch_size` slots.
///
/// Duplicate codes are requested once, at their first position.
pub fn batches(
    requested: &[String],
    quantity_codes: &BTreeMap<String, String>,
    batch_size: usize,
) -> Result<Vec<Batch>, MeasurementError> {
    if batch_size == 0 || batch_size > MAX_SPECIES_PER_REQUEST {
        return Err(MeasurementError::InvalidBatchSize {
            size: batch_size,
            max: MAX_SPECIES_PER_REQUEST,
        });
    }

    let all: Vec<String>;
    let requested = if requested.is_empty() {
        all = quantity_codes.keys().cloned().collect();
        &all
    } else {
        requested
    };

    let mut seen = HashSet::new();
    let mut quantities = Vec::with_capacity(requested.len());
    for code in requested {
        if !quantity_codes.contains_key(code) {
            return Err(MeasurementError::UnknownQuantity(code.clone()));
        }
        if seen.insert(code.as_str()) {
            quantities.push(code.clone());
        }
    }

    Ok(quantities
        .chunks(batch_size)
        .map(|chunk| {
            let mut slots: Vec<Slot> = chunk.iter().cloned().map(Slot::Quantity).collect();
            slots.resize(batch_size, Slot::Empty);
            Batch { slots }
        })
        .collect())
}

/// Renders the export locator for one batch.
///
/// The output depends only on the arguments, so equal inputs always give
/// byte-identical locators.
pub fn build_locator(
    csv_address: &str,
    site_code: &str,
    batch: &Batch,
    start: NaiveDate,
    end: NaiveDate,
    period: &str,
    quantity_codes: &BTreeMap<String, String>,
) -> Result<String, MeasurementError> {
    let mut locator = format!("{}site={}", csv_address, site_code);
    for (i, slot) in batch.slots().iter().enumerate() {
        let species = match slot {
            Slot::Quantity(code) => quantity_codes
                .get(code)
                .ok_or_else(|| MeasurementError::UnknownQuantity(code.clone()))?
                .as_str(),
            Slot::Empty => "",
        };
        locator.push_str(&format!("&species{}={}", i + 1, species));
    }
    locator.push_str(&format!(
        "&start={}&end={}&res={}&period={}",
        start.format(LOCATOR_DATE_FORMAT),
        end.format(LOCATOR_DATE_FORMAT),
        RESOLUTION,
        period
    ));
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_ADDRESS: &str = "https://www.londonair.org.uk/london/asp/downloadsite.asp?";

    fn codes(names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), format!("{}x", n)))
            .collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_batch_count_and_padding() -> Result<(), MeasurementError> {
        let names: Vec<String> = (0..13).map(|i| format!("Q{:02}", i)).collect();
        let map: BTreeMap<String, String> =
            names.iter().map(|n| (n.clone(), n.clone())).collect();

        for len in 1..=names.len() {
            for size in 1..=MAX_SPECIES_PER_REQUEST {
                let requested = &names[..len];
                let result = batches(requested, &map, size)?;

                assert_eq!(result.len(), len.div_ceil(size), "len {} size {}", len, size);
                assert!(result.iter().all(|b| b.len() == size));

                let flattened: Vec<&str> = result.iter().flat_map(|b| b.quantities()).collect();
                let expected: Vec<&str> = requested.iter().map(String::as_str).collect();
                assert_eq!(flattened, expected);

                let padding = result.len() * size - len;
                let last = result.last().unwrap();
                assert!(last.slots()[size - padding..].iter().all(|s| *s == Slot::Empty));
            }
        }
        Ok(())
    }

    #[test]
    fn test_empty_request_uses_all_quantities() -> Result<(), MeasurementError> {
        let map = codes(&["CO", "NO2", "O3", "PM10", "PM25", "SO2", "NOX"]);
        let result = batches(&[], &map, 5)?;

        assert_eq!(result.len(), 2);
        let requested: Vec<&str> = result.iter().flat_map(|b| b.quantities()).collect();
        assert_eq!(requested, vec!["CO", "NO2", "NOX", "O3", "PM10", "PM25", "SO2"]);
        assert_eq!(result[1].slots()[2..], [Slot::Empty, Slot::Empty, Slot::Empty]);
        Ok(())
    }

    #[test]
    fn test_unknown_quantity() {
        let map = codes(&["NO2"]);
        let err = batches(&strings(&["NO2", "XYZ"]), &map, 5).unwrap_err();
        assert!(matches!(err, MeasurementError::UnknownQuantity(code) if code == "XYZ"));
    }

    #[test]
    fn test_invalid_batch_size() {
        let map = codes(&["NO2"]);
        assert!(matches!(
            batches(&strings(&["NO2"]), &map, 0),
            Err(MeasurementError::InvalidBatchSize { .. })
        ));
        assert!(matches!(
            batches(&strings(&["NO2"]), &map, 7),
            Err(MeasurementError::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn test_duplicates_requested_once() -> Result<(), MeasurementError> {
        let map = codes(&["NO2", "O3"]);
        let result = batches(&strings(&["NO2", "O3", "NO2"]), &map, 5)?;
        let requested: Vec<&str> = result[0].quantities().collect();
        assert_eq!(requested, vec!["NO2", "O3"]);
        Ok(())
    }

    #[test]
    fn test_build_locator() -> Result<(), MeasurementError> {
        let map = codes(&["NO2", "PM10"]);
        let batch = &batches(&strings(&["NO2", "PM10"]), &map, 5)?[0];
        let locator = build_locator(
            CSV_ADDRESS,
            "BL0",
            batch,
            date(2021, 1, 1),
            date(2021, 1, 8),
            "hour",
            &map,
        )?;
        assert_eq!(
            locator,
            "https://www.londonair.org.uk/london/asp/downloadsite.asp?site=BL0\
             &species1=NO2x&species2=PM10x&species3=&species4=&species5=\
             &start=01-Jan-2021&end=08-Jan-2021&res=6&period=hour"
        );
        Ok(())
    }

    #[test]
    fn test_build_locator_is_stable() -> Result<(), MeasurementError> {
        let map = codes(&["NO2", "PM10", "O3"]);
        let batch = &batches(&[], &map, 5)?[0];
        let render = |start: NaiveDate, end: NaiveDate| {
            build_locator(CSV_ADDRESS, "CD9", batch, start, end, "15min", &map)
        };

        let first = render(date(2021, 2, 1), date(2021, 2, 8))?;
        assert_eq!(first, render(date(2021, 2, 1), date(2021, 2, 8))?);

        // Only the date parameters change with the range.
        let other = render(date(2021, 3, 1), date(2021, 3, 8))?;
        let strip = |s: &str| s.split("&start=").next().unwrap().to_string();
        assert_ne!(first, other);
        assert_eq!(strip(&first), strip(&other));
        assert_eq!(first.split("&res=").nth(1), other.split("&res=").nth(1));
        Ok(())
    }
}
