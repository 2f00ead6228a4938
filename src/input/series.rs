//! Code for reading hourly load and renewable traces from a CSV file.
use super::*;
use crate::facility::{Facility, FacilityCategory, FacilityID};
use crate::series::{HOURS_PER_YEAR, HourlySeries, SeriesStore};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::warn;
use std::path::Path;

const SERIES_FILE_NAME: &str = "hourly.csv";

/// Read hourly series for the load and every renewable.
///
/// The file has one column per facility, headed with the facility name, and one row per hour.
/// The column index of each series is recorded on its facility. Columns for facilities which are
/// not load or renewables are ignored with a warning.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `facilities` - The fleet, whose series columns are filled in
pub fn read_series(
    model_dir: &Path,
    facilities: &mut IndexMap<FacilityID, Facility>,
) -> Result<SeriesStore> {
    let file_path = model_dir.join(SERIES_FILE_NAME);
    read_series_from_path(&file_path, facilities).with_context(|| input_err_msg(&file_path))
}

fn read_series_from_path(
    file_path: &Path,
    facilities: &mut IndexMap<FacilityID, Facility>,
) -> Result<SeriesStore> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    // Which header columns are wanted, and for which facility
    let mut wanted = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        match facilities.get(name.as_str()).map(|facility| facility.category) {
            Some(FacilityCategory::Load | FacilityCategory::Renewable) => wanted.push(idx),
            Some(_) => warn!("Ignoring hourly series for dispatchable facility {name}"),
            None => warn!("Ignoring hourly series {name} as there is no such facility"),
        }
    }

    let mut columns: Vec<HourlySeries> = vec![Vec::with_capacity(HOURS_PER_YEAR); wanted.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (column, &idx) in columns.iter_mut().zip(&wanted) {
            let value = record.get(idx).unwrap_or_default();
            ensure!(
                !value.is_empty(),
                "Missing value for {} in row {}",
                headers[idx],
                row + 1
            );
            let value: f64 = value.parse().with_context(|| {
                format!("Invalid value for {} in row {}: {value}", headers[idx], row + 1)
            })?;
            column.push(value);
        }
    }

    let mut store = SeriesStore::default();
    for (values, &idx) in columns.into_iter().zip(&wanted) {
        let facility = facilities
            .get_mut(headers[idx].as_str())
            .with_context(|| format!("Unknown facility {}", headers[idx]))?;
        let column = store.push(facility.id.clone(), values)?;
        facility.series_column = Some(column);
    }

    let load = facilities
        .values()
        .find(|facility| facility.category == FacilityCategory::Load);
    if let Some(load) = load {
        ensure!(
            load.series_column.is_some(),
            "No hourly series found for load {}",
            load.id
        );
    }

    Ok(store)
}
