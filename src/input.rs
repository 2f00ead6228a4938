//! Common routines for handling input data.
use crate::constraint::ConstraintMap;
use crate::facility::FacilityRegistry;
use crate::model::{Model, ModelParameters};
use crate::series::SeriesStore;
use anyhow::{Context, Result, ensure};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

mod constraint;
use constraint::read_constraints;
mod facility;
use facility::read_facilities;
mod optimisation;
pub use optimisation::read_optimisation_records;
mod series;
use series::read_series;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file, returning nothing if the file doesn't exist.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    if !file_path.exists() {
        return Ok(Vec::new());
    }

    read_csv_internal(file_path)
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T = result.with_context(|| input_err_msg(file_path))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// Check that a value is finite and not negative
pub fn check_non_negative(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite, non-negative number (got {value})"
    );

    Ok(())
}

/// Parse a semicolon-separated list of numbers (e.g. "50;100;100")
pub fn parse_number_list(s: &str) -> Result<Vec<f64>> {
    s.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .with_context(|| format!("Invalid number: {item}"))
        })
        .collect()
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The loaded and validated [`Model`], or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let constraints: ConstraintMap = read_constraints(model_dir)?;
    let mut facilities = read_facilities(model_dir, &constraints)?;
    let series: SeriesStore = read_series(model_dir, &mut facilities)?;
    let facilities = FacilityRegistry::new(facilities)
        .with_context(|| input_err_msg(model_dir.join(facility::FACILITIES_FILE_NAME)))?;
    let optimisation = read_optimisation_records(model_dir, &facilities)?;

    Model::new(parameters, facilities, constraints, series, optimisation)
}
