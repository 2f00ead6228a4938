//! Code for reading the constraint catalogue from a CSV file.
use super::*;
use crate::constraint::{
    Constraint, ConstraintCategory, ConstraintID, ConstraintMap, parse_hour_of_day,
    warm_time_fraction,
};
use crate::id::into_id_map;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;

const CONSTRAINTS_FILE_NAME: &str = "constraints.csv";

/// A row of `constraints.csv`, before defaults and coercions are applied
#[derive(PartialEq, Debug, Deserialize)]
struct ConstraintRaw {
    id: String,
    #[serde(default)]
    category: Option<ConstraintCategory>,
    capacity_min: Option<f64>,
    capacity_max: Option<f64>,
    discharge_max: Option<f64>,
    discharge_loss: Option<f64>,
    recharge_max: Option<f64>,
    recharge_loss: Option<f64>,
    parasitic_loss: Option<f64>,
    discharge_start: Option<String>,
    recharge_start: Option<String>,
    min_run_time: Option<u32>,
    warm_time: Option<f64>,
    rampdown_max: Option<f64>,
    rampup_max: Option<f64>,
}

impl ConstraintRaw {
    /// Apply defaults and coercions, then check the values
    fn into_constraint(self) -> Result<Constraint> {
        let id = ConstraintID::from(self.id);
        let unit = Constraint::unit(id.clone(), self.category.unwrap_or_default());
        let start_hour = |value: Option<String>, name: &str| -> Result<u32> {
            let value = value.unwrap_or_default();
            parse_hour_of_day(&value)
                .with_context(|| format!("Invalid {name} for constraint {id}: {value}"))
        };

        let constraint = Constraint {
            capacity_min: self.capacity_min.unwrap_or(unit.capacity_min),
            capacity_max: self.capacity_max.unwrap_or(unit.capacity_max),
            discharge_max: self.discharge_max.unwrap_or(unit.discharge_max),
            discharge_loss: self.discharge_loss.unwrap_or(unit.discharge_loss),
            recharge_max: self.recharge_max.unwrap_or(unit.recharge_max),
            recharge_loss: self.recharge_loss.unwrap_or(unit.recharge_loss),
            parasitic_loss: self.parasitic_loss.unwrap_or(unit.parasitic_loss),
            discharge_start: start_hour(self.discharge_start, "discharge_start")?,
            recharge_start: start_hour(self.recharge_start, "recharge_start")?,
            min_run_time: self.min_run_time.unwrap_or(unit.min_run_time),
            warm_time: warm_time_fraction(self.warm_time.unwrap_or(unit.warm_time)),
            rampdown_max: self.rampdown_max.unwrap_or(unit.rampdown_max),
            rampup_max: self.rampup_max.unwrap_or(unit.rampup_max),
            ..unit
        };
        validate_constraint(&constraint)
            .with_context(|| format!("Invalid constraint {}", constraint.id))?;

        Ok(constraint)
    }
}

/// Check that fractions are within range and that the floor does not exceed the ceiling
fn validate_constraint(constraint: &Constraint) -> Result<()> {
    for (name, value) in [
        ("capacity_min", constraint.capacity_min),
        ("capacity_max", constraint.capacity_max),
        ("discharge_max", constraint.discharge_max),
        ("recharge_max", constraint.recharge_max),
        ("parasitic_loss", constraint.parasitic_loss),
        ("rampdown_max", constraint.rampdown_max),
        ("rampup_max", constraint.rampup_max),
    ] {
        ensure!(
            (0.0..=1.0).contains(&value),
            "{name} must be between 0 and 1 (got {value})"
        );
    }

    for (name, value) in [
        ("discharge_loss", constraint.discharge_loss),
        ("recharge_loss", constraint.recharge_loss),
    ] {
        ensure!(
            (0.0..1.0).contains(&value),
            "{name} must be at least 0 and less than 1 (got {value})"
        );
    }

    ensure!(
        constraint.capacity_min <= constraint.capacity_max,
        "capacity_min ({}) cannot be greater than capacity_max ({})",
        constraint.capacity_min,
        constraint.capacity_max
    );

    Ok(())
}

/// Read the constraint catalogue from the model directory.
///
/// The file is optional; without it every facility is dispatched with unit constraints.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of [`Constraint`]s keyed by ID, or an error.
pub fn read_constraints(model_dir: &Path) -> Result<ConstraintMap> {
    let file_path = model_dir.join(CONSTRAINTS_FILE_NAME);
    let raw: Vec<ConstraintRaw> = read_csv_optional(&file_path)?;
    read_constraints_from_iter(raw).with_context(|| input_err_msg(&file_path))
}

fn read_constraints_from_iter<I>(iter: I) -> Result<ConstraintMap>
where
    I: IntoIterator<Item = ConstraintRaw>,
{
    let constraints: Vec<_> = iter
        .into_iter()
        .map(ConstraintRaw::into_constraint)
        .try_collect()?;
    into_id_map(constraints)
}
