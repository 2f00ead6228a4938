//! Code for reading the fleet from a CSV file.
use super::*;
use crate::constraint::{ConstraintID, ConstraintMap};
use crate::facility::{Facility, FacilityCategory, FacilityCosts, FacilityID};
use crate::id::into_id_map;
use crate::units::{
    AreaPerCapacity, Capacity, Dimensionless, EmissionsPerEnergy, Energy, MoneyPerCapacity,
    MoneyPerCapacityPerYear, MoneyPerEnergy,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use serde::Deserialize;
use std::path::Path;

pub(super) const FACILITIES_FILE_NAME: &str = "facilities.csv";

/// A row of `facilities.csv`
#[derive(PartialEq, Debug, Deserialize, Default)]
struct FacilityRaw {
    name: String,
    category: Option<FacilityCategory>,
    capacity: Option<f64>,
    multiplier: Option<f64>,
    constraint: Option<String>,
    underlying: Option<bool>,
    capex: Option<f64>,
    fixed_om: Option<f64>,
    variable_om: Option<f64>,
    fuel: Option<f64>,
    lcoe: Option<f64>,
    lcoe_cf: Option<f64>,
    emissions: Option<f64>,
    discount_rate: Option<f64>,
    lifetime: Option<u32>,
    area: Option<f64>,
    initial: Option<f64>,
}

impl FacilityRaw {
    /// Check the values and convert into a [`Facility`]
    fn into_facility(self, constraints: &ConstraintMap) -> Result<Facility> {
        ensure!(!self.name.is_empty(), "Facility name cannot be empty");
        let category = self
            .category
            .with_context(|| format!("No category given for facility {}", self.name))?;
        self.validate(category)
            .with_context(|| format!("Invalid facility {}", self.name))?;

        let constraint_id = self.constraint.map(ConstraintID::from);
        if let Some(id) = &constraint_id {
            if !constraints.contains_key(id) {
                warn!(
                    "Constraint {id} for facility {} not found; unit constraints will be used",
                    self.name
                );
            }
        }

        Ok(Facility {
            id: FacilityID::from(self.name),
            category,
            capacity: Capacity(self.capacity.unwrap_or_default()),
            multiplier: self.multiplier.unwrap_or(1.0),
            constraint_id,
            underlying: self.underlying.unwrap_or(false),
            series_column: None,
            costs: FacilityCosts {
                capex: MoneyPerCapacity(self.capex.unwrap_or_default()),
                fixed_om: MoneyPerCapacityPerYear(self.fixed_om.unwrap_or_default()),
                variable_om: MoneyPerEnergy(self.variable_om.unwrap_or_default()),
                fuel: MoneyPerEnergy(self.fuel.unwrap_or_default()),
                lcoe: MoneyPerEnergy(self.lcoe.unwrap_or_default()),
                lcoe_cf: Dimensionless(self.lcoe_cf.unwrap_or_default()),
                emissions: EmissionsPerEnergy(self.emissions.unwrap_or_default()),
                discount_rate: Dimensionless(self.discount_rate.unwrap_or_default()),
                lifetime: self.lifetime.unwrap_or_default(),
                area: AreaPerCapacity(self.area.unwrap_or_default()),
            },
            initial: Energy(self.initial.unwrap_or_default()),
        })
    }

    fn validate(&self, category: FacilityCategory) -> Result<()> {
        for (name, value) in [
            ("capacity", self.capacity),
            ("multiplier", self.multiplier),
            ("capex", self.capex),
            ("fixed_om", self.fixed_om),
            ("variable_om", self.variable_om),
            ("fuel", self.fuel),
            ("lcoe", self.lcoe),
            ("emissions", self.emissions),
            ("discount_rate", self.discount_rate),
            ("area", self.area),
            ("initial", self.initial),
        ] {
            if let Some(value) = value {
                check_non_negative(value, name)?;
            }
        }
        ensure!(
            (0.0..=1.0).contains(&self.lcoe_cf.unwrap_or_default()),
            "lcoe_cf must be between 0 and 1"
        );
        ensure!(
            !self.underlying.unwrap_or(false) || category == FacilityCategory::Renewable,
            "Only renewables can be underlying"
        );
        ensure!(
            self.initial.unwrap_or_default() == 0.0 || category == FacilityCategory::Storage,
            "Only storage can have initial energy"
        );

        Ok(())
    }
}

/// Read the fleet from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `constraints` - The constraint catalogue
///
/// # Returns
///
/// Facilities keyed by ID in file order, or an error.
pub fn read_facilities(
    model_dir: &Path,
    constraints: &ConstraintMap,
) -> Result<IndexMap<FacilityID, Facility>> {
    let file_path = model_dir.join(FACILITIES_FILE_NAME);
    let raw = read_csv::<FacilityRaw>(&file_path)?;
    read_facilities_from_iter(raw, constraints).with_context(|| input_err_msg(&file_path))
}

fn read_facilities_from_iter<I>(
    iter: I,
    constraints: &ConstraintMap,
) -> Result<IndexMap<FacilityID, Facility>>
where
    I: IntoIterator<Item = FacilityRaw>,
{
    let facilities: Vec<_> = iter
        .into_iter()
        .map(|raw| raw.into_facility(constraints))
        .try_collect()?;
    into_id_map(facilities)
}
