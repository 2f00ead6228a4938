//! The model represents all inputs for a dispatch or optimisation run.
use crate::constraint::{Constraint, ConstraintMap};
use crate::facility::{FacilityCategory, FacilityHandle, FacilityRegistry};
use crate::optimisation::OptimisationRecordMap;
use crate::series::SeriesStore;
use anyhow::{Result, ensure};
use log::warn;
use std::collections::HashSet;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug, Clone)]
pub struct Model {
    /// Global scalars for the run
    pub parameters: ModelParameters,
    /// The fleet
    pub facilities: FacilityRegistry,
    /// Operational limits by constraint key
    pub constraints: ConstraintMap,
    /// Hourly load and generation traces
    pub series: SeriesStore,
    /// How each facility's capacity may be varied by the optimiser
    pub optimisation: OptimisationRecordMap,
    /// Dispatchable facilities in the order in which they are called on
    pub dispatch_order: Vec<FacilityHandle>,
}

impl Model {
    /// Assemble a model from its parts, resolving the dispatch order.
    ///
    /// Unknown or non-dispatchable names in the dispatch order are skipped with a warning.
    pub fn new(
        parameters: ModelParameters,
        facilities: FacilityRegistry,
        constraints: ConstraintMap,
        series: SeriesStore,
        optimisation: OptimisationRecordMap,
    ) -> Result<Self> {
        let dispatch_order = resolve_dispatch_order(&parameters.dispatch_order, &facilities);
        check_series_columns(&facilities, &series)?;
        check_storage_initial(&facilities, &constraints)?;

        Ok(Self {
            parameters,
            facilities,
            constraints,
            series,
            optimisation,
            dispatch_order,
        })
    }

    /// Get the constraint for a facility, if it has one
    pub fn constraint_for(&self, handle: FacilityHandle) -> Option<&Constraint> {
        let facility = self.facilities.get(handle);
        facility
            .constraint_id
            .as_ref()
            .and_then(|id| self.constraints.get(id))
    }
}

/// Resolve facility names into handles for dispatchable facilities
fn resolve_dispatch_order(names: &[String], facilities: &FacilityRegistry) -> Vec<FacilityHandle> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for name in names {
        let Some(handle) = facilities.handle(name) else {
            warn!("Facility {name} in dispatch order not found; skipping");
            continue;
        };

        if !facilities.get(handle).is_dispatchable() {
            warn!("Facility {name} in dispatch order is not a generator or storage; skipping");
            continue;
        }

        if !seen.insert(handle) {
            warn!("Facility {name} appears more than once in dispatch order; skipping repeat");
            continue;
        }

        order.push(handle);
    }

    order
}

/// Check that the load and every renewable have an hourly series
fn check_series_columns(facilities: &FacilityRegistry, series: &SeriesStore) -> Result<()> {
    for (_, facility) in facilities.iter() {
        if matches!(
            facility.category,
            FacilityCategory::Load | FacilityCategory::Renewable
        ) {
            let column = facility.series_column;
            ensure!(
                column.is_some_and(|idx| idx < series.len()),
                "No hourly series found for {}",
                facility.id
            );
        }
    }

    Ok(())
}

/// Check that storage does not start with more energy than it can hold
fn check_storage_initial(facilities: &FacilityRegistry, constraints: &ConstraintMap) -> Result<()> {
    for (_, facility) in facilities.iter_category(FacilityCategory::Storage) {
        let capacity_max = facility
            .constraint_id
            .as_ref()
            .and_then(|id| constraints.get(id))
            .map_or(1.0, |constraint| constraint.capacity_max);
        let max_energy = facility.capacity.value() * capacity_max;
        ensure!(
            facility.initial.value() <= max_energy,
            "Initial energy for storage {} ({}) exceeds its maximum ({max_energy})",
            facility.id,
            facility.initial
        );
    }

    Ok(())
}
