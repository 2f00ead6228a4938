//! Helpers for building models in integration tests.
#![allow(dead_code)]
use indexmap::IndexMap;
use powermatch::constraint::{Constraint, ConstraintCategory, ConstraintMap};
use powermatch::facility::{Facility, FacilityCategory, FacilityCosts, FacilityRegistry};
use powermatch::model::{Model, ModelParameters};
use powermatch::optimisation::OptimisationRecordMap;
use powermatch::series::{HOURS_PER_YEAR, SeriesStore};
use powermatch::units::{Capacity, Energy};
use std::path::PathBuf;

/// Get the path to the bundled demo model.
pub fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Stop the tests from writing to the console
pub fn quiet() {
    // SAFETY: tests which call this only ever set the variable to the same value
    unsafe { std::env::set_var("POWERMATCH_LOG_LEVEL", "off") };
}

/// A series which alternates between two values, starting with `first`
pub fn alternating(first: f64, second: f64) -> Vec<f64> {
    (0..HOURS_PER_YEAR)
        .map(|hour| if hour % 2 == 0 { first } else { second })
        .collect()
}

/// A facility with no costs
pub fn facility(name: &str, category: FacilityCategory, capacity: f64) -> Facility {
    Facility {
        id: name.into(),
        category,
        capacity: Capacity(capacity),
        multiplier: 1.0,
        constraint_id: None,
        underlying: false,
        series_column: None,
        costs: FacilityCosts::default(),
        initial: Energy(0.0),
    }
}

/// Unit constraints with the given ID
pub fn constraint(id: &str, category: ConstraintCategory) -> Constraint {
    Constraint::unit(id.into(), category)
}

/// Builds a model one facility at a time
pub struct ModelBuilder {
    facilities: Vec<Facility>,
    constraints: ConstraintMap,
    series: SeriesStore,
    parameters: ModelParameters,
}

impl ModelBuilder {
    /// Start a model with the given hourly load
    pub fn new(load: Vec<f64>) -> Self {
        let mut builder = Self {
            facilities: Vec::new(),
            constraints: ConstraintMap::new(),
            series: SeriesStore::default(),
            parameters: toml::from_str("year = 2023\ndiscount_rate = 0.05").unwrap(),
        };
        builder.add_series(facility("Load", FacilityCategory::Load, 0.0), load);
        builder
    }

    fn add_series(&mut self, mut facility: Facility, values: Vec<f64>) {
        let column = self.series.push(facility.id.clone(), values).unwrap();
        facility.series_column = Some(column);
        self.facilities.push(facility);
    }

    /// Add a renewable driven by a per-unit series
    pub fn renewable(mut self, facility: Facility, values: Vec<f64>) -> Self {
        self.add_series(facility, values);
        self
    }

    /// Add a generator or storage facility, appending it to the dispatch order
    pub fn dispatchable(mut self, mut facility: Facility, constraint: Constraint) -> Self {
        facility.constraint_id = Some(constraint.id.clone());
        self.parameters.dispatch_order.push(facility.id.to_string());
        self.constraints.insert(constraint.id.clone(), constraint);
        self.facilities.push(facility);
        self
    }

    /// Change the model parameters
    pub fn parameters(mut self, update: impl FnOnce(&mut ModelParameters)) -> Self {
        update(&mut self.parameters);
        self
    }

    /// Assemble the model
    pub fn build(self) -> Model {
        self.build_with_records(OptimisationRecordMap::new())
    }

    /// Assemble the model with optimisation records
    pub fn build_with_records(self, records: OptimisationRecordMap) -> Model {
        let facilities: IndexMap<_, _> = self
            .facilities
            .into_iter()
            .map(|facility| (facility.id.clone(), facility))
            .collect();
        Model::new(
            self.parameters,
            FacilityRegistry::new(facilities).unwrap(),
            self.constraints,
            self.series,
            records,
        )
        .unwrap()
    }
}
