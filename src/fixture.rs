//! Fixtures for tests

use crate::constraint::{Constraint, ConstraintCategory, ConstraintMap};
use crate::facility::{Facility, FacilityCategory, FacilityCosts, FacilityRegistry};
use crate::model::{Model, ModelParameters};
use crate::optimisation::OptimisationRecordMap;
use crate::series::{HOURS_PER_YEAR, SeriesStore};
use crate::units::{Capacity, Energy};
use indexmap::IndexMap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A facility with no costs and no constraint
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

fn with_series(mut facility: Facility, column: usize) -> Facility {
    facility.series_column = Some(column);
    facility
}

fn with_constraint(mut facility: Facility, constraint: &str) -> Facility {
    facility.constraint_id = Some(constraint.into());
    facility
}

fn into_registry(facilities: impl IntoIterator<Item = Facility>) -> FacilityRegistry {
    let map: IndexMap<_, _> = facilities
        .into_iter()
        .map(|facility| (facility.id.clone(), facility))
        .collect();
    FacilityRegistry::new(map).unwrap()
}

#[fixture]
pub fn registry() -> FacilityRegistry {
    into_registry([
        with_series(facility("Load", FacilityCategory::Load, 0.0), 0),
        with_series(facility("north.Wind", FacilityCategory::Renewable, 50.0), 1),
        with_series(facility("Solar", FacilityCategory::Renewable, 20.0), 2),
        with_constraint(facility("Coal", FacilityCategory::Generator, 100.0), "coal"),
        with_constraint(facility("Battery", FacilityCategory::Storage, 100.0), "battery"),
    ])
}

#[fixture]
pub fn constraints() -> ConstraintMap {
    let mut coal = constraint("coal", ConstraintCategory::Generator);
    coal.capacity_min = 0.4;
    let mut battery = constraint("battery", ConstraintCategory::Storage);
    battery.capacity_max = 0.9;

    [coal, battery]
        .into_iter()
        .map(|constraint| (constraint.id.clone(), constraint))
        .collect()
}

#[fixture]
pub fn series_store() -> SeriesStore {
    let mut store = SeriesStore::default();
    store.push("Load".into(), vec![100.0; HOURS_PER_YEAR]).unwrap();
    store.push("north.Wind".into(), vec![0.4; HOURS_PER_YEAR]).unwrap();
    store.push("Solar".into(), vec![0.2; HOURS_PER_YEAR]).unwrap();
    store
}

#[fixture]
pub fn model(
    registry: FacilityRegistry,
    constraints: ConstraintMap,
    series_store: SeriesStore,
) -> Model {
    let parameters = ModelParameters {
        dispatch_order: vec!["Battery".into(), "Coal".into()],
        ..ModelParameters::default()
    };
    Model::new(
        parameters,
        registry,
        constraints,
        series_store,
        OptimisationRecordMap::new(),
    )
    .unwrap()
}

/// Build a model from series and constraints.
///
/// Renewables are given as `(name, capacity, series)` and generators and storage as
/// `(name, capacity, constraint)`. Generators are dispatched before storage, in the order given.
pub fn model_with(
    load: Vec<f64>,
    renewables: &[(&str, f64, Vec<f64>)],
    generators: &[(&str, f64, Constraint)],
    storage: &[(&str, f64, Constraint)],
) -> Model {
    let mut series = SeriesStore::default();
    let mut facilities = Vec::new();
    let mut constraints = ConstraintMap::new();

    let column = series.push("Load".into(), load).unwrap();
    facilities.push(with_series(facility("Load", FacilityCategory::Load, 0.0), column));
    for (name, capacity, values) in renewables {
        let column = series.push((*name).into(), values.clone()).unwrap();
        facilities.push(with_series(
            facility(name, FacilityCategory::Renewable, *capacity),
            column,
        ));
    }

    let mut dispatch_order = Vec::new();
    for (category, members) in [
        (FacilityCategory::Generator, generators),
        (FacilityCategory::Storage, storage),
    ] {
        for (name, capacity, constraint) in members {
            facilities.push(with_constraint(
                facility(name, category, *capacity),
                &constraint.id.0,
            ));
            constraints.insert(constraint.id.clone(), constraint.clone());
            dispatch_order.push((*name).to_string());
        }
    }

    let parameters = ModelParameters {
        dispatch_order,
        ..ModelParameters::default()
    };
    Model::new(
        parameters,
        into_registry(facilities),
        constraints,
        series,
        OptimisationRecordMap::new(),
    )
    .unwrap()
}
