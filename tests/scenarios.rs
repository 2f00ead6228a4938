//! End-to-end dispatch, costing and optimisation scenarios.
mod common;
use common::{ModelBuilder, alternating, constraint, facility};
use float_cmp::assert_approx_eq;
use powermatch::constraint::ConstraintCategory;
use powermatch::dispatch::dispatch;
use powermatch::facility::FacilityCategory;
use powermatch::metrics::summarise;
use powermatch::optimisation::encoding::Approach;
use powermatch::optimisation::{GenerationReport, OptimisationRecordMap, optimise};
use powermatch::model::parameters::Objective;
use powermatch::series::HOURS_PER_YEAR;
use powermatch::units::{Capacity, Dimensionless, EmissionsPerEnergy, MoneyPerEmissions, MoneyPerEnergy};
use std::sync::atomic::{AtomicBool, Ordering};

const HOURS: f64 = HOURS_PER_YEAR as f64;

#[test]
fn minimal() {
    let model = ModelBuilder::new(vec![10.0; HOURS_PER_YEAR])
        .renewable(
            facility("Wind", FacilityCategory::Renewable, 5.0),
            vec![1.0; HOURS_PER_YEAR],
        )
        .build();

    let result = dispatch(&model);
    let summary = summarise(&model, &result);
    let wind = &summary.facilities[0];
    assert_approx_eq!(f64, wind.to_meet_load.value(), 43800.0);
    assert_approx_eq!(f64, wind.capacity_factor.unwrap(), 1.0);
    assert!(result.shortfall.iter().all(|shortfall| *shortfall == 5.0));
    assert_eq!(result.total_surplus().value(), 0.0);
}

#[test]
fn storage_round_trip() {
    let mut storage = constraint("battery", ConstraintCategory::Storage);
    storage.discharge_loss = 0.1;
    storage.recharge_loss = 0.1;
    let model = ModelBuilder::new(alternating(0.0, 10.0))
        .renewable(
            facility("Wind", FacilityCategory::Renewable, 10.0),
            alternating(1.0, 0.0),
        )
        .dispatchable(facility("Battery", FacilityCategory::Storage, 100.0), storage)
        .build();

    let result = dispatch(&model);
    let battery = model.facilities.handle("Battery").unwrap();
    let output = result.facility(battery);
    let trace = output.storage.as_ref().unwrap();

    // Charged with the whole surplus in even hours, delivering 0.9 × 0.9 of it in odd hours
    for hour in (0..HOURS_PER_YEAR).step_by(2) {
        assert_approx_eq!(f64, trace.charge[hour], 10.0);
        assert_approx_eq!(f64, output.hourly[hour + 1], 8.1, epsilon = 1e-9);
    }
    assert_approx_eq!(f64, trace.state_of_charge[HOURS_PER_YEAR - 1], 0.0, epsilon = 1e-9);
    assert_approx_eq!(f64, output.to_meet_load.value(), 8.1 * HOURS / 2.0, epsilon = 1e-6);
}

#[test]
fn carbon_impact() {
    let mut wind = facility("Wind", FacilityCategory::Renewable, 5.0);
    wind.costs.lcoe = MoneyPerEnergy(60.0);
    let mut coal = facility("Coal", FacilityCategory::Generator, 5.0);
    coal.costs.lcoe = MoneyPerEnergy(80.0);
    coal.costs.emissions = EmissionsPerEnergy(1.0);

    let model = ModelBuilder::new(vec![10.0; HOURS_PER_YEAR])
        .renewable(wind, vec![1.0; HOURS_PER_YEAR])
        .dispatchable(coal, constraint("coal", ConstraintCategory::Generator))
        .parameters(|params| params.carbon_price = MoneyPerEmissions(100.0))
        .build();

    let summary = summarise(&model, &dispatch(&model));
    let lcoe = summary.totals.lcoe.unwrap().value();
    let with_carbon = summary.totals.lcoe_with_carbon.unwrap().value();
    assert_approx_eq!(f64, lcoe, 70.0, epsilon = 1e-9);
    assert_approx_eq!(f64, with_carbon, lcoe + 50.0, epsilon = 1e-9);
}

#[test]
fn reference_lcoe_facility() {
    for series in [0.1, 0.9] {
        let mut solar = facility("Solar", FacilityCategory::Renewable, 100.0);
        solar.costs.lcoe = MoneyPerEnergy(80.0);
        solar.costs.lcoe_cf = Dimensionless(0.3);
        let model = ModelBuilder::new(vec![50.0; HOURS_PER_YEAR])
            .renewable(solar, vec![series; HOURS_PER_YEAR])
            .build();

        // Costed at its reference capacity factor whatever it generates
        let summary = summarise(&model, &dispatch(&model));
        assert_approx_eq!(
            f64,
            summary.facilities[0].annual_cost.unwrap().value(),
            21_024_000.0,
            epsilon = 1e-3
        );
    }
}

/// Two gas plants which can each be switched on or off: four possible fleets
fn two_plant_model() -> powermatch::model::Model {
    let mut small = facility("Small", FacilityCategory::Generator, 50.0);
    small.costs.lcoe = MoneyPerEnergy(90.0);
    let mut large = facility("Large", FacilityCategory::Generator, 100.0);
    large.costs.lcoe = MoneyPerEnergy(40.0);

    let mut records = OptimisationRecordMap::new();
    records.insert("Large".into(), Approach::Discrete(vec![Capacity(100.0)]));
    records.insert("Small".into(), Approach::Discrete(vec![Capacity(50.0)]));

    ModelBuilder::new(vec![100.0; HOURS_PER_YEAR])
        .dispatchable(large, constraint("large", ConstraintCategory::Generator))
        .dispatchable(small, constraint("small", ConstraintCategory::Generator))
        .parameters(|params| {
            let optimisation = &mut params.optimisation;
            optimisation.objective = Objective::Lcoe;
            optimisation.population_size = 4;
            optimisation.generations = 1;
            optimisation.seed = Some(17);
        })
        .build_with_records(records)
}

#[test]
fn optimiser_convergence() {
    let model = two_plant_model();
    let result = optimise(&model, &AtomicBool::new(false), &mut |_: &GenerationReport| {}).unwrap();

    // The large plant alone meets all the load at the lowest cost
    assert_eq!(result.generations_run, 1);
    let best = result.best_lcoe.unwrap();
    assert_eq!(best.chromosome, [true, false]);
    assert_approx_eq!(f64, best.scores.lcoe, 40.0, epsilon = 1e-9);
}

#[test]
fn cancellation() {
    let mut model = two_plant_model();
    let params = &mut model.parameters.optimisation;
    params.generations = 100;
    params.population_size = 6;
    params.stop_if_stable = 0;

    let cancel = AtomicBool::new(false);
    let mut best_so_far = f64::INFINITY;
    let result = optimise(&model, &cancel, &mut |report: &GenerationReport| {
        best_so_far = best_so_far.min(report.best_lcoe);
        if report.generation == 5 {
            cancel.store(true, Ordering::Relaxed);
        }
    })
    .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.generations_run, 5);
    assert_eq!(result.history.len(), 5);
    assert_eq!(result.best_lcoe.unwrap().scores.lcoe, best_so_far);
}
