//! The hourly dispatch engine.
//!
//! A dispatch runs in two passes over the year. The first allocates renewable output to load pro
//! rata, leaving a signed shortfall for every hour (positive is unmet load, negative is surplus).
//! The second walks the dispatch order, letting each generator and storage facility act on the
//! remaining shortfall hour by hour.
//!
//! When minimum generation is reserved, the committed output of every generator with a floor is
//! taken off the load before renewables are allocated. Each such generator adds its share back
//! onto the shortfall when its turn comes.
use crate::constraint::{Constraint, ConstraintCategory};
use crate::facility::{Facility, FacilityCategory, FacilityHandle};
use crate::model::Model;
use crate::series::{HOURS_PER_YEAR, HourlySeries, hour_of_day};
use crate::units::{Capacity, Energy};
use log::{debug, warn};

/// The outcome of dispatch for one facility
#[derive(PartialEq, Debug, Clone)]
pub struct FacilityDispatch {
    /// The facility
    pub handle: FacilityHandle,
    /// Capacity after applying the multiplier
    pub capacity: Capacity,
    /// Energy which went to meeting load
    pub to_meet_load: Energy,
    /// Total energy produced (for storage, energy discharged)
    pub generation: Energy,
    /// Largest output in any hour
    pub max_hourly: Energy,
    /// Output in each hour
    pub hourly: HourlySeries,
    /// Extra detail for storage facilities
    pub storage: Option<StorageTrace>,
}

impl FacilityDispatch {
    fn new(handle: FacilityHandle, capacity: Capacity) -> Self {
        Self {
            handle,
            capacity,
            to_meet_load: Energy(0.0),
            generation: Energy(0.0),
            max_hourly: Energy(0.0),
            hourly: vec![0.0; HOURS_PER_YEAR],
            storage: None,
        }
    }

    /// Record output for an hour
    fn record(&mut self, hour: usize, output: f64, to_meet_load: f64) {
        self.hourly[hour] = output;
        self.generation += Energy(output);
        self.to_meet_load += Energy(to_meet_load);
        self.max_hourly = self.max_hourly.max(Energy(output));
    }

    /// Generation as a fraction of what the capacity could produce over the year.
    ///
    /// `None` if the facility has no capacity.
    pub fn capacity_factor(&self) -> Option<f64> {
        let potential = self.capacity.value() * HOURS_PER_YEAR as f64;
        (potential > 0.0).then(|| self.generation.value() / potential)
    }
}

/// Hour-by-hour detail of a storage facility
#[derive(PartialEq, Debug, Clone)]
pub struct StorageTrace {
    /// Energy taken in each hour, before losses
    pub charge: HourlySeries,
    /// Stored energy at the end of each hour
    pub state_of_charge: HourlySeries,
    /// Energy lost to charging, discharging and self-discharge
    pub losses: Energy,
    /// Largest stored energy at the end of any hour
    pub max_balance: Energy,
}

/// Pearson correlations between load and supply
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Correlations {
    /// Load against renewable generation
    pub load_renewables: Option<f64>,
    /// Load against renewable generation plus storage discharge
    pub load_renewables_storage: Option<f64>,
    /// Load against the load actually served
    pub load_served: Option<f64>,
}

/// The outcome of a dispatch run
#[derive(PartialEq, Debug, Clone)]
pub struct DispatchResult {
    /// One entry per facility, in registry order
    pub facilities: Vec<FacilityDispatch>,
    /// Load in each hour, including load met by underlying renewables
    pub load: HourlySeries,
    /// Signed shortfall after dispatch (positive is unmet, negative is surplus)
    pub shortfall: HourlySeries,
    /// Renewable energy which went to meeting load in each hour
    pub row_tml: HourlySeries,
    /// Total renewable generation in each hour
    pub renewables: HourlySeries,
    /// Total generator output in each hour
    pub generators: HourlySeries,
    /// Total storage discharge in each hour
    pub storage_discharge: HourlySeries,
    /// Total storage charge in each hour
    pub storage_charge: HourlySeries,
    /// Correlation coefficients
    pub correlations: Correlations,
}

impl DispatchResult {
    /// Get the result for a facility
    pub fn facility(&self, handle: FacilityHandle) -> &FacilityDispatch {
        &self.facilities[handle.0]
    }

    /// Total load over the year
    pub fn total_load(&self) -> Energy {
        Energy(self.load.iter().sum())
    }

    /// Total unmet load over the year
    pub fn total_shortfall(&self) -> Energy {
        Energy(self.shortfall.iter().filter(|s| **s > 0.0).sum())
    }

    /// Total surplus over the year (as a positive quantity)
    pub fn total_surplus(&self) -> Energy {
        Energy(-self.shortfall.iter().filter(|s| **s < 0.0).sum::<f64>())
    }

    /// The hour with the largest unmet load and that amount, if any load is unmet
    pub fn largest_shortfall(&self) -> Option<(usize, Energy)> {
        self.shortfall
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .fold(None, |best, (hour, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((hour, s)),
            })
            .map(|(hour, s)| (hour, Energy(s)))
    }

    /// Energy lost by all storage facilities
    pub fn storage_losses(&self) -> Energy {
        self.facilities
            .iter()
            .filter_map(|f| f.storage.as_ref())
            .map(|trace| trace.losses)
            .sum()
    }
}

/// Storage limits resolved against a facility's capacity
struct StorageLimits {
    capacity: f64,
    min_soc: f64,
    max_soc: f64,
}

/// Run the dispatch engine over the whole year.
///
/// The engine never fails: missing constraints fall back on unit constraints and
/// anomalous series values pass through the arithmetic unchanged.
pub fn dispatch(model: &Model) -> DispatchResult {
    let facilities = &model.facilities;
    let reserve_committed = model.parameters.reserve_committed;

    let mut results: Vec<_> = facilities
        .iter()
        .map(|(handle, facility)| FacilityDispatch::new(handle, facility.effective_capacity()))
        .collect();

    // Constraints for every dispatchable in order
    let order: Vec<(FacilityHandle, Constraint)> = model
        .dispatch_order
        .iter()
        .map(|&handle| (handle, resolve_constraint(model, handle)))
        .collect();

    // Committed output of each generator with a floor, if reserved ahead of renewables
    let commitments: Vec<f64> = order
        .iter()
        .map(|(handle, constraint)| {
            let facility = facilities.get(*handle);
            if reserve_committed && facility.category == FacilityCategory::Generator {
                facility.effective_capacity().value() * constraint.capacity_min
            } else {
                0.0
            }
        })
        .collect();
    let committed: f64 = commitments.iter().sum();

    let (mut result, mut reserved) = allocate_renewables(model, committed, &mut results);

    for ((handle, constraint), commitment) in order.iter().zip(commitments) {
        let facility = facilities.get(*handle);
        let output = &mut results[handle.0];
        match facility.category {
            FacilityCategory::Generator => dispatch_generator(
                facility,
                constraint,
                commitment,
                &mut reserved,
                &mut result.shortfall,
                output,
            ),
            FacilityCategory::Storage => {
                dispatch_storage(facility, constraint, &mut result.shortfall, output);
            }
            FacilityCategory::Load | FacilityCategory::Renewable => {
                warn!("Facility {} cannot be dispatched; skipping", facility.id);
            }
        }
    }

    for facility_result in &results {
        match facilities.get(facility_result.handle).category {
            FacilityCategory::Generator => add_series(&mut result.generators, &facility_result.hourly),
            FacilityCategory::Storage => {
                add_series(&mut result.storage_discharge, &facility_result.hourly);
                if let Some(trace) = &facility_result.storage {
                    add_series(&mut result.storage_charge, &trace.charge);
                }
            }
            _ => {}
        }
    }

    result.correlations = correlations(&result);
    result.facilities = results;
    result
}

/// The constraint for a dispatchable facility, or unit constraints if it has none
fn resolve_constraint(model: &Model, handle: FacilityHandle) -> Constraint {
    if let Some(constraint) = model.constraint_for(handle) {
        return constraint.clone();
    }

    // The loader has already warned about this once
    let facility = model.facilities.get(handle);
    debug!(
        "No constraint found for facility {}; using unit constraints",
        facility.id
    );
    let category = if facility.category == FacilityCategory::Storage {
        ConstraintCategory::Storage
    } else {
        ConstraintCategory::Generator
    };
    let id = facility
        .constraint_id
        .clone()
        .unwrap_or_else(|| facility.id.0.as_ref().into());
    Constraint::unit(id, category)
}

/// The hourly series for a facility, if it has one
fn series_for<'a>(model: &'a Model, facility: &Facility) -> Option<&'a [f64]> {
    facility
        .series_column
        .filter(|column| *column < model.series.len())
        .map(|column| model.series.column(column))
}

/// Allocate renewable output to load, pro rata when renewables exceed what load is left over.
///
/// Also returns, for each hour, how much load is held back for committed generators.
fn allocate_renewables(
    model: &Model,
    committed: f64,
    results: &mut [FacilityDispatch],
) -> (DispatchResult, Vec<f64>) {
    let facilities = &model.facilities;
    let order = facilities.re_order();
    let (load_handle, renewable_handles) = (order[0], &order[1..]);
    let load_facility = facilities.get(load_handle);
    let load_series: &[f64] = if let Some(series) = series_for(model, load_facility) {
        series
    } else {
        warn!(
            "No hourly series for load {}; assuming zero load",
            load_facility.id
        );
        &[]
    };

    let renewables: Vec<(FacilityHandle, bool, f64, &[f64])> = renewable_handles
        .iter()
        .filter_map(|&handle| {
            let facility = facilities.get(handle);
            let Some(series) = series_for(model, facility) else {
                warn!("No hourly series for renewable {}; skipping", facility.id);
                return None;
            };
            Some((
                handle,
                facility.underlying,
                facility.effective_capacity().value(),
                series,
            ))
        })
        .collect();

    let mut load = vec![0.0; HOURS_PER_YEAR];
    let mut shortfall = vec![0.0; HOURS_PER_YEAR];
    let mut row_tml = vec![0.0; HOURS_PER_YEAR];
    let mut total_renewables = vec![0.0; HOURS_PER_YEAR];
    let mut reserved = vec![0.0; HOURS_PER_YEAR];
    for hour in 0..HOURS_PER_YEAR {
        let operational_load =
            load_series.get(hour).copied().unwrap_or_default() * load_facility.multiplier;

        let mut underlying = 0.0;
        let mut operational = 0.0;
        for (_, is_underlying, capacity, series) in &renewables {
            let output = series[hour] * capacity;
            if *is_underlying {
                underlying += output;
            } else {
                operational += output;
            }
        }

        let net_load = operational_load - committed;
        let residual = net_load - operational;
        let alpha = if residual >= 0.0 || operational <= 0.0 {
            1.0
        } else {
            (net_load / operational).max(0.0)
        };

        for (handle, is_underlying, capacity, series) in &renewables {
            let output = series[hour] * capacity;
            let share = if *is_underlying { 1.0 } else { alpha };
            results[handle.0].record(hour, output, output * share);
        }

        load[hour] = operational_load + underlying;
        shortfall[hour] = residual;
        row_tml[hour] = alpha * operational + underlying;
        total_renewables[hour] = operational + underlying;
        reserved[hour] = committed.min(operational_load.max(0.0));
    }

    let total_load: f64 = load.iter().sum();
    let load_result = &mut results[load_handle.0];
    load_result.generation = Energy(total_load);
    load_result.to_meet_load = Energy(total_load);
    load_result.max_hourly = Energy(load.iter().copied().fold(0.0, f64::max));
    load_result.hourly.clone_from(&load);

    let result = DispatchResult {
        facilities: Vec::new(),
        load,
        shortfall,
        row_tml,
        renewables: total_renewables,
        generators: vec![0.0; HOURS_PER_YEAR],
        storage_discharge: vec![0.0; HOURS_PER_YEAR],
        storage_charge: vec![0.0; HOURS_PER_YEAR],
        correlations: Correlations::default(),
    };

    (result, reserved)
}

/// Dispatch a generator against the shortfall.
///
/// A generator runs at full output if the shortfall is at least its capacity, follows the
/// shortfall if that is above its floor, and otherwise runs at its floor, producing surplus.
///
/// A committed generator first takes back the load reserved for it. That load counts towards what
/// it meets, along with any unmet load it covers beyond its commitment.
fn dispatch_generator(
    facility: &Facility,
    constraint: &Constraint,
    commitment: f64,
    reserved: &mut [f64],
    shortfall: &mut [f64],
    output: &mut FacilityDispatch,
) {
    let capacity = facility.effective_capacity().value();
    let max_output = capacity * constraint.capacity_max;
    let min_output = capacity * constraint.capacity_min;
    debug!(
        "Dispatching generator {} (max {max_output}, min {min_output})",
        facility.id
    );

    for (hour, (remaining, reserved)) in shortfall.iter_mut().zip(reserved.iter_mut()).enumerate() {
        let share = commitment.min(*reserved);
        *reserved -= share;
        let unmet = remaining.max(0.0);
        *remaining += commitment;

        let before = *remaining;
        let delivered = if before >= max_output {
            max_output
        } else if before >= min_output {
            before
        } else {
            min_output
        };
        *remaining -= delivered;

        let to_meet_load = share.min(delivered) + (delivered - share).max(0.0).min(unmet);
        output.record(hour, delivered, to_meet_load);
    }
}

/// Resolve storage limits against capacity
fn storage_limits(facility: &Facility, constraint: &Constraint) -> StorageLimits {
    let capacity = facility.effective_capacity().value();
    StorageLimits {
        capacity,
        min_soc: capacity * constraint.capacity_min,
        max_soc: capacity * constraint.capacity_max,
    }
}

/// Whether every hour in the run starting after `hour` has unmet load.
///
/// Runs which would extend past the end of the year can't be started.
fn can_run_for(shortfall: &[f64], hour: usize, min_run_time: u32) -> bool {
    let end = hour + min_run_time as usize;
    if end >= shortfall.len() {
        return false;
    }

    shortfall[hour + 1..=end].iter().all(|s| *s > 0.0)
}

/// Dispatch a storage facility against the shortfall.
///
/// Storage charges from surplus and discharges into unmet load, subject to its hourly limits,
/// losses and the hours of the day at which it may operate. Output in the first hour of a run is
/// scaled down by the warm-up fraction. Self-discharge is a fixed fraction of
/// the energy held at the start of each day, spread evenly over the day.
fn dispatch_storage(
    facility: &Facility,
    constraint: &Constraint,
    shortfall: &mut [f64],
    output: &mut FacilityDispatch,
) {
    let limits = storage_limits(facility, constraint);
    let max_charge = limits.capacity * constraint.recharge_max;
    let max_discharge = limits.capacity * constraint.discharge_max;
    let recharge_efficiency = 1.0 - constraint.recharge_loss;
    let discharge_efficiency = 1.0 - constraint.discharge_loss;

    let mut soc = (facility.initial.value() * facility.multiplier).clamp(limits.min_soc, limits.max_soc);
    let mut day_start_soc = soc;
    let mut in_run = false;
    let mut losses = 0.0;
    let mut max_balance = soc;
    let mut charge = vec![0.0; HOURS_PER_YEAR];
    let mut state_of_charge = vec![0.0; HOURS_PER_YEAR];

    for hour in 0..shortfall.len() {
        let hour_of_day = hour_of_day(hour);
        if hour_of_day == 0 {
            day_start_soc = soc;
        }

        // A flat hourly drain, not compounding, so a loss of 1.0 empties the store within the day
        if constraint.parasitic_loss > 0.0 && soc > limits.min_soc {
            let drained = (soc - day_start_soc * constraint.parasitic_loss / 24.0).max(limits.min_soc);
            losses += soc - drained;
            soc = drained;
        }

        let remaining = shortfall[hour];
        let mut delivered = 0.0;
        if remaining < 0.0 && hour_of_day >= constraint.recharge_start {
            in_run = false;
            let headroom = (limits.max_soc - soc) / recharge_efficiency;
            let intake = max_charge.min(-remaining).min(headroom).max(0.0);
            soc += intake * recharge_efficiency;
            losses += intake * constraint.recharge_loss;
            shortfall[hour] += intake;
            charge[hour] = intake;
        } else if remaining > 0.0
            && hour_of_day >= constraint.discharge_start
            && (in_run
                || constraint.min_run_time == 0
                || can_run_for(shortfall, hour, constraint.min_run_time))
        {
            let mut drawn = max_discharge
                .min(remaining / discharge_efficiency)
                .min(soc - limits.min_soc)
                .max(0.0);
            if !in_run && constraint.warm_time > 0.0 {
                // Still warming up for part of the first hour of a run
                drawn *= 1.0 - constraint.warm_time;
            }
            delivered = drawn * discharge_efficiency;
            soc -= drawn;
            losses += drawn - delivered;
            shortfall[hour] -= delivered;
            in_run = drawn > 0.0;
        } else {
            in_run = false;
        }

        output.record(hour, delivered, delivered);
        state_of_charge[hour] = soc;
        max_balance = f64::max(max_balance, soc);
    }

    output.storage = Some(StorageTrace {
        charge,
        state_of_charge,
        losses: Energy(losses),
        max_balance: Energy(max_balance),
    });
}

fn add_series(total: &mut [f64], series: &[f64]) {
    for (total, value) in total.iter_mut().zip(series) {
        *total += value;
    }
}

/// Pearson correlation coefficient, or `None` if either series is constant
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n == 0 {
        return None;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    (denominator > 0.0).then(|| cov / denominator)
}

fn correlations(result: &DispatchResult) -> Correlations {
    let with_storage: Vec<f64> = result
        .renewables
        .iter()
        .zip(&result.storage_discharge)
        .map(|(re, storage)| re + storage)
        .collect();
    let served: Vec<f64> = result
        .load
        .iter()
        .zip(&result.shortfall)
        .map(|(load, shortfall)| load - shortfall.max(0.0))
        .collect();

    Correlations {
        load_renewables: pearson(&result.load, &result.renewables),
        load_renewables_storage: pearson(&result.load, &with_storage),
        load_served: pearson(&result.load, &served),
    }
}
