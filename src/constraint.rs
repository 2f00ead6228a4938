//! Constraints describe the operational limits shared by facilities of the same type.
//!
//! Each facility refers to a constraint by key. Facilities without a matching constraint are
//! dispatched with [`Constraint::unit`] limits.
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

define_id_type! {ConstraintID}

/// A map of [`Constraint`]s, keyed by constraint ID
pub type ConstraintMap = IndexMap<ConstraintID, Constraint>;

/// Minutes in an hour, for coercing warm-up times
const MINUTES_PER_HOUR: f64 = 60.0;

/// Hours in a day
pub const HOURS_PER_DAY: u32 = 24;

/// The kind of facility a constraint is written for
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, DeserializeLabeledStringEnum)]
pub enum ConstraintCategory {
    /// Dispatchable generation (e.g. coal, gas, hydro)
    #[default]
    #[string = "generator"]
    Generator,
    /// Energy storage (e.g. batteries, pumped hydro)
    #[string = "storage"]
    Storage,
    /// Variable renewable generation
    #[string = "renewable"]
    Renewable,
}

/// Operational limits for a type of facility
#[derive(PartialEq, Debug, Clone)]
pub struct Constraint {
    /// Key referenced by facilities
    pub id: ConstraintID,
    /// The kind of facility this applies to
    pub category: ConstraintCategory,
    /// Floor run rate for generators, floor state of charge for storage (fraction of capacity)
    pub capacity_min: f64,
    /// Ceiling run rate for generators, ceiling state of charge for storage (fraction of capacity)
    pub capacity_max: f64,
    /// Maximum energy discharged per hour (fraction of capacity)
    pub discharge_max: f64,
    /// Fraction of discharged energy lost
    pub discharge_loss: f64,
    /// Maximum energy taken in per hour (fraction of capacity)
    pub recharge_max: f64,
    /// Fraction of energy taken in which is lost
    pub recharge_loss: f64,
    /// Fraction of stored energy lost per day
    pub parasitic_loss: f64,
    /// Hour of day before which discharging is inhibited
    pub discharge_start: u32,
    /// Hour of day before which recharging is inhibited
    pub recharge_start: u32,
    /// Hours a facility must be able to run for once started
    pub min_run_time: u32,
    /// Fraction of the first hour of a run lost to warming up
    pub warm_time: f64,
    /// Maximum ramp down per hour (carried, not used by dispatch)
    pub rampdown_max: f64,
    /// Maximum ramp up per hour (carried, not used by dispatch)
    pub rampup_max: f64,
}
define_id_getter! {Constraint, ConstraintID}

impl Constraint {
    /// Unlimited constraints with no losses, used when a facility has no matching constraint
    pub fn unit(id: ConstraintID, category: ConstraintCategory) -> Self {
        Self {
            id,
            category,
            capacity_min: 0.0,
            capacity_max: 1.0,
            discharge_max: 1.0,
            discharge_loss: 0.0,
            recharge_max: 1.0,
            recharge_loss: 0.0,
            parasitic_loss: 0.0,
            discharge_start: 0,
            recharge_start: 0,
            min_run_time: 0,
            warm_time: 0.0,
            rampdown_max: 1.0,
            rampup_max: 1.0,
        }
    }
}

/// Convert a warm-up time into the fraction of an hour it occupies.
///
/// Values of one or more are taken to be minutes. Values in `(0, 1/24]` are taken to be fractions
/// of a day. Anything else is already a fraction of an hour. The result is capped at one.
pub fn warm_time_fraction(raw: f64) -> f64 {
    let fraction = if raw >= 1.0 {
        raw / MINUTES_PER_HOUR
    } else if raw > 0.0 && raw <= 1.0 / HOURS_PER_DAY as f64 {
        raw * HOURS_PER_DAY as f64
    } else {
        raw
    };

    fraction.clamp(0.0, 1.0)
}

/// Convert a start time into an hour of the day.
///
/// Accepts a clock time (`"07:00"`, minutes are truncated), a fraction of a day (`0.25` is 06:00)
/// or a whole hour (`7`). Returns `None` if the value cannot be interpreted or is not within a day.
pub fn parse_hour_of_day(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0);
    }

    if let Some((hours, minutes)) = s.split_once(':') {
        let hours: u32 = hours.trim().parse().ok()?;
        let minutes: u32 = minutes.trim().parse().ok()?;
        return (hours < HOURS_PER_DAY && minutes < 60).then_some(hours);
    }

    let value: f64 = s.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let hour = if value < 1.0 {
        (value * HOURS_PER_DAY as f64).floor()
    } else {
        value.floor()
    };
    (hour < HOURS_PER_DAY as f64).then_some(hour as u32)
}
