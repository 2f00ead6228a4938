//! General functions related to finance.
use crate::units::{Capacity, Dimensionless, Energy, Money, MoneyPerCapacity, MoneyPerEnergy};

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualise capital costs over the lifetime of an asset.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annualised capital cost of a facility of the given capacity
pub fn annual_capital_cost(
    capital_cost: MoneyPerCapacity,
    capacity: Capacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> Money {
    let crf = capital_recovery_factor(lifetime, discount_rate);
    capital_cost * capacity * crf
}

/// Divide an annual cost by an energy quantity, returning `None` where the energy is zero.
///
/// Levelised costs with a zero denominator are reported as blank rather than as zero or infinity.
pub fn levelised_cost(annual_cost: Money, energy: Energy) -> Option<MoneyPerEnergy> {
    (energy != Energy(0.0)).then(|| annual_cost / energy)
}
