#![allow(missing_docs)]

//! This module defines various unit types and their conversions.
//!
//! Capacity is MW for generators, renewables and load, and MWh of nominal energy for storage.
//! Energy is MWh, money is dollars and emissions are tonnes of CO2-equivalent.
use serde::{Deserialize, Serialize};

macro_rules! base_unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The absolute value of the quantity
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// The larger of two quantities
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// The smaller of two quantities
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! unit_struct {
    ($name:ident) => {
        base_unit_struct!($name);

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

// Dimensionless quantities (fractions, factors)
base_unit_struct!(Dimensionless);

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl Dimensionless {
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

// Base quantities
unit_struct!(Money);
unit_struct!(Energy);
unit_struct!(Capacity);
unit_struct!(Emissions);
unit_struct!(Area);

// Derived quantities
unit_struct!(MoneyPerCapacity);
unit_struct!(MoneyPerCapacityPerYear);
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerEmissions);
unit_struct!(EmissionsPerEnergy);
unit_struct!(AreaPerCapacity);

// Division rules
impl_div!(Money, Energy, MoneyPerEnergy);
impl_div!(Money, Capacity, MoneyPerCapacity);
impl_div!(Emissions, Energy, EmissionsPerEnergy);

// Multiplication rules
impl_mul!(MoneyPerCapacity, Capacity, Money);
impl_mul!(MoneyPerCapacityPerYear, Capacity, Money);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(EmissionsPerEnergy, Energy, Emissions);
impl_mul!(MoneyPerEmissions, Emissions, Money);
impl_mul!(AreaPerCapacity, Capacity, Area);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_derived_units() {
        let cost = MoneyPerEnergy(10.0) * Energy(5.0);
        assert_eq!(cost, Money(50.0));
        assert_eq!(Money(50.0) / Energy(5.0), MoneyPerEnergy(10.0));
        assert_eq!(EmissionsPerEnergy(0.5) * Energy(4.0), Emissions(2.0));
        assert_eq!(MoneyPerEmissions(100.0) * Emissions(2.0), Money(200.0));
    }

    #[test]
    fn test_same_unit_ratio() {
        let ratio = Energy(3.0) / Energy(4.0);
        assert_approx_eq!(f64, ratio.value(), 0.75);
    }

    #[test]
    fn test_sum_and_assign() {
        let mut total: Energy = [Energy(1.0), Energy(2.5)].into_iter().sum();
        total += Energy(0.5);
        assert_eq!(total, Energy(4.0));
    }
}
