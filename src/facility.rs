//! Facilities are the members of the fleet: the load, variable renewables, dispatchable generators
//! and storage. The [`FacilityRegistry`] holds them in a fixed order so that the dispatch engine can
//! refer to them by small integer handles rather than by name.
use crate::constraint::ConstraintID;
use crate::id::{define_id_getter, define_id_type};
use crate::units::{
    AreaPerCapacity, Capacity, Dimensionless, Energy, EmissionsPerEnergy, MoneyPerCapacity,
    MoneyPerCapacityPerYear, MoneyPerEnergy,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

define_id_type! {FacilityID}

/// The lifetime assumed for facilities which don't specify one
pub const DEFAULT_LIFETIME: u32 = 20;

/// What role a facility plays in the energy balance
#[derive(PartialEq, Eq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum FacilityCategory {
    /// The demand to be met
    #[string = "load"]
    Load,
    /// Variable renewable generation driven by an hourly trace
    #[string = "renewable"]
    Renewable,
    /// Dispatchable generation
    #[string = "generator"]
    Generator,
    /// Energy storage
    #[string = "storage"]
    Storage,
}

/// Economic and environmental parameters of a facility
#[derive(PartialEq, Debug, Clone, Default)]
pub struct FacilityCosts {
    /// Overnight capital cost per unit capacity
    pub capex: MoneyPerCapacity,
    /// Annual fixed operating cost per unit capacity
    pub fixed_om: MoneyPerCapacityPerYear,
    /// Variable operating cost per unit generation
    pub variable_om: MoneyPerEnergy,
    /// Fuel cost per unit generation
    pub fuel: MoneyPerEnergy,
    /// Reference LCOE, used when no capital cost model is given
    pub lcoe: MoneyPerEnergy,
    /// Capacity factor the reference LCOE was calculated at
    pub lcoe_cf: Dimensionless,
    /// Emissions per unit generation
    pub emissions: EmissionsPerEnergy,
    /// Facility-specific discount rate (zero means use the model's rate)
    pub discount_rate: Dimensionless,
    /// Lifetime in years (zero means [`DEFAULT_LIFETIME`])
    pub lifetime: u32,
    /// Land area per unit capacity
    pub area: AreaPerCapacity,
}

impl FacilityCosts {
    /// Whether costs are derived from capital and operating costs rather than a reference LCOE
    pub fn has_cost_model(&self) -> bool {
        self.capex != MoneyPerCapacity(0.0)
            || self.fixed_om != MoneyPerCapacityPerYear(0.0)
            || self.variable_om != MoneyPerEnergy(0.0)
            || self.fuel != MoneyPerEnergy(0.0)
    }

    /// The lifetime to use for annualising costs
    pub fn effective_lifetime(&self) -> u32 {
        if self.lifetime == 0 {
            DEFAULT_LIFETIME
        } else {
            self.lifetime
        }
    }

    /// The discount rate to use, falling back on the model-wide rate
    pub fn effective_discount_rate(&self, model_rate: Dimensionless) -> Dimensionless {
        if self.discount_rate == Dimensionless(0.0) {
            model_rate
        } else {
            self.discount_rate
        }
    }
}

/// A member of the fleet
#[derive(PartialEq, Debug, Clone)]
pub struct Facility {
    /// Unique name, optionally prefixed by a zone (e.g. `north.Wind`)
    pub id: FacilityID,
    /// The role the facility plays
    pub category: FacilityCategory,
    /// Rated capacity (MW, or MWh for storage)
    pub capacity: Capacity,
    /// Scaling applied to the capacity for a run
    pub multiplier: f64,
    /// Key into the constraint catalogue
    pub constraint_id: Option<ConstraintID>,
    /// Behind-the-meter renewables which are added to load rather than pro-rated against it
    pub underlying: bool,
    /// Column in the series store holding this facility's hourly trace
    pub series_column: Option<usize>,
    /// Economic parameters
    pub costs: FacilityCosts,
    /// Initial stored energy (storage only)
    pub initial: Energy,
}
define_id_getter! {Facility, FacilityID}

impl Facility {
    /// Capacity scaled by the multiplier
    pub fn effective_capacity(&self) -> Capacity {
        self.capacity * Dimensionless(self.multiplier)
    }

    /// Whether the facility can be commanded hour by hour
    pub fn is_dispatchable(&self) -> bool {
        matches!(
            self.category,
            FacilityCategory::Generator | FacilityCategory::Storage
        )
    }
}

/// A handle to a facility within a [`FacilityRegistry`]
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct FacilityHandle(pub usize);

/// The fleet, keyed by name and addressable by handle
#[derive(PartialEq, Debug, Clone, Default)]
pub struct FacilityRegistry {
    facilities: IndexMap<FacilityID, Facility>,
}

impl FacilityRegistry {
    /// Create a registry from facilities keyed by ID.
    ///
    /// There must be exactly one load facility.
    pub fn new(facilities: IndexMap<FacilityID, Facility>) -> Result<Self> {
        let load_count = facilities
            .values()
            .filter(|facility| facility.category == FacilityCategory::Load)
            .count();
        ensure!(
            load_count == 1,
            "There must be exactly one load facility (found {load_count})"
        );

        Ok(Self { facilities })
    }

    /// Look up the handle for a facility name
    pub fn handle(&self, name: &str) -> Option<FacilityHandle> {
        self.facilities.get_index_of(name).map(FacilityHandle)
    }

    /// Get a facility by handle
    pub fn get(&self, handle: FacilityHandle) -> &Facility {
        &self.facilities[handle.0]
    }

    #[cfg(test)]
    pub fn get_mut(&mut self, handle: FacilityHandle) -> &mut Facility {
        &mut self.facilities[handle.0]
    }

    /// Get a facility by name
    pub fn get_by_name(&self, name: &str) -> Option<&Facility> {
        self.facilities.get(name)
    }

    /// Number of facilities
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    /// Iterate over handles and facilities in registry order
    pub fn iter(&self) -> impl Iterator<Item = (FacilityHandle, &Facility)> {
        self.facilities
            .values()
            .enumerate()
            .map(|(idx, facility)| (FacilityHandle(idx), facility))
    }

    /// Iterate over facilities of the given category in registry order
    pub fn iter_category(
        &self,
        category: FacilityCategory,
    ) -> impl Iterator<Item = (FacilityHandle, &Facility)> {
        self.iter()
            .filter(move |(_, facility)| facility.category == category)
    }

    /// The handle of the load facility
    pub fn load_handle(&self) -> FacilityHandle {
        self.iter_category(FacilityCategory::Load)
            .map(|(handle, _)| handle)
            .next()
            .expect("Registry has no load facility")
    }

    /// The renewable allocation order: the load first, then every renewable in registry order
    pub fn re_order(&self) -> Vec<FacilityHandle> {
        std::iter::once(self.load_handle())
            .chain(
                self.iter_category(FacilityCategory::Renewable)
                    .map(|(handle, _)| handle),
            )
            .collect()
    }

    /// Set the multiplier of a facility
    pub fn set_multiplier(&mut self, handle: FacilityHandle, multiplier: f64) {
        self.facilities[handle.0].multiplier = multiplier;
    }

    /// Scale a facility so that its effective capacity matches `capacity`
    pub fn set_effective_capacity(
        &mut self,
        handle: FacilityHandle,
        capacity: Capacity,
    ) -> Result<()> {
        let facility = &mut self.facilities[handle.0];
        ensure!(
            facility.capacity > Capacity(0.0),
            "Cannot rescale facility {} as it has no base capacity",
            facility.id
        );
        facility.multiplier = (capacity / facility.capacity).value();

        Ok(())
    }

    /// Resolve a list of names into handles, failing on the first unknown name
    pub fn handles_for<'a, I>(&self, names: I) -> Result<Vec<FacilityHandle>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| {
                self.handle(name)
                    .with_context(|| format!("Unknown facility {name}"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, facility, registry};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_re_order(registry: FacilityRegistry) {
        let names: Vec<_> = registry
            .re_order()
            .into_iter()
            .map(|handle| registry.get(handle).id.to_string())
            .collect();
        assert_eq!(names, ["Load", "north.Wind", "Solar"]);
    }

    #[rstest]
    fn test_set_effective_capacity(mut registry: FacilityRegistry) {
        let handle = registry.handle("Coal").unwrap();
        registry
            .set_effective_capacity(handle, Capacity(150.0))
            .unwrap();
        let coal = registry.get(handle);
        assert_approx_eq!(f64, coal.multiplier, 1.5);
        assert_approx_eq!(f64, coal.effective_capacity().value(), 150.0);
    }

    #[test]
    fn test_registry_needs_one_load() {
        let wind = facility("Wind", FacilityCategory::Renewable, 10.0);
        let facilities = [(wind.id.clone(), wind)].into_iter().collect();
        assert_error!(
            FacilityRegistry::new(facilities),
            "There must be exactly one load facility (found 0)"
        );
    }

    #[rstest]
    fn test_handles_for(registry: FacilityRegistry) {
        assert_eq!(
            registry.handles_for(["Coal", "Battery"]).unwrap(),
            [registry.handle("Coal").unwrap(), registry.handle("Battery").unwrap()]
        );
        assert_error!(registry.handles_for(["Gas"]), "Unknown facility Gas");
    }

    #[test]
    fn test_effective_lifetime_and_rate() {
        let costs = FacilityCosts::default();
        assert_eq!(costs.effective_lifetime(), DEFAULT_LIFETIME);
        assert_eq!(
            costs.effective_discount_rate(Dimensionless(0.07)),
            Dimensionless(0.07)
        );
        assert!(!costs.has_cost_model());
    }
}
