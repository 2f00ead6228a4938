//! Economic, environmental and reliability metrics for a dispatch result.
use crate::dispatch::{Correlations, DispatchResult, FacilityDispatch};
use crate::facility::{Facility, FacilityCategory, FacilityHandle, FacilityID};
use crate::finance::{annual_capital_cost, levelised_cost};
use crate::model::Model;
use crate::series::{HOURS_PER_YEAR, hour_to_datetime};
use crate::units::{Area, Capacity, Dimensionless, Emissions, Energy, Money, MoneyPerEnergy};
use chrono::NaiveDateTime;

/// Metrics for one facility
#[derive(PartialEq, Debug, Clone)]
pub struct FacilitySummary {
    /// The facility
    pub handle: FacilityHandle,
    /// Facility name
    pub id: FacilityID,
    /// The role the facility plays
    pub category: FacilityCategory,
    /// Capacity after applying the multiplier
    pub capacity: Capacity,
    /// Energy which went to meeting load
    pub to_meet_load: Energy,
    /// Total energy produced
    pub generation: Energy,
    /// Generation over potential generation (blank if no capacity)
    pub capacity_factor: Option<f64>,
    /// Annual cost excluding carbon (blank if removed)
    pub annual_cost: Option<Money>,
    /// Cost per unit generated
    pub lcog: Option<MoneyPerEnergy>,
    /// Cost per unit of load met
    pub lcoe: Option<MoneyPerEnergy>,
    /// Annual emissions
    pub emissions: Emissions,
    /// Cost of annual emissions at the carbon price
    pub emissions_cost: Money,
    /// Cost per unit of load met, including carbon
    pub lcoe_with_carbon: Option<MoneyPerEnergy>,
    /// Largest output in any hour
    pub max_hourly: Energy,
    /// Largest stored energy (storage only)
    pub max_balance: Option<Energy>,
    /// Overnight capital cost
    pub capital_cost: Money,
    /// Annual cost over the longest lifetime in the fleet
    pub lifetime_cost: Option<Money>,
    /// Emissions over the longest lifetime in the fleet
    pub lifetime_emissions: Emissions,
    /// Carbon cost over the longest lifetime in the fleet
    pub lifetime_emissions_cost: Money,
    /// Land area occupied
    pub area: Area,
}

/// Column totals across the fleet
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Totals {
    /// Total capacity
    pub capacity: Capacity,
    /// Total energy meeting load
    pub to_meet_load: Energy,
    /// Total generation
    pub generation: Energy,
    /// Total annual cost excluding carbon
    pub annual_cost: Money,
    /// Fleet cost per unit generated
    pub lcog: Option<MoneyPerEnergy>,
    /// Fleet cost per unit of load met
    pub lcoe: Option<MoneyPerEnergy>,
    /// Total emissions
    pub emissions: Emissions,
    /// Total carbon cost
    pub emissions_cost: Money,
    /// Fleet cost per unit of load met, including carbon
    pub lcoe_with_carbon: Option<MoneyPerEnergy>,
    /// Total capital cost
    pub capital_cost: Money,
    /// Total lifetime cost
    pub lifetime_cost: Money,
    /// Total lifetime emissions
    pub lifetime_emissions: Emissions,
    /// Total lifetime carbon cost
    pub lifetime_emissions_cost: Money,
    /// Total area
    pub area: Area,
}

/// System-wide reliability and renewable share figures.
///
/// Percentages are on a 0-100 scale and are blank where their denominator is zero.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Analysis {
    /// Renewable share of load met
    pub re_pct: Option<f64>,
    /// Storage share of load met
    pub storage_pct: Option<f64>,
    /// Total load
    pub total_load: Energy,
    /// Total unmet load
    pub shortfall: Energy,
    /// Load met
    pub load_met: Energy,
    /// Load met as a share of total load
    pub load_met_pct: Option<f64>,
    /// Renewable energy meeting load as a share of total load
    pub re_pct_of_load: Option<f64>,
    /// Energy lost by storage
    pub storage_losses: Energy,
    /// Total surplus, with the configured sign
    pub surplus: Energy,
    /// Surplus as a share of total load
    pub surplus_pct: Option<f64>,
    /// Largest unmet load in an hour, with its hour of the year and date
    pub largest_shortfall: Option<LargestShortfall>,
}

/// The hour with the largest unmet load
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct LargestShortfall {
    /// Unmet load in that hour
    pub shortfall: Energy,
    /// Hour of the year (zero-based)
    pub hour: usize,
    /// Calendar date and time of the hour
    pub datetime: Option<NaiveDateTime>,
}

/// All metrics for a dispatch
#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    /// One row per facility, excluding the load
    pub facilities: Vec<FacilitySummary>,
    /// Column totals
    pub totals: Totals,
    /// System-wide figures
    pub analysis: Analysis,
    /// Correlations between load and supply
    pub correlations: Correlations,
}

/// Express `part` as a percentage of `whole`
fn percentage(part: f64, whole: f64) -> Option<f64> {
    (whole != 0.0).then(|| 100.0 * part / whole)
}

/// The longest lifetime of any facility with capacity
fn max_lifetime(model: &Model, result: &DispatchResult) -> u32 {
    model
        .facilities
        .iter()
        .filter(|(handle, facility)| {
            facility.category != FacilityCategory::Load
                && result.facility(*handle).capacity > Capacity(0.0)
        })
        .map(|(_, facility)| facility.costs.effective_lifetime())
        .max()
        .unwrap_or_default()
}

/// The annual cost of a facility, excluding carbon
fn annual_cost(model: &Model, facility: &Facility, output: &FacilityDispatch) -> Money {
    let costs = &facility.costs;
    let capacity = output.capacity;
    if costs.has_cost_model() {
        let rate = costs.effective_discount_rate(model.parameters.discount_rate);
        annual_capital_cost(costs.capex, capacity, costs.effective_lifetime(), rate)
            + costs.fixed_om * capacity
            + (costs.variable_om + costs.fuel) * output.generation
    } else if model.parameters.adjusted_lcoe || costs.lcoe_cf == Dimensionless(0.0) {
        costs.lcoe * output.generation
    } else {
        let reference_generation = Energy(capacity.value() * HOURS_PER_YEAR as f64) * costs.lcoe_cf;
        costs.lcoe * reference_generation
    }
}

/// Calculate per-facility metrics, totals and system-wide figures for a dispatch
pub fn summarise(model: &Model, result: &DispatchResult) -> Summary {
    let params = &model.parameters;
    let lifetime = Dimensionless(f64::from(max_lifetime(model, result)));

    let tml_of = |category| -> Energy {
        model
            .facilities
            .iter_category(category)
            .map(|(handle, _)| result.facility(handle).to_meet_load)
            .sum()
    };
    let renewable_tml = tml_of(FacilityCategory::Renewable);
    let storage_tml = tml_of(FacilityCategory::Storage);
    let generator_tml = tml_of(FacilityCategory::Generator);

    let mut facilities = Vec::new();
    for (handle, facility) in model.facilities.iter() {
        if facility.category == FacilityCategory::Load {
            continue;
        }

        let output = result.facility(handle);
        let removed = params.remove_cost && output.generation == Energy(0.0);
        let cost = annual_cost(model, facility, output);

        // Storage's contribution is shared among renewables by how much load they meet
        let lcoe_energy = if params.corrected_lcoe
            && facility.category == FacilityCategory::Renewable
            && renewable_tml > Energy(0.0)
        {
            output.to_meet_load + storage_tml * (output.to_meet_load / renewable_tml)
        } else {
            output.to_meet_load
        };

        let emissions = facility.costs.emissions * output.generation;
        let emissions_cost = params.carbon_price * emissions;
        let annual_cost = (!removed).then_some(cost);
        facilities.push(FacilitySummary {
            handle,
            id: facility.id.clone(),
            category: facility.category,
            capacity: output.capacity,
            to_meet_load: output.to_meet_load,
            generation: output.generation,
            capacity_factor: output.capacity_factor(),
            annual_cost,
            lcog: annual_cost.and_then(|cost| levelised_cost(cost, output.generation)),
            lcoe: annual_cost.and_then(|cost| levelised_cost(cost, lcoe_energy)),
            emissions,
            emissions_cost,
            lcoe_with_carbon: annual_cost
                .and_then(|cost| levelised_cost(cost + emissions_cost, lcoe_energy)),
            max_hourly: output.max_hourly,
            max_balance: output.storage.as_ref().map(|trace| trace.max_balance),
            capital_cost: facility.costs.capex * output.capacity,
            lifetime_cost: annual_cost.map(|cost| cost * lifetime),
            lifetime_emissions: emissions * lifetime,
            lifetime_emissions_cost: emissions_cost * lifetime,
            area: facility.costs.area * output.capacity,
        });
    }

    let totals = totals(&facilities);
    let analysis = analysis(
        model,
        result,
        renewable_tml,
        generator_tml,
        storage_tml,
    );

    Summary {
        facilities,
        totals,
        analysis,
        correlations: result.correlations,
    }
}

/// Sum facility rows, ignoring blanked costs
fn totals(facilities: &[FacilitySummary]) -> Totals {
    let mut totals = Totals::default();
    for row in facilities {
        totals.capacity += row.capacity;
        totals.to_meet_load += row.to_meet_load;
        totals.generation += row.generation;
        totals.annual_cost += row.annual_cost.unwrap_or_default();
        totals.emissions += row.emissions;
        totals.emissions_cost += row.emissions_cost;
        totals.capital_cost += row.capital_cost;
        totals.lifetime_cost += row.lifetime_cost.unwrap_or_default();
        totals.lifetime_emissions += row.lifetime_emissions;
        totals.lifetime_emissions_cost += row.lifetime_emissions_cost;
        totals.area += row.area;
    }

    totals.lcog = levelised_cost(totals.annual_cost, totals.generation);
    totals.lcoe = levelised_cost(totals.annual_cost, totals.to_meet_load);
    totals.lcoe_with_carbon =
        levelised_cost(totals.annual_cost + totals.emissions_cost, totals.to_meet_load);
    totals
}

fn analysis(
    model: &Model,
    result: &DispatchResult,
    renewable_tml: Energy,
    generator_tml: Energy,
    storage_tml: Energy,
) -> Analysis {
    let total_tml = (renewable_tml + generator_tml + storage_tml).value();
    let re_tml = total_tml - generator_tml.value() - storage_tml.value();
    let total_load = result.total_load();
    let shortfall = result.total_shortfall();
    let surplus = result.total_surplus();
    let load_met = total_load - shortfall;
    let year = i32::try_from(model.parameters.year).unwrap_or_default();

    Analysis {
        re_pct: percentage(re_tml, total_tml),
        storage_pct: percentage(storage_tml.value(), total_tml),
        total_load,
        shortfall,
        load_met,
        load_met_pct: percentage(load_met.value(), total_load.value()),
        re_pct_of_load: percentage(re_tml, total_load.value()),
        storage_losses: result.storage_losses(),
        surplus: surplus * Dimensionless(f64::from(model.parameters.surplus_sign)),
        surplus_pct: percentage(surplus.value(), total_load.value()),
        largest_shortfall: result
            .largest_shortfall()
            .map(|(hour, shortfall)| LargestShortfall {
                shortfall,
                hour,
                datetime: hour_to_datetime(year, hour),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintCategory;
    use crate::dispatch::dispatch;
    use crate::fixture::{constraint, model_with};
    use crate::units::{
        EmissionsPerEnergy, MoneyPerCapacity, MoneyPerCapacityPerYear, MoneyPerEmissions,
    };
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const HOURS: f64 = HOURS_PER_YEAR as f64;

    fn row<'a>(summary: &'a Summary, name: &str) -> &'a FacilitySummary {
        summary
            .facilities
            .iter()
            .find(|row| row.id.0.as_ref() == name)
            .unwrap()
    }

    /// 10 MW of flat load met by 5 MW of wind and 5 MW of coal
    fn wind_and_coal() -> Model {
        model_with(
            vec![10.0; HOURS_PER_YEAR],
            &[("Wind", 5.0, vec![1.0; HOURS_PER_YEAR])],
            &[("Coal", 5.0, constraint("coal", ConstraintCategory::Generator))],
            &[],
        )
    }

    #[test]
    fn test_reference_lcoe() {
        let mut model = wind_and_coal();
        let coal = model.facilities.handle("Coal").unwrap();
        {
            let coal = model.facilities.get_mut(coal);
            coal.capacity = Capacity(100.0);
            coal.costs.lcoe = MoneyPerEnergy(80.0);
            coal.costs.lcoe_cf = Dimensionless(0.3);
        }

        let summary = summarise(&model, &dispatch(&model));
        let coal = row(&summary, "Coal");
        assert_approx_eq!(f64, coal.annual_cost.unwrap().value(), 21_024_000.0, epsilon = 1e-6);
        assert_approx_eq!(
            f64,
            coal.lcog.unwrap().value(),
            21_024_000.0 / (5.0 * HOURS),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_adjusted_lcoe() {
        let mut model = wind_and_coal();
        model.parameters.adjusted_lcoe = true;
        let coal = model.facilities.handle("Coal").unwrap();
        {
            let coal = model.facilities.get_mut(coal);
            coal.costs.lcoe = MoneyPerEnergy(80.0);
            coal.costs.lcoe_cf = Dimensionless(0.3);
        }

        let summary = summarise(&model, &dispatch(&model));
        let coal = row(&summary, "Coal");
        assert_approx_eq!(f64, coal.annual_cost.unwrap().value(), 80.0 * 5.0 * HOURS);
        assert_approx_eq!(f64, coal.lcoe.unwrap().value(), 80.0);
    }

    #[test]
    fn test_capex_cost_model() {
        let mut model = wind_and_coal();
        model.parameters.discount_rate = Dimensionless(0.0);
        let wind = model.facilities.handle("Wind").unwrap();
        {
            let wind = model.facilities.get_mut(wind);
            wind.costs.capex = MoneyPerCapacity(2000.0);
            wind.costs.fixed_om = MoneyPerCapacityPerYear(10.0);
            wind.costs.lifetime = 10;
        }

        let summary = summarise(&model, &dispatch(&model));
        let wind = row(&summary, "Wind");
        // 2000 * 5 / 10 years + 10 * 5
        assert_approx_eq!(f64, wind.annual_cost.unwrap().value(), 1050.0);
        assert_approx_eq!(f64, wind.capital_cost.value(), 10_000.0);

        // Coal has the default lifetime, which is the longest in the fleet
        assert_approx_eq!(f64, wind.lifetime_cost.unwrap().value(), 1050.0 * 20.0);
    }

    #[rstest]
    #[case(0.0)]
    #[case(100.0)]
    fn test_carbon_price(#[case] carbon_price: f64) {
        let mut model = wind_and_coal();
        model.parameters.carbon_price = MoneyPerEmissions(carbon_price);
        let coal = model.facilities.handle("Coal").unwrap();
        model.facilities.get_mut(coal).costs.emissions = EmissionsPerEnergy(1.0);

        let summary = summarise(&model, &dispatch(&model));
        let totals = &summary.totals;
        assert_approx_eq!(f64, totals.emissions.value(), 5.0 * HOURS);
        let lcoe = totals.lcoe.unwrap().value();
        let with_carbon = totals.lcoe_with_carbon.unwrap().value();
        assert_approx_eq!(f64, with_carbon, lcoe + carbon_price / 2.0, epsilon = 1e-9);

        let coal = row(&summary, "Coal");
        assert!(coal.lcoe.unwrap() <= coal.lcoe_with_carbon.unwrap());
    }

    #[test]
    fn test_remove_cost() {
        let mut model = model_with(
            vec![10.0; HOURS_PER_YEAR],
            &[("Wind", 20.0, vec![1.0; HOURS_PER_YEAR])],
            &[("Coal", 5.0, constraint("coal", ConstraintCategory::Generator))],
            &[],
        );
        model.parameters.remove_cost = true;
        let coal = model.facilities.handle("Coal").unwrap();
        model.facilities.get_mut(coal).costs.fixed_om = MoneyPerCapacityPerYear(100.0);

        let summary = summarise(&model, &dispatch(&model));
        let coal = row(&summary, "Coal");
        assert_eq!(coal.generation, Energy(0.0));
        assert_eq!(coal.annual_cost, None);
        assert_eq!(coal.lcog, None);
        assert_eq!(summary.totals.annual_cost, Money(0.0));
    }

    #[test]
    fn test_corrected_lcoe() {
        let load: Vec<f64> = (0..HOURS_PER_YEAR)
            .map(|h| if h % 2 == 0 { 5.0 } else { 10.0 })
            .collect();
        let wind: Vec<f64> = (0..HOURS_PER_YEAR)
            .map(|h| if h % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        let mut model = model_with(
            load,
            &[("Wind", 10.0, wind)],
            &[],
            &[("Battery", 100.0, constraint("battery", ConstraintCategory::Storage))],
        );
        model.parameters.corrected_lcoe = true;
        model.parameters.adjusted_lcoe = true;
        let wind = model.facilities.handle("Wind").unwrap();
        model.facilities.get_mut(wind).costs.lcoe = MoneyPerEnergy(50.0);

        let summary = summarise(&model, &dispatch(&model));
        let wind = row(&summary, "Wind");
        // Half of the wind meets load directly and the rest arrives via the battery
        let pairs = (HOURS_PER_YEAR / 2) as f64;
        assert_approx_eq!(f64, wind.to_meet_load.value(), 5.0 * pairs, epsilon = 1e-6);
        assert_approx_eq!(f64, wind.lcoe.unwrap().value(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_analysis() {
        let model = model_with(
            vec![10.0; HOURS_PER_YEAR],
            &[("Wind", 5.0, vec![1.0; HOURS_PER_YEAR])],
            &[],
            &[],
        );
        let summary = summarise(&model, &dispatch(&model));
        let analysis = &summary.analysis;

        assert_approx_eq!(f64, analysis.total_load.value(), 10.0 * HOURS);
        assert_approx_eq!(f64, analysis.shortfall.value(), 5.0 * HOURS);
        assert_approx_eq!(f64, analysis.load_met_pct.unwrap(), 50.0);
        assert_approx_eq!(f64, analysis.re_pct.unwrap(), 100.0);
        assert_approx_eq!(f64, analysis.re_pct_of_load.unwrap(), 50.0);
        assert_eq!(analysis.surplus_pct, Some(0.0));

        let largest = analysis.largest_shortfall.unwrap();
        assert_eq!(largest.hour, 0);
        assert_eq!(largest.shortfall, Energy(5.0));
        assert_eq!(
            largest.datetime.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2023-01-01 00:00"
        );
    }

    #[test]
    fn test_surplus_sign() {
        let mut model = model_with(
            vec![10.0; HOURS_PER_YEAR],
            &[("Wind", 15.0, vec![1.0; HOURS_PER_YEAR])],
            &[],
            &[],
        );
        let summary = summarise(&model, &dispatch(&model));
        assert_approx_eq!(f64, summary.analysis.surplus.value(), -5.0 * HOURS);
        assert_approx_eq!(f64, summary.analysis.surplus_pct.unwrap(), 50.0);

        model.parameters.surplus_sign = 1;
        let summary = summarise(&model, &dispatch(&model));
        assert_approx_eq!(f64, summary.analysis.surplus.value(), 5.0 * HOURS);
    }
}
