//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{check_non_negative, deserialise_proportion, input_err_msg, read_toml};
use crate::units::{Dimensionless, MoneyPerEmissions};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashSet;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_surplus_sign, i8, -1);
define_param_default!(default_population_size, usize, 50);
define_param_default!(default_generations, u32, 20);
define_param_default!(default_mutation_rate, f64, 0.005);

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The (4-digit) year the hourly series represent
    pub year: u32,
    /// Price applied to emissions ($/tCO2e)
    #[serde(default)]
    pub carbon_price: MoneyPerEmissions,
    /// Upper bound on the carbon price (zero disables the check)
    #[serde(default)]
    pub carbon_price_max: MoneyPerEmissions,
    /// Discount rate used for facilities which don't provide their own
    #[serde(default)]
    pub discount_rate: Dimensionless,
    /// Sign with which surplus is reported (+1 or -1)
    #[serde(default = "default_surplus_sign")]
    pub surplus_sign: i8,
    /// Whether minimum generation of committed generators is reserved ahead of renewables
    #[serde(default)]
    pub reserve_committed: bool,
    /// Whether storage contribution is apportioned among renewables when calculating their LCOE
    #[serde(default)]
    pub corrected_lcoe: bool,
    /// Whether reference-LCOE facilities are costed on their dispatched generation
    #[serde(default)]
    pub adjusted_lcoe: bool,
    /// Whether cost rows of facilities with no generation are blanked
    #[serde(default)]
    pub remove_cost: bool,
    /// Whether the RE target of the optimiser refers to total load rather than load met
    #[serde(default)]
    pub optimise_total_re: bool,
    /// Dispatchable facilities in the order in which they are called on
    #[serde(default)]
    pub dispatch_order: Vec<String>,
    /// Settings for the capacity optimiser
    #[serde(default)]
    pub optimisation: OptimisationParameters,
}

/// Which scores the optimiser minimises
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    /// Minimise LCOE only
    #[default]
    #[string = "lcoe"]
    Lcoe,
    /// Minimise the multi-objective weight only
    #[string = "multi"]
    Multi,
    /// Minimise both
    #[string = "both"]
    Both,
}

impl Objective {
    /// Whether the LCOE score takes part in selection
    pub fn uses_lcoe(self) -> bool {
        matches!(self, Self::Lcoe | Self::Both)
    }

    /// Whether the multi score takes part in selection
    pub fn uses_multi(self) -> bool {
        matches!(self, Self::Multi | Self::Both)
    }
}

/// How parent chromosomes are spliced together
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossoverKind {
    /// Splice at one point
    #[string = "one_point"]
    OnePoint,
    /// Splice at two points
    #[default]
    #[string = "two_point"]
    TwoPoint,
}

/// Capacity range used for facilities which have no optimisation record
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DefaultRange {
    /// Smallest capacity
    pub min_bound: f64,
    /// Largest capacity
    pub max_bound: f64,
    /// Number of steps between the bounds
    pub step_count: u32,
}

/// Weight and bounds for one multi-objective target
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
pub struct Target {
    /// Relative importance (zero disables the target)
    #[serde(default)]
    pub weight: f64,
    /// Value at or beyond which the target contributes nothing
    #[serde(default)]
    pub better: f64,
    /// Value beyond which the target contributes twice its weight
    #[serde(default)]
    pub worse: f64,
}

/// The six multi-objective targets
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
pub struct Targets {
    /// Load-weighted LCOE including carbon ($/MWh)
    #[serde(default)]
    pub lcoe: Target,
    /// Load met (%)
    #[serde(default)]
    pub load_pct: Target,
    /// Surplus as a share of load (%)
    #[serde(default)]
    pub surplus_pct: Target,
    /// Renewable share (%)
    #[serde(default)]
    pub re_pct: Target,
    /// Total annual cost ($)
    #[serde(default)]
    pub cost: Target,
    /// Total annual emissions (tCO2e)
    #[serde(default)]
    pub co2: Target,
}

impl Targets {
    /// Iterate over target names and targets
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Target)> {
        [
            ("lcoe", &self.lcoe),
            ("load_pct", &self.load_pct),
            ("surplus_pct", &self.surplus_pct),
            ("re_pct", &self.re_pct),
            ("cost", &self.cost),
            ("co2", &self.co2),
        ]
        .into_iter()
    }
}

/// Settings for the genetic algorithm
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OptimisationParameters {
    /// Number of chromosomes in each generation
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Maximum number of generations
    #[serde(default = "default_generations")]
    pub generations: u32,
    /// Probability of each bit being flipped
    #[serde(default = "default_mutation_rate")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub mutation_rate: f64,
    /// Stop once the best score is unchanged for this many generations (zero disables)
    #[serde(default)]
    pub stop_if_stable: u32,
    /// How offspring are produced
    #[serde(default)]
    pub crossover: CrossoverKind,
    /// Which scores are minimised
    #[serde(default)]
    pub objective: Objective,
    /// Load met (%) below which the LCOE score is penalised
    #[serde(default)]
    pub target_load_pct: f64,
    /// Range used for facilities without an optimisation record
    #[serde(default)]
    pub default_range: Option<DefaultRange>,
    /// Seed for the random number generator
    #[serde(default)]
    pub seed: Option<u64>,
    /// Facilities whose capacity is varied (defaults to renewables followed by the dispatch order)
    #[serde(default)]
    pub order: Vec<String>,
    /// Multi-objective targets
    #[serde(default)]
    pub targets: Targets,
}

impl Default for OptimisationParameters {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            stop_if_stable: 0,
            crossover: CrossoverKind::default(),
            objective: Objective::default(),
            target_load_pct: 0.0,
            default_range: None,
            seed: None,
            order: Vec::new(),
            targets: Targets::default(),
        }
    }
}

/// Check that the year is a four-digit year
fn check_year(year: u32) -> Result<()> {
    ensure!((1000..=9999).contains(&year), "year must have four digits");

    Ok(())
}

/// Check that surplus is reported with a valid sign
fn check_surplus_sign(sign: i8) -> Result<()> {
    ensure!(sign == 1 || sign == -1, "surplus_sign must be 1 or -1");

    Ok(())
}

/// Check the carbon price against its upper bound
fn check_carbon_price(price: MoneyPerEmissions, price_max: MoneyPerEmissions) -> Result<()> {
    check_non_negative(price.value(), "carbon_price")?;
    check_non_negative(price_max.value(), "carbon_price_max")?;
    if price_max > MoneyPerEmissions(0.0) {
        ensure!(
            price <= price_max,
            "carbon_price ({price}) exceeds carbon_price_max ({price_max})"
        );
    }

    Ok(())
}

/// Check that no facility is named twice in the dispatch order
fn check_dispatch_order(order: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in order {
        ensure!(
            seen.insert(name.as_str()),
            "{name} appears more than once in dispatch_order"
        );
    }
    if order.is_empty() {
        warn!("dispatch_order is empty; only renewables will be dispatched");
    }

    Ok(())
}

impl OptimisationParameters {
    /// Validate the optimiser settings
    fn validate(&self) -> Result<()> {
        ensure!(
            self.population_size >= 2,
            "population_size must be at least 2"
        );
        ensure!(self.generations > 0, "generations cannot be zero");
        ensure!(
            (0.0..=100.0).contains(&self.target_load_pct),
            "target_load_pct must be between 0 and 100"
        );

        if let Some(range) = &self.default_range {
            ensure!(
                range.min_bound >= 0.0 && range.min_bound <= range.max_bound,
                "default_range must satisfy 0 <= min_bound <= max_bound"
            );
            ensure!(
                range.step_count > 0,
                "default_range step_count cannot be zero"
            );
        }

        for (name, target) in self.targets.iter() {
            ensure!(
                target.weight.is_finite() && target.weight >= 0.0,
                "Weight for target {name} must be a finite, non-negative number"
            );
        }

        Ok(())
    }
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_year(self.year)?;
        check_surplus_sign(self.surplus_sign)?;
        check_carbon_price(self.carbon_price, self.carbon_price_max)?;
        check_non_negative(self.discount_rate.value(), "discount_rate")?;
        check_dispatch_order(&self.dispatch_order)?;
        self.optimisation.validate()?;

        Ok(())
    }
}

#[cfg(test)]
impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            year: 2023,
            carbon_price: MoneyPerEmissions(0.0),
            carbon_price_max: MoneyPerEmissions(0.0),
            discount_rate: Dimensionless(0.05),
            surplus_sign: -1,
            reserve_committed: false,
            corrected_lcoe: false,
            adjusted_lcoe: false,
            remove_cost: false,
            optimise_total_re: false,
            dispatch_order: Vec::new(),
            optimisation: OptimisationParameters::default(),
        }
    }
}
