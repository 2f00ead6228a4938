//! Scoring candidate fleets.
//!
//! Both scores are minimised. The LCOE score is the fleet's load-weighted LCOE including carbon,
//! penalised when too little load is met. The multi score sums a weighted deviation from each of
//! six targets.
use crate::dispatch::dispatch;
use crate::metrics::{Summary, summarise};
use crate::model::Model;
use crate::model::parameters::{Target, Targets};
use log::{debug, warn};

/// The scores of a candidate
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Scores {
    /// LCOE score (infinite if it could not be calculated)
    pub lcoe: f64,
    /// Multi-objective score
    pub multi: f64,
}

/// The values the multi-objective targets are measured against
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct TargetValues {
    /// Load-weighted LCOE including carbon
    pub lcoe: Option<f64>,
    /// Load met (%)
    pub load_pct: Option<f64>,
    /// Surplus as a share of load (%)
    pub surplus_pct: Option<f64>,
    /// Renewable share (%)
    pub re_pct: Option<f64>,
    /// Total annual cost excluding carbon
    pub cost: Option<f64>,
    /// Total annual emissions
    pub co2: Option<f64>,
}

impl TargetValues {
    /// Extract target values from a summary.
    ///
    /// `total_re` selects the renewable share of total load rather than of load met.
    pub fn from_summary(summary: &Summary, total_re: bool) -> Self {
        let analysis = &summary.analysis;
        let totals = &summary.totals;
        Self {
            lcoe: totals.lcoe_with_carbon.map(|lcoe| lcoe.value()),
            load_pct: analysis.load_met_pct,
            surplus_pct: analysis.surplus_pct,
            re_pct: if total_re {
                analysis.re_pct_of_load
            } else {
                analysis.re_pct
            },
            cost: Some(totals.annual_cost.value()),
            co2: Some(totals.emissions.value()),
        }
    }

    fn iter(&self) -> impl Iterator<Item = Option<f64>> {
        [
            self.lcoe,
            self.load_pct,
            self.surplus_pct,
            self.re_pct,
            self.cost,
            self.co2,
        ]
        .into_iter()
    }
}

/// Dispatch a model and score the result
pub fn score_model(model: &Model) -> Scores {
    let result = dispatch(model);
    let summary = summarise(model, &result);
    let params = &model.parameters;
    let values = TargetValues::from_summary(&summary, params.optimise_total_re);
    let scores = Scores {
        lcoe: lcoe_score(
            values.lcoe,
            values.load_pct,
            params.optimisation.target_load_pct,
        ),
        multi: multi_score(&params.optimisation.targets, &values),
    };
    debug!(
        "LCOE score {}, multi score {} (load met {:?}%)",
        scores.lcoe, scores.multi, values.load_pct
    );

    scores
}

/// Score LCOE, raising it to the power `target / actual` when load met falls short of the target.
///
/// Scores which can't be calculated or overflow are reported and treated as infinitely bad.
pub fn lcoe_score(lcoe: Option<f64>, load_met_pct: Option<f64>, target_load_pct: f64) -> f64 {
    let Some(lcoe) = lcoe else {
        return f64::INFINITY;
    };

    let load_met_pct = load_met_pct.unwrap_or_default();
    let score = if load_met_pct < target_load_pct {
        if load_met_pct <= 0.0 {
            f64::INFINITY
        } else {
            lcoe.powf(target_load_pct / load_met_pct)
        }
    } else {
        lcoe
    };

    if score.is_finite() {
        score
    } else {
        warn!("LCOE score overflowed (LCOE {lcoe}, load met {load_met_pct}%); skipping");
        f64::INFINITY
    }
}

/// Score one target, from zero when it is met to twice its weight when badly missed
#[allow(clippy::float_cmp)]
pub fn target_score(target: &Target, value: Option<f64>) -> f64 {
    let weight = target.weight;
    if weight == 0.0 {
        return 0.0;
    }

    let Some(value) = value.filter(|value| value.is_finite() && *value >= 0.0) else {
        return 2.0 * weight;
    };

    let (better, worse) = (target.better, target.worse);
    if better == worse {
        return if value == better { 0.0 } else { weight };
    }

    let higher_is_better = better > worse;
    let met = if higher_is_better {
        value >= better
    } else {
        value <= better
    };
    let missed = if higher_is_better {
        value < worse
    } else {
        value > worse
    };

    if met {
        0.0
    } else if missed {
        2.0 * weight
    } else {
        weight * (better - value) / (better - worse)
    }
}

/// Sum the scores of all six targets
pub fn multi_score(targets: &Targets, values: &TargetValues) -> f64 {
    targets
        .iter()
        .zip(values.iter())
        .map(|((_, target), value)| target_score(target, value))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn target(weight: f64, better: f64, worse: f64) -> Target {
        Target {
            weight,
            better,
            worse,
        }
    }

    #[rstest]
    #[case(Some(50.0), Some(100.0), 90.0, 50.0)]
    #[case(Some(50.0), Some(90.0), 90.0, 50.0)]
    #[case(Some(50.0), Some(50.0), 100.0, 2500.0)] // squared
    #[case(None, Some(100.0), 0.0, f64::INFINITY)]
    #[case(Some(50.0), Some(0.0), 100.0, f64::INFINITY)]
    #[case(Some(1e300), Some(1.0), 100.0, f64::INFINITY)] // overflow
    fn test_lcoe_score(
        #[case] lcoe: Option<f64>,
        #[case] load_met_pct: Option<f64>,
        #[case] target: f64,
        #[case] expected: f64,
    ) {
        let score = lcoe_score(lcoe, load_met_pct, target);
        if expected.is_finite() {
            assert_approx_eq!(f64, score, expected, epsilon = 1e-9);
        } else {
            assert_eq!(score, expected);
        }
    }

    #[rstest]
    #[case(target(0.0, 100.0, 50.0), Some(10.0), 0.0)] // unweighted
    #[case(target(1.0, 100.0, 50.0), Some(100.0), 0.0)] // higher is better, met
    #[case(target(1.0, 100.0, 50.0), Some(40.0), 2.0)] // higher is better, missed
    #[case(target(1.0, 100.0, 50.0), Some(75.0), 0.5)] // interpolated
    #[case(target(2.0, 50.0, 150.0), Some(50.0), 0.0)] // lower is better, met
    #[case(target(2.0, 50.0, 150.0), Some(200.0), 4.0)] // lower is better, missed
    #[case(target(2.0, 50.0, 150.0), Some(75.0), 0.5)] // interpolated
    #[case(target(1.0, 20.0, 20.0), Some(20.0), 0.0)] // equal
    #[case(target(1.0, 20.0, 20.0), Some(21.0), 1.0)]
    #[case(target(1.0, 100.0, 50.0), None, 2.0)] // unknown
    #[case(target(1.0, 100.0, 50.0), Some(-1.0), 2.0)]
    fn test_target_score(#[case] target: Target, #[case] value: Option<f64>, #[case] expected: f64) {
        assert_approx_eq!(f64, target_score(&target, value), expected);
    }

    #[test]
    fn test_multi_score() {
        let targets = Targets {
            lcoe: target(1.0, 50.0, 150.0),
            load_pct: target(1.0, 100.0, 80.0),
            ..Targets::default()
        };
        let values = TargetValues {
            lcoe: Some(100.0),
            load_pct: Some(70.0),
            ..TargetValues::default()
        };
        // 0.5 for LCOE, 2 for load met, nothing for unweighted targets
        assert_approx_eq!(f64, multi_score(&targets, &values), 2.5);
    }

    #[rstest]
    fn test_score_model(mut model: Model) {
        model.parameters.optimisation.target_load_pct = 0.0;
        model.parameters.optimisation.targets.load_pct = target(1.0, 100.0, 50.0);

        let summary = summarise(&model, &dispatch(&model));
        let scores = score_model(&model);
        let lcoe = summary.totals.lcoe_with_carbon.map(|lcoe| lcoe.value());
        assert_eq!(scores.lcoe, lcoe.unwrap_or(f64::INFINITY));

        let load_met_pct = summary.analysis.load_met_pct.unwrap();
        let expected = target_score(&target(1.0, 100.0, 50.0), Some(load_met_pct));
        assert_approx_eq!(f64, scores.multi, expected);
    }
}
