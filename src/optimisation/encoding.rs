//! Mapping between chromosomes and facility capacities.
//!
//! Each optimised facility owns a contiguous run of bits. A set bit adds its increment to the
//! facility's base capacity, so a facility's capacity is `base + Σ increment·bit`.
use crate::facility::{FacilityCategory, FacilityHandle, FacilityRegistry};
use crate::model::Model;
use crate::model::parameters::DefaultRange;
use crate::units::Capacity;
use anyhow::{Context, Result, bail, ensure};

/// Remainders smaller than this are not given a bit of their own
const REMAINDER_TOLERANCE: f64 = 1e-9;

/// How the optimiser may vary a facility's capacity
#[derive(PartialEq, Debug, Clone)]
pub enum Approach {
    /// Capacity is the sum of whichever of these increments are switched on
    Discrete(Vec<Capacity>),
    /// Capacity is `min` plus some number of `step`s, up to `max`
    Range {
        /// Smallest capacity
        min: Capacity,
        /// Largest capacity
        max: Capacity,
        /// Size of each step
        step: Capacity,
    },
    /// The capacity is not optimised
    Fixed,
}

impl Approach {
    /// Build a range approach from the model-wide default
    pub fn from_default_range(range: &DefaultRange) -> Self {
        let step = (range.max_bound - range.min_bound) / f64::from(range.step_count);
        Self::Range {
            min: Capacity(range.min_bound),
            max: Capacity(range.max_bound),
            step: Capacity(step),
        }
    }
}

/// The bits belonging to one facility
#[derive(PartialEq, Debug, Clone)]
pub struct Gene {
    /// The facility whose capacity the bits control
    pub handle: FacilityHandle,
    /// Capacity with every bit clear
    pub base: Capacity,
    /// Capacity added by each bit
    pub increments: Vec<Capacity>,
}

impl Gene {
    /// Create a gene for a facility from its approach, or `None` if the facility is fixed
    pub fn new(handle: FacilityHandle, approach: &Approach) -> Option<Self> {
        let (base, increments) = match approach {
            Approach::Fixed => return None,
            Approach::Discrete(capacities) => (Capacity(0.0), capacities.clone()),
            Approach::Range { min, max, step } => (*min, range_increments(*min, *max, *step)),
        };

        Some(Self {
            handle,
            base,
            increments,
        })
    }

    /// Number of bits
    pub fn len(&self) -> usize {
        self.increments.len()
    }

    /// Whether the gene has no bits
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }

    /// The capacity encoded by the given bits
    pub fn decode(&self, bits: &[bool]) -> Capacity {
        self.increments
            .iter()
            .zip(bits)
            .filter(|(_, bit)| **bit)
            .fold(self.base, |total, (increment, _)| total + *increment)
    }
}

/// Split a range into whole steps, plus an extra bit for any remainder
fn range_increments(min: Capacity, max: Capacity, step: Capacity) -> Vec<Capacity> {
    let span = (max - min).value();
    if span <= 0.0 || step.value() <= 0.0 {
        return Vec::new();
    }

    let steps = (span / step.value()).floor();
    let mut increments = vec![step; steps as usize];
    let remainder = span - steps * step.value();
    if remainder > REMAINDER_TOLERANCE {
        increments.push(Capacity(remainder));
    }

    increments
}

/// The layout of a chromosome
#[derive(PartialEq, Debug, Clone)]
pub struct Encoding {
    genes: Vec<Gene>,
}

impl Encoding {
    /// Lay out genes for the facilities the model optimises.
    ///
    /// The facilities are those in the optimisation order, or every renewable followed by the
    /// dispatch order if none is given. Each uses its optimisation record or, failing that, the
    /// model's default range.
    pub fn new(model: &Model) -> Result<Self> {
        let params = &model.parameters.optimisation;
        let handles = if params.order.is_empty() {
            default_order(model)
        } else {
            model
                .facilities
                .handles_for(params.order.iter().map(String::as_str))?
        };

        let mut genes = Vec::new();
        for handle in handles {
            let facility = model.facilities.get(handle);
            let default;
            let approach = match model.optimisation.get(&facility.id) {
                Some(approach) => approach,
                None => {
                    let range = params.default_range.as_ref().with_context(|| {
                        format!(
                            "No optimisation record for facility {} and no default_range given",
                            facility.id
                        )
                    })?;
                    default = Approach::from_default_range(range);
                    &default
                }
            };

            let Some(gene) = Gene::new(handle, approach) else {
                continue;
            };
            ensure!(
                facility.capacity > Capacity(0.0),
                "Cannot optimise facility {} as it has no base capacity",
                facility.id
            );
            genes.push(gene);
        }

        let encoding = Self { genes };
        if encoding.is_empty() {
            bail!("There are no facility capacities to optimise");
        }

        Ok(encoding)
    }

    /// Create an encoding directly from genes
    pub fn from_genes(genes: Vec<Gene>) -> Self {
        Self { genes }
    }

    /// The genes in chromosome order
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    /// Total number of bits in a chromosome
    pub fn len(&self) -> usize {
        self.genes.iter().map(Gene::len).sum()
    }

    /// Whether chromosomes have no bits
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The capacity of each optimised facility encoded by a chromosome
    pub fn decode(&self, chromosome: &[bool]) -> Vec<(FacilityHandle, Capacity)> {
        let mut offset = 0;
        self.genes
            .iter()
            .map(|gene| {
                let bits = &chromosome[offset..offset + gene.len()];
                offset += gene.len();
                (gene.handle, gene.decode(bits))
            })
            .collect()
    }

    /// Set facility multipliers so that their capacities match a chromosome
    pub fn apply(&self, chromosome: &[bool], facilities: &mut FacilityRegistry) -> Result<()> {
        for (handle, capacity) in self.decode(chromosome) {
            facilities.set_effective_capacity(handle, capacity)?;
        }

        Ok(())
    }
}

/// Every renewable followed by the dispatch order
fn default_order(model: &Model) -> Vec<FacilityHandle> {
    model
        .facilities
        .iter_category(FacilityCategory::Renewable)
        .map(|(handle, _)| handle)
        .chain(model.dispatch_order.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model};
    use crate::optimisation::Chromosome;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 100.0, 25.0, &[25.0, 25.0, 25.0, 25.0])]
    #[case(10.0, 100.0, 40.0, &[40.0, 40.0, 10.0])]
    #[case(50.0, 50.0, 10.0, &[])]
    fn test_range_increments(
        #[case] min: f64,
        #[case] max: f64,
        #[case] step: f64,
        #[case] expected: &[f64],
    ) {
        let increments = range_increments(Capacity(min), Capacity(max), Capacity(step));
        let values: Vec<f64> = increments.into_iter().map(Capacity::value).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_decode_discrete() {
        let encoding = Encoding::from_genes(vec![
            Gene::new(
                FacilityHandle(1),
                &Approach::Discrete(vec![Capacity(50.0), Capacity(100.0), Capacity(100.0)]),
            )
            .unwrap(),
            Gene::new(
                FacilityHandle(2),
                &Approach::Range {
                    min: Capacity(10.0),
                    max: Capacity(30.0),
                    step: Capacity(10.0),
                },
            )
            .unwrap(),
        ]);
        assert_eq!(encoding.len(), 5);

        // Every chromosome decodes to the sum of its switched-on increments
        for value in 0..(1u32 << 5) {
            let chromosome: Chromosome = (0..5).map(|bit| value & (1 << bit) != 0).collect();
            let decoded = encoding.decode(&chromosome);
            let expected_first: f64 = [50.0, 100.0, 100.0]
                .iter()
                .zip(&chromosome)
                .filter(|(_, bit)| **bit)
                .map(|(c, _)| c)
                .sum();
            let expected_second =
                10.0 + 10.0 * chromosome[3..].iter().filter(|bit| **bit).count() as f64;
            assert_eq!(decoded[0], (FacilityHandle(1), Capacity(expected_first)));
            assert_eq!(decoded[1], (FacilityHandle(2), Capacity(expected_second)));
        }
    }

    #[test]
    fn test_fixed_has_no_gene() {
        assert!(Gene::new(FacilityHandle(0), &Approach::Fixed).is_none());
    }

    #[rstest]
    fn test_encoding_new(mut model: Model) {
        let wind = model.facilities.handle("north.Wind").unwrap();
        let coal = model.facilities.handle("Coal").unwrap();
        model.parameters.optimisation.order = vec!["north.Wind".into(), "Coal".into()];
        model.optimisation.insert(
            "north.Wind".into(),
            Approach::Discrete(vec![Capacity(10.0), Capacity(20.0)]),
        );
        model.parameters.optimisation.default_range = Some(DefaultRange {
            min_bound: 0.0,
            max_bound: 300.0,
            step_count: 3,
        });

        let encoding = Encoding::new(&model).unwrap();
        assert_eq!(encoding.len(), 5);
        assert_eq!(encoding.genes()[0].handle, wind);
        assert_eq!(encoding.genes()[1].handle, coal);
        assert_eq!(encoding.genes()[1].increments, vec![Capacity(100.0); 3]);

        let chromosome = vec![true, false, true, true, false];
        encoding.apply(&chromosome, &mut model.facilities).unwrap();
        assert_approx_eq!(
            f64,
            model.facilities.get(coal).effective_capacity().value(),
            200.0
        );
    }

    #[rstest]
    fn test_encoding_no_record(mut model: Model) {
        model.parameters.optimisation.order = vec!["Coal".into()];
        assert_error!(
            Encoding::new(&model),
            "No optimisation record for facility Coal and no default_range given"
        );
    }

    #[rstest]
    fn test_encoding_all_fixed(mut model: Model) {
        model.parameters.optimisation.order = vec!["Coal".into()];
        model.optimisation.insert("Coal".into(), Approach::Fixed);
        assert_error!(
            Encoding::new(&model),
            "There are no facility capacities to optimise"
        );
    }
}
