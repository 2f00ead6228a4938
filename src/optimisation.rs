//! The capacity optimiser: a genetic search over facility capacities.
//!
//! Each chromosome is decoded into capacities for the facilities being optimised, the fleet is
//! dispatched and the result scored. The search itself lives in [`genetic`] and is independent of
//! the model, so this module only wires the two together and reports progress.
use crate::facility::FacilityID;
use crate::model::Model;
use crate::units::Capacity;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

pub mod encoding;
pub mod fitness;
pub mod genetic;
use encoding::{Approach, Encoding};
use fitness::{Scores, score_model};
pub use genetic::GenerationReport;
use genetic::{Candidate, search};

/// A bit string encoding the capacities of the optimised facilities
pub type Chromosome = Vec<bool>;

/// How each facility's capacity may be varied, keyed by facility
pub type OptimisationRecordMap = IndexMap<FacilityID, Approach>;

/// Receives progress as the optimiser runs
pub trait ProgressSink {
    /// Called once each generation has been evaluated
    fn generation(&mut self, report: &GenerationReport);
}

/// Reports progress through the logger
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn generation(&mut self, report: &GenerationReport) {
        info!(
            "Generation {}: best LCOE score {:.4}, best multi score {:.4}",
            report.generation, report.best_lcoe, report.best_multi
        );
    }
}

impl<F: FnMut(&GenerationReport)> ProgressSink for F {
    fn generation(&mut self, report: &GenerationReport) {
        self(report);
    }
}

/// A candidate fleet
#[derive(PartialEq, Debug, Clone)]
pub struct Solution {
    /// The chromosome it was decoded from
    pub chromosome: Chromosome,
    /// What it scored
    pub scores: Scores,
    /// Capacity of each optimised facility
    pub capacities: Vec<(FacilityID, Capacity)>,
}

/// The outcome of an optimisation run
#[derive(PartialEq, Debug, Clone)]
pub struct OptimisationResult {
    /// The fleet with the lowest LCOE score
    pub best_lcoe: Option<Solution>,
    /// The fleet with the lowest multi score
    pub best_multi: Option<Solution>,
    /// The best multi fleet of each generation, ranked by multi score
    pub ranked_multi: Vec<Solution>,
    /// Progress by generation
    pub history: Vec<GenerationReport>,
    /// Number of generations which were fully evaluated
    pub generations_run: u32,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// The seed the search was run with
    pub seed: u64,
}

impl OptimisationResult {
    /// A copy of the model with the facilities sized as in `solution`
    pub fn apply(&self, model: &Model, solution: &Solution) -> Result<Model> {
        let mut model = model.clone();
        for (id, capacity) in &solution.capacities {
            let handle = model
                .facilities
                .handle(&id.0)
                .with_context(|| format!("Unknown facility {id}"))?;
            model.facilities.set_effective_capacity(handle, *capacity)?;
        }

        Ok(model)
    }
}

/// Search for the capacities which best meet the model's objective.
///
/// `cancel` may be set at any time, e.g. from another thread. The generation in progress is then
/// abandoned and the best fleets found so far are returned.
pub fn optimise(
    model: &Model,
    cancel: &AtomicBool,
    sink: &mut dyn ProgressSink,
) -> Result<OptimisationResult> {
    let encoding = Encoding::new(model)?;
    let params = &model.parameters.optimisation;
    let seed = params.seed.unwrap_or_else(rand::random);
    info!(
        "Optimising {} facilities with {} bits per chromosome (seed {seed})",
        encoding.genes().len(),
        encoding.len()
    );

    let mut candidate_model = model.clone();
    let mut cache: HashMap<Chromosome, Scores> = HashMap::new();
    let evaluate = |chromosome: &[bool]| -> Result<Scores> {
        if let Some(scores) = cache.get(chromosome) {
            return Ok(*scores);
        }

        encoding.apply(chromosome, &mut candidate_model.facilities)?;
        let scores = score_model(&candidate_model);
        cache.insert(chromosome.to_vec(), scores);
        Ok(scores)
    };

    let found = search(params, encoding.len(), seed, cancel, evaluate, |report| {
        sink.generation(report);
    })?;
    if found.cancelled {
        info!(
            "Optimisation cancelled after {} generations",
            found.generations_run()
        );
    }

    let solution = |candidate: Candidate| -> Solution {
        let capacities = encoding
            .decode(&candidate.chromosome)
            .into_iter()
            .map(|(handle, capacity)| (model.facilities.get(handle).id.clone(), capacity))
            .collect();
        Solution {
            chromosome: candidate.chromosome,
            scores: candidate.scores,
            capacities,
        }
    };

    let generations_run = found.generations_run();
    Ok(OptimisationResult {
        best_lcoe: found.best_lcoe.map(solution),
        best_multi: found.best_multi.map(solution),
        ranked_multi: found.ranked_multi.into_iter().map(solution).collect(),
        history: found.history,
        generations_run,
        cancelled: found.cancelled,
        seed,
    })
}
