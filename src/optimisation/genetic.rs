//! A seedable genetic algorithm over bit-string chromosomes.
//!
//! The kernel knows nothing about facilities or dispatch: candidates are scored by a caller-supplied
//! closure, so the same seed and scores always give the same search.
use super::Chromosome;
use super::fitness::Scores;
use crate::model::parameters::{CrossoverKind, Objective, OptimisationParameters};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};

/// A chromosome together with its scores
#[derive(PartialEq, Debug, Clone)]
pub struct Candidate {
    /// The bits
    pub chromosome: Chromosome,
    /// What the bits scored
    pub scores: Scores,
}

/// Progress at the end of one generation
#[derive(PartialEq, Debug, Clone)]
pub struct GenerationReport {
    /// Generation number, starting from one
    pub generation: u32,
    /// Best LCOE score in this generation
    pub best_lcoe: f64,
    /// Mean of the finite LCOE scores in this generation
    pub mean_lcoe: Option<f64>,
    /// Best multi score in this generation
    pub best_multi: f64,
    /// Mean of the finite multi scores in this generation
    pub mean_multi: Option<f64>,
}

/// The outcome of a search
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SearchResult {
    /// Candidate with the lowest LCOE score seen
    pub best_lcoe: Option<Candidate>,
    /// Candidate with the lowest multi score seen
    pub best_multi: Option<Candidate>,
    /// The best multi candidate of each generation, de-duplicated and ranked by multi score
    pub ranked_multi: Vec<Candidate>,
    /// One report per completed generation
    pub history: Vec<GenerationReport>,
    /// Whether the search was cancelled before it finished
    pub cancelled: bool,
}

impl SearchResult {
    /// Number of generations which were fully evaluated
    pub fn generations_run(&self) -> u32 {
        self.history.len() as u32
    }
}

/// Search for the best chromosome of the given length.
///
/// `cancel` is checked before every evaluation. If it is set, the partly evaluated generation is
/// discarded and the best of the completed generations is returned.
pub fn search<E, P>(
    params: &OptimisationParameters,
    length: usize,
    seed: u64,
    cancel: &AtomicBool,
    mut evaluate: E,
    mut on_generation: P,
) -> Result<SearchResult>
where
    E: FnMut(&[bool]) -> Result<Scores>,
    P: FnMut(&GenerationReport),
{
    let mut rng = StdRng::seed_from_u64(seed);
    let objective = params.objective;
    let mut result = SearchResult::default();
    let mut population = initial_population(length, params.population_size, &mut rng);
    let mut stable_for = 0;

    for generation in 1..=params.generations {
        let mut evaluated = Vec::with_capacity(population.len());
        for chromosome in population {
            if cancel.load(Ordering::Relaxed) {
                result.cancelled = true;
                break;
            }

            let scores = evaluate(&chromosome)?;
            evaluated.push(Candidate { chromosome, scores });
        }
        if result.cancelled {
            break;
        }

        let improved = record_generation(&mut result, &evaluated, objective);
        let report = generation_report(generation, &evaluated);
        on_generation(&report);
        result.history.push(report);

        stable_for = if improved { 0 } else { stable_for + 1 };
        if generation == params.generations
            || (params.stop_if_stable > 0 && stable_for >= params.stop_if_stable)
        {
            break;
        }

        population = breed(&evaluated, params, &mut rng);
    }

    result
        .ranked_multi
        .sort_by(|a, b| a.scores.multi.total_cmp(&b.scores.multi));

    Ok(result)
}

/// Update the overall bests with a generation. Returns whether any objective in use improved.
fn record_generation(
    result: &mut SearchResult,
    evaluated: &[Candidate],
    objective: Objective,
) -> bool {
    let mut improved = false;
    if let Some(best) = best_by(evaluated, |scores| scores.lcoe) {
        if is_better(best, result.best_lcoe.as_ref(), |scores| scores.lcoe) {
            result.best_lcoe = Some(best.clone());
            improved |= objective.uses_lcoe();
        }
    }

    if let Some(best) = best_by(evaluated, |scores| scores.multi) {
        if is_better(best, result.best_multi.as_ref(), |scores| scores.multi) {
            result.best_multi = Some(best.clone());
            improved |= objective.uses_multi();
        }

        if !result
            .ranked_multi
            .iter()
            .any(|candidate| candidate.chromosome == best.chromosome)
        {
            result.ranked_multi.push(best.clone());
        }
    }

    improved
}

fn is_better<F>(candidate: &Candidate, current: Option<&Candidate>, score: F) -> bool
where
    F: Fn(&Scores) -> f64,
{
    current.is_none_or(|current| score(&candidate.scores) < score(&current.scores))
}

/// The first candidate with the lowest score
fn best_by<F>(candidates: &[Candidate], score: F) -> Option<&Candidate>
where
    F: Fn(&Scores) -> f64,
{
    candidates.iter().reduce(|best, candidate| {
        if score(&candidate.scores) < score(&best.scores) {
            candidate
        } else {
            best
        }
    })
}

fn generation_report(generation: u32, evaluated: &[Candidate]) -> GenerationReport {
    let best = |score: fn(&Scores) -> f64| {
        evaluated
            .iter()
            .map(|candidate| score(&candidate.scores))
            .fold(f64::INFINITY, f64::min)
    };
    let mean = |score: fn(&Scores) -> f64| {
        let finite: Vec<f64> = evaluated
            .iter()
            .map(|candidate| score(&candidate.scores))
            .filter(|value| value.is_finite())
            .collect();
        (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64)
    };

    GenerationReport {
        generation,
        best_lcoe: best(|scores| scores.lcoe),
        mean_lcoe: mean(|scores| scores.lcoe),
        best_multi: best(|scores| scores.multi),
        mean_multi: mean(|scores| scores.multi),
    }
}

/// Seed the first generation.
///
/// If every possible chromosome fits in the population they are all included, so small searches
/// are exhaustive. Remaining rows have between one and `length` bits set, in random positions.
pub fn initial_population(length: usize, size: usize, rng: &mut StdRng) -> Vec<Chromosome> {
    let mut population = Vec::with_capacity(size);
    if length < usize::BITS as usize && (1usize << length) <= size {
        population.extend(
            (0..1usize << length).map(|value| (0..length).map(|bit| value & (1 << bit) != 0).collect()),
        );
    }

    while population.len() < size {
        population.push(random_chromosome(length, rng));
    }

    population
}

fn random_chromosome(length: usize, rng: &mut StdRng) -> Chromosome {
    if length == 0 {
        return Chromosome::new();
    }

    let ones = rng.random_range(1..=length);
    let mut chromosome = vec![true; ones];
    chromosome.resize(length, false);
    chromosome.shuffle(rng);
    chromosome
}

/// Produce the next generation: elites carried over unchanged, then mutated offspring
fn breed(
    evaluated: &[Candidate],
    params: &OptimisationParameters,
    rng: &mut StdRng,
) -> Vec<Chromosome> {
    let size = params.population_size;
    let mut next = elites(evaluated, params.objective);
    next.truncate(size);

    while next.len() < size {
        let first = tournament(evaluated, params.objective, rng);
        let second = tournament(evaluated, params.objective, rng);
        let (mut child1, mut child2) =
            crossover(&first.chromosome, &second.chromosome, params.crossover, rng);

        mutate(&mut child1, params.mutation_rate, rng);
        next.push(child1);
        if next.len() < size {
            mutate(&mut child2, params.mutation_rate, rng);
            next.push(child2);
        }
    }

    next
}

/// The best chromosome for each objective in use
fn elites(evaluated: &[Candidate], objective: Objective) -> Vec<Chromosome> {
    let mut elites: Vec<Chromosome> = Vec::new();
    let bests = [
        (objective.uses_lcoe(), best_by(evaluated, |scores| scores.lcoe)),
        (objective.uses_multi(), best_by(evaluated, |scores| scores.multi)),
    ];
    for (used, best) in bests {
        if let Some(best) = best.filter(|_| used) {
            if !elites.contains(&best.chromosome) {
                elites.push(best.chromosome.clone());
            }
        }
    }

    elites
}

/// Whether `challenger` beats `holder` for the given objective.
///
/// With both objectives each score is min-max normalised across the pair and the sums compared.
fn beats(challenger: &Scores, holder: &Scores, objective: Objective) -> bool {
    match objective {
        Objective::Lcoe => challenger.lcoe < holder.lcoe,
        Objective::Multi => challenger.multi < holder.multi,
        Objective::Both => {
            // Across two values min-max normalisation gives 0 for the smaller and 1 for the larger
            let normalised = |value: f64, other: f64| if value > other { 1.0 } else { 0.0 };
            let challenger_sum = normalised(challenger.lcoe, holder.lcoe)
                + normalised(challenger.multi, holder.multi);
            let holder_sum =
                normalised(holder.lcoe, challenger.lcoe) + normalised(holder.multi, challenger.multi);
            challenger_sum < holder_sum
        }
    }
}

/// Draw two candidates at random and keep the fitter. Ties go to the first drawn.
fn tournament<'a>(evaluated: &'a [Candidate], objective: Objective, rng: &mut StdRng) -> &'a Candidate {
    let first = &evaluated[rng.random_range(0..evaluated.len())];
    let second = &evaluated[rng.random_range(0..evaluated.len())];
    if beats(&second.scores, &first.scores, objective) {
        second
    } else {
        first
    }
}

/// Splice two parents into two children.
///
/// Chromosomes too short for the requested kind fall back to one-point crossover, or to copies of
/// the parents if they have fewer than two bits.
fn crossover(
    first: &[bool],
    second: &[bool],
    kind: CrossoverKind,
    rng: &mut StdRng,
) -> (Chromosome, Chromosome) {
    let length = first.len();
    let (start, end) = match kind {
        CrossoverKind::TwoPoint if length >= 4 => {
            let start = rng.random_range(1..=length - 2);
            let mut end = rng.random_range(1..length - 2);
            if end >= start {
                end += 1;
            }
            (start.min(end), start.max(end))
        }
        _ if length >= 2 => (rng.random_range(1..length), length),
        _ => return (first.to_vec(), second.to_vec()),
    };

    let splice = |outer: &[bool], inner: &[bool]| -> Chromosome {
        outer[..start]
            .iter()
            .chain(&inner[start..end])
            .chain(&outer[end..])
            .copied()
            .collect()
    };

    (splice(first, second), splice(second, first))
}

/// Flip each bit with the given probability
fn mutate(chromosome: &mut [bool], rate: f64, rng: &mut StdRng) {
    for bit in chromosome {
        if rng.random_bool(rate) {
            *bit = !*bit;
        }
    }
}
