//! Progress reporting and result types for searches.

use serde::{Deserialize, Serialize};

use super::{Genotype, Individual, Mode, ScoredGenotype};

/// Lifecycle of an evolution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnginePhase {
    /// Building and scoring the initial population.
    #[default]
    Initializing,
    /// Scoring newly created individuals.
    Evaluating,
    /// Ranking the population and breeding the next one.
    Selecting,
    /// Run finished; the best individual is final.
    Terminated,
}

/// Snapshot handed to the progress callback after each generation.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionProgress<'a> {
    /// Zero-based generation index.
    pub generation: usize,
    /// Best individual seen so far.
    pub best: &'a Individual,
    /// Current population sorted by descending fitness.
    pub population: &'a [Individual],
    /// Consecutive generations without improvement.
    pub stagnant_generations: usize,
}

/// Snapshot handed to the progress callback during exhaustive search.
#[derive(Debug, Clone, Copy)]
pub struct BruteForceProgress<'a> {
    /// Genotypes scored so far.
    pub checked: u64,
    /// Size of the enumerated space.
    pub total: u64,
    /// Highest-scoring entry so far.
    pub best: Option<&'a ScoredGenotype>,
}

/// Reason a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Ran every configured generation / enumerated every genotype.
    Completed,
    /// Cancel token was set.
    Cancelled,
}

/// Statistics from a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Generations executed after the initial population.
    pub generations: usize,
    /// Individuals rendered and scored.
    pub evaluations: u64,
    /// Wall-clock time in seconds.
    pub elapsed_seconds: f64,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

/// Outcome of an evolutionary search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Best genotype found.
    pub genotype: Genotype,
    /// Its similarity to the reference.
    pub score: f32,
    /// Mode the genotype belongs to.
    pub mode: Mode,
    pub stats: SearchStats,
}

/// Outcome of an exhaustive search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceResult {
    /// Ranking, best first.
    pub top: Vec<ScoredGenotype>,
    /// Genotypes scored.
    pub checked: u64,
    /// Size of the enumerated space.
    pub total: u64,
    pub stop_reason: StopReason,
}
