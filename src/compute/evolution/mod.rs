//! Evolutionary and exhaustive search for genotypes matching a reference.
//!
//! # Overview
//!
//! - **Genotype Operations** (`genome`): Random generation, crossover, and mutation
//! - **Genetic Algorithm** (`search`): Elitism, random immigrants, local search
//!   around the best-ever individual, and stagnation-triggered strong mutation
//! - **Exhaustive Search** (`exhaustive`): Odometer enumeration of a bounded
//!   region with a top-N ranking
//!
//! # Example
//!
//! ```rust,no_run
//! use biomorph_search::compute::{
//!     Biomorph, Reference, render_binary, evolution::EvolutionEngine,
//! };
//! use biomorph_search::schema::{Genotype, Mode, SearchConfig};
//!
//! let config = SearchConfig::default();
//! let target = Genotype::from(vec![1, 2, 0, 2, -1, 1, 0, 1, 5]);
//! let reference = render_binary(&Biomorph, &target, Mode(1), &config.render);
//!
//! let mut engine = EvolutionEngine::new(Reference::Binary(reference), config)?;
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         progress.generation, progress.best.fitness);
//! });
//! println!("Found {} with score {:.3}", result.genotype, result.score);
//! # Ok::<(), biomorph_search::schema::ConfigError>(())
//! ```

mod exhaustive;
mod genome;
mod search;

pub use exhaustive::{
    ExhaustiveSearch, GenotypeOdometer, PROGRESS_INTERVAL, TopN, brute_force,
};
pub use genome::{GenomeRng, MutationStrength, genotype_distance};
pub use search::{
    CancelToken, EvolutionEngine, LOCAL_SEARCH_NEIGHBOURS, STAGNANT_IMMIGRANT_RATE,
    STAGNATION_THRESHOLD, TOURNAMENT_SIZE, YIELD_INTERVAL,
};
