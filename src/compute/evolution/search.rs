//! Genetic algorithm that searches for a genotype matching a reference raster.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{Level, debug, info, log_enabled, trace};
use rayon::prelude::*;

use crate::compute::shape::{Biomorph, ModeTable, ShapeGenerator};
use crate::compute::similarity::{Reference, Scorer};
use crate::schema::{
    ConfigError, EnginePhase, EvolutionProgress, Genotype, Individual, ModeBounds, SearchConfig,
    SearchResult, SearchStats, StopReason, sort_by_fitness,
};

use super::genome::{GenomeRng, MutationStrength, genotype_distance};

/// Generations without improvement after which the search counts as stagnant.
pub const STAGNATION_THRESHOLD: usize = 20;

/// Immigrant fraction used while stagnant.
pub const STAGNANT_IMMIGRANT_RATE: f32 = 0.3;

/// Mutated copies of the best-ever individual added each generation.
pub const LOCAL_SEARCH_NEIGHBOURS: usize = 5;

/// Candidates drawn per tournament.
pub const TOURNAMENT_SIZE: usize = 3;

/// Generations between cooperative yield points.
pub const YIELD_INTERVAL: usize = 10;

/// Shared flag that asks a running search to stop at its next yield point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine<G = Biomorph> {
    config: SearchConfig,
    bounds: ModeBounds,
    generator: G,
    scorer: Scorer,
    rng: GenomeRng,
    population: Vec<Individual>,
    best: Individual,
    stagnant_generations: usize,
    generation: usize,
    evaluations: u64,
    phase: EnginePhase,
    cancel: CancelToken,
}

impl EvolutionEngine<Biomorph> {
    /// Create an engine using the built-in biomorph generator.
    pub fn new(reference: Reference, config: SearchConfig) -> Result<Self, ConfigError> {
        Self::with_generator(reference, config, Biomorph)
    }
}

impl<G> EvolutionEngine<G>
where
    G: ShapeGenerator + ModeTable + Sync,
{
    /// Create an engine with a custom shape generator and mode table.
    ///
    /// Fails if the configuration is inconsistent, the mode is unknown or its
    /// bounds are malformed, or the reference does not match the configured
    /// scoring mode and side length.
    pub fn with_generator(
        reference: Reference,
        config: SearchConfig,
        generator: G,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let bounds = generator
            .bounds(config.mode)
            .ok_or(ConfigError::UnknownMode(config.mode))?;
        bounds.validate()?;

        if reference.scoring_mode() != config.scoring {
            return Err(ConfigError::ReferenceMismatch {
                expected: config.scoring,
                actual: reference.scoring_mode(),
            });
        }
        if reference.side() != config.render.side_length {
            return Err(ConfigError::ReferenceSize {
                expected: config.render.side_length,
                actual: reference.side(),
            });
        }

        let rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let best = Individual {
            genotype: Genotype::new(bounds.min.clone()),
            fitness: f32::NEG_INFINITY,
        };

        Ok(Self {
            config,
            bounds,
            generator,
            scorer: Scorer::new(reference),
            rng,
            population: Vec::new(),
            best,
            stagnant_generations: 0,
            generation: 0,
            evaluations: 0,
            phase: EnginePhase::Initializing,
            cancel: CancelToken::new(),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Current population, sorted by descending fitness.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Best individual seen so far.
    pub fn best(&self) -> &Individual {
        &self.best
    }

    /// Generations completed.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Consecutive generations without improvement.
    pub fn stagnant_generations(&self) -> usize {
        self.stagnant_generations
    }

    /// Bounds of the configured mode.
    pub fn bounds(&self) -> &ModeBounds {
        &self.bounds
    }

    /// Build and score the initial population.
    pub fn initialize(&mut self) {
        self.phase = EnginePhase::Initializing;
        self.generation = 0;
        self.stagnant_generations = 0;
        self.evaluations = 0;

        let mut population: Vec<Individual> = (0..self.config.population_size)
            .map(|_| Individual::new(self.rng.random_interesting(&self.bounds)))
            .collect();

        self.phase = EnginePhase::Evaluating;
        self.evaluate_batch(&mut population);
        sort_by_fitness(&mut population);

        self.best = population[0].clone();
        self.population = population;
        debug!(
            "initial population of {}: best {:.4} {}",
            self.population.len(),
            self.best.fitness,
            self.best.genotype
        );
    }

    /// Score a batch of individuals in parallel.
    fn evaluate_batch(&mut self, batch: &mut [Individual]) {
        let scorer = &self.scorer;
        let generator = &self.generator;
        let mode = self.config.mode;
        let render = &self.config.render;

        batch.par_iter_mut().for_each(|individual| {
            individual.fitness = scorer.score(generator, &individual.genotype, mode, render);
        });
        self.evaluations += batch.len() as u64;
    }

    /// Mean number of genes by which the population differs from its best member.
    pub fn diversity(&self) -> f32 {
        let Some(best) = self.population.first() else {
            return 0.0;
        };
        let total: usize = self
            .population
            .iter()
            .map(|individual| genotype_distance(&best.genotype, &individual.genotype))
            .sum();
        total as f32 / self.population.len() as f32
    }

    /// Run one generation: breed, score, rank, and update the best-ever.
    ///
    /// Builds the initial population first if [`initialize`](Self::initialize)
    /// has not run yet.
    pub fn step_generation(&mut self) {
        if self.population.is_empty() {
            self.initialize();
        }

        let size = self.config.population_size;
        let stagnant = self.stagnant_generations > STAGNATION_THRESHOLD;

        self.phase = EnginePhase::Selecting;
        let mut next = Vec::with_capacity(size);

        // Elitism
        next.extend(
            self.population
                .iter()
                .take(self.config.elite_count)
                .cloned(),
        );
        let fresh = next.len();

        // Random immigrants
        let rate = if stagnant {
            STAGNANT_IMMIGRANT_RATE
        } else {
            self.config.immigrant_rate
        };
        let immigrants = ((size as f32 * rate).floor() as usize).min(size - next.len());
        for _ in 0..immigrants {
            next.push(Individual::new(self.rng.random_interesting(&self.bounds)));
        }

        // Local search around the best-ever
        let neighbours = LOCAL_SEARCH_NEIGHBOURS.min(size - next.len());
        for _ in 0..neighbours {
            let genotype = self.rng.mutate_strong(&self.best.genotype, &self.bounds);
            next.push(Individual::new(genotype));
        }

        // Offspring
        let strength = if stagnant {
            MutationStrength::Strong
        } else {
            MutationStrength::Single
        };
        while next.len() < size {
            let parent1 = self.tournament();
            let parent2 = self.tournament();
            let mut child = self.rng.crossover(
                &self.population[parent1].genotype,
                &self.population[parent2].genotype,
            );
            if self.rng.chance(self.config.mutation_rate) {
                child = self.rng.mutate_with(&child, &self.bounds, strength);
            }
            next.push(Individual::new(child));
        }

        self.phase = EnginePhase::Evaluating;
        self.evaluate_batch(&mut next[fresh..]);
        sort_by_fitness(&mut next);
        self.population = next;
        self.generation += 1;

        let generation_best = &self.population[0];
        if generation_best.fitness > self.best.fitness {
            debug!(
                "generation {}: best {:.4} -> {:.4} {}",
                self.generation,
                self.best.fitness,
                generation_best.fitness,
                generation_best.genotype
            );
            self.best = generation_best.clone();
            self.stagnant_generations = 0;
        } else {
            self.stagnant_generations += 1;
            if self.stagnant_generations == STAGNATION_THRESHOLD + 1 {
                debug!(
                    "generation {}: stagnant, widening mutation and immigration",
                    self.generation
                );
            }
        }
        if log_enabled!(Level::Trace) {
            trace!(
                "generation {}: top {:.4}, stagnant {}, diversity {:.2}",
                self.generation,
                self.population[0].fitness,
                self.stagnant_generations,
                self.diversity()
            );
        }
    }

    /// Tournament selection over the current population.
    fn tournament(&mut self) -> usize {
        let mut best_idx = self.rng.index(self.population.len());
        for _ in 1..TOURNAMENT_SIZE {
            let idx = self.rng.index(self.population.len());
            if self.population[idx].fitness > self.population[best_idx].fitness {
                best_idx = idx;
            }
        }
        best_idx
    }

    /// Run evolution with progress callback.
    ///
    /// The callback sees every generation's sorted population. The cancel
    /// token is checked every [`YIELD_INTERVAL`] generations, where the thread
    /// also yields to the scheduler.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> SearchResult
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();
        info!(
            "evolution start: {}, population {}, generations {}, scoring {:?}",
            self.config.mode,
            self.config.population_size,
            self.config.generations,
            self.config.scoring
        );

        self.initialize();

        let mut stop_reason = StopReason::Completed;
        for generation in 0..self.config.generations {
            self.step_generation();

            callback(&EvolutionProgress {
                generation,
                best: &self.best,
                population: &self.population,
                stagnant_generations: self.stagnant_generations,
            });

            if (generation + 1) % YIELD_INTERVAL == 0 {
                if self.cancel.is_cancelled() {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
                std::thread::yield_now();
            }
        }

        self.phase = EnginePhase::Terminated;
        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "evolution {:?} after {} generations: best {:.4} {} ({:.2}s)",
            stop_reason, self.generation, self.best.fitness, self.best.genotype, elapsed
        );

        SearchResult {
            genotype: self.best.genotype.clone(),
            score: self.best.fitness,
            mode: self.config.mode,
            stats: SearchStats {
                generations: self.generation,
                evaluations: self.evaluations,
                elapsed_seconds: elapsed,
                stop_reason,
            },
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> SearchResult {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::render_binary;
    use crate::schema::{Mode, RenderConfig, ScoringMode};

    fn target() -> Genotype {
        Genotype::from(vec![1, 2, 0, 2, -1, 1, 0, 1, 4])
    }

    fn test_config(generations: usize) -> SearchConfig {
        SearchConfig {
            render: RenderConfig::with_side_length(32),
            population_size: 12,
            generations,
            elite_count: 2,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn reference(config: &SearchConfig) -> Reference {
        Reference::Binary(render_binary(&Biomorph, &target(), Mode(1), &config.render))
    }

    #[test]
    fn test_evolution_engine_creation() {
        let config = test_config(5);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        assert_eq!(engine.phase(), EnginePhase::Initializing);

        engine.initialize();
        assert_eq!(engine.population().len(), 12);
        assert!(
            engine
                .population()
                .windows(2)
                .all(|w| w[0].fitness >= w[1].fitness)
        );
        assert_eq!(engine.best(), &engine.population()[0]);
    }

    #[test]
    fn test_evolution_run() {
        let config = test_config(12);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        let result = engine.run();

        assert_eq!(result.stats.generations, 12);
        assert_eq!(result.stats.stop_reason, StopReason::Completed);
        assert_eq!(result.mode, Mode(1));
        assert_eq!(result.stats.evaluations, 12 + 12 * 10);
        assert!((0.0..=1.0).contains(&result.score));
        assert_eq!(engine.phase(), EnginePhase::Terminated);
    }

    #[test]
    fn test_zero_generations_returns_initial_best() {
        let config = test_config(0);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        let result = engine.run();

        assert_eq!(result.stats.generations, 0);
        assert_eq!(result.genotype, engine.population()[0].genotype);
        assert_eq!(result.score, engine.population()[0].fitness);
    }

    #[test]
    fn test_best_is_monotonic() {
        let config = test_config(30);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();

        let mut history = Vec::new();
        let result = engine.run_with_callback(|progress| history.push(progress.best.fitness));

        assert_eq!(history.len(), 30);
        assert!(history.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*history.last().unwrap(), result.score);
    }

    #[test]
    fn test_elites_survive_verbatim() {
        let config = test_config(1);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        engine.initialize();

        for _ in 0..10 {
            let elites: Vec<Individual> = engine.population()[..2].to_vec();
            engine.step_generation();
            for elite in &elites {
                assert!(engine.population().contains(elite));
            }
            assert!(engine.population()[0].fitness >= elites[0].fitness);
        }
    }

    #[test]
    fn test_step_without_initialize() {
        let config = test_config(3);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();

        engine.step_generation();
        assert_eq!(engine.generation(), 1);
        assert_eq!(engine.population().len(), 12);
        assert!(engine.best().fitness.is_finite());
    }

    #[test]
    fn test_diversity() {
        let config = test_config(1);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        assert_eq!(engine.diversity(), 0.0);

        engine.initialize();
        let diversity = engine.diversity();
        assert!(diversity > 0.0);
        assert!(diversity <= 9.0);
    }

    #[test]
    fn test_population_size_constant() {
        let config = SearchConfig {
            immigrant_rate: 1.0,
            ..test_config(3)
        };
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        engine.initialize();
        engine.step_generation();
        assert_eq!(engine.population().len(), 12);
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let config = test_config(8);
        let a = EvolutionEngine::new(reference(&config), config.clone())
            .unwrap()
            .run();
        let b = EvolutionEngine::new(reference(&config), config)
            .unwrap()
            .run();
        assert_eq!(a.genotype, b.genotype);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn test_cancellation() {
        let config = test_config(100);
        let mut engine = EvolutionEngine::new(reference(&config), config).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.cancel();

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, YIELD_INTERVAL);
    }

    #[test]
    fn test_reference_mismatch() {
        let config = SearchConfig {
            scoring: ScoringMode::Correlation,
            ..test_config(1)
        };
        let err = EvolutionEngine::new(reference(&config), config).err();
        assert!(matches!(err, Some(ConfigError::ReferenceMismatch { .. })));
    }

    #[test]
    fn test_reference_size_mismatch() {
        let config = test_config(1);
        let other = SearchConfig {
            render: RenderConfig::with_side_length(48),
            ..test_config(1)
        };
        let err = EvolutionEngine::new(reference(&other), config).err();
        assert!(matches!(err, Some(ConfigError::ReferenceSize { .. })));
    }

    #[test]
    fn test_unknown_mode() {
        let config = SearchConfig {
            mode: Mode(42),
            ..test_config(1)
        };
        let err = EvolutionEngine::new(reference(&config), config).err();
        assert_eq!(err, Some(ConfigError::UnknownMode(Mode(42))));
    }

    struct InvertedTable;

    impl ShapeGenerator for InvertedTable {
        fn segments(&self, genotype: &Genotype, mode: Mode) -> Vec<crate::compute::Segment> {
            Biomorph.segments(genotype, mode)
        }
    }

    impl ModeTable for InvertedTable {
        fn bounds(&self, _mode: Mode) -> Option<ModeBounds> {
            Some(ModeBounds::new(vec![0, 5], vec![3, 1], 0))
        }
    }

    #[test]
    fn test_inverted_bounds_fail_fast() {
        let config = test_config(1);
        let err = EvolutionEngine::with_generator(reference(&config), config, InvertedTable).err();
        assert!(matches!(
            err,
            Some(ConfigError::InvertedBounds { index: 1, .. })
        ));
    }

    #[test]
    fn test_correlation_scoring_run() {
        let config = SearchConfig {
            scoring: ScoringMode::Correlation,
            ..test_config(5)
        };
        let field = crate::compute::render_grayscale(&Biomorph, &target(), Mode(1), &config.render);
        let mut engine = EvolutionEngine::new(Reference::Grayscale(field), config).unwrap();
        let result = engine.run();
        assert!((0.0..=1.0).contains(&result.score));
    }
}
