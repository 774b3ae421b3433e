//! Exhaustive enumeration of a bounded genotype space.
//!
//! Only practical for narrow search bounds: the full basic mode already holds
//! 7^8 * 8 (about 46 million) genotypes. The size is logged but not capped.

use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;

use crate::compute::raster::BinaryRaster;
use crate::compute::shape::{Biomorph, ModeTable, ShapeGenerator};
use crate::compute::similarity::{Reference, Scorer};
use crate::schema::{
    BruteForceConfig, BruteForceProgress, BruteForceResult, ConfigError, Genotype, ModeBounds,
    ScoredGenotype, StopReason,
};

use super::search::CancelToken;

/// Evaluations between progress reports and yield points.
pub const PROGRESS_INTERVAL: usize = 50_000;

/// Space sizes above this are logged as likely intractable.
const LARGE_SPACE_WARNING: u64 = 100_000_000;

/// Mixed-radix counter over a bounded genotype space.
///
/// The depth component is the most significant digit; the rest follow in
/// index order with the last component changing fastest.
#[derive(Debug, Clone)]
pub struct GenotypeOdometer {
    min: Vec<i32>,
    max: Vec<i32>,
    order: Vec<usize>,
    next: Option<Vec<i32>>,
    remaining: u64,
}

impl GenotypeOdometer {
    /// Enumerate all genotypes with `min[i] <= g[i] <= max[i]`.
    pub fn new(bounds: &ModeBounds) -> Self {
        let order = std::iter::once(bounds.depth_index)
            .chain((0..bounds.len()).filter(|&i| i != bounds.depth_index))
            .collect();

        let mut odometer = Self {
            min: bounds.min.clone(),
            max: bounds.max.clone(),
            order,
            next: None,
            remaining: 0,
        };
        odometer.restart();
        odometer
    }

    /// Size of the enumerated space (saturating).
    pub fn total(&self) -> u64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| (i64::from(hi) - i64::from(lo) + 1).max(0) as u64)
            .fold(1u64, u64::saturating_mul)
    }

    /// Rewind to the first genotype.
    pub fn restart(&mut self) {
        let empty = self.min.is_empty() || self.min.iter().zip(&self.max).any(|(lo, hi)| lo > hi);
        self.next = (!empty).then(|| self.min.clone());
        self.remaining = if empty { 0 } else { self.total() };
    }
}

impl Iterator for GenotypeOdometer {
    type Item = Genotype;

    fn next(&mut self) -> Option<Genotype> {
        let current = self.next.take()?;
        self.remaining = self.remaining.saturating_sub(1);

        let mut successor = current.clone();
        let mut carried = true;
        for &i in self.order.iter().rev() {
            if successor[i] < self.max[i] {
                successor[i] += 1;
                carried = false;
                break;
            }
            successor[i] = self.min[i];
        }
        if !carried {
            self.next = Some(successor);
        }

        Some(Genotype::new(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Bounded ranking kept in descending score order.
#[derive(Debug, Clone)]
pub struct TopN {
    capacity: usize,
    entries: Vec<ScoredGenotype>,
}

impl TopN {
    /// Empty ranking holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    /// Insert if the list has room or `score` beats the current last entry.
    ///
    /// Ties rank after existing entries with the same score.
    pub fn offer(&mut self, genotype: &Genotype, score: f32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.entries.len() >= self.capacity
            && self.entries.last().is_some_and(|last| score <= last.score)
        {
            return false;
        }

        let position = self.entries.partition_point(|e| e.score >= score);
        self.entries.insert(
            position,
            ScoredGenotype {
                genotype: genotype.clone(),
                score,
            },
        );
        self.entries.truncate(self.capacity);
        true
    }

    /// Highest-scoring entry.
    pub fn best(&self) -> Option<&ScoredGenotype> {
        self.entries.first()
    }

    /// Entries, best first.
    pub fn entries(&self) -> &[ScoredGenotype] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<ScoredGenotype> {
        self.entries
    }
}

/// Brute-force search over a bounded region of one mode.
pub struct ExhaustiveSearch<G = Biomorph> {
    config: BruteForceConfig,
    search_bounds: ModeBounds,
    generator: G,
    scorer: Scorer,
    cancel: CancelToken,
}

impl ExhaustiveSearch<Biomorph> {
    /// Create a search using the built-in biomorph generator.
    pub fn new(reference: BinaryRaster, config: BruteForceConfig) -> Result<Self, ConfigError> {
        Self::with_generator(reference, config, Biomorph)
    }
}

impl<G> ExhaustiveSearch<G>
where
    G: ShapeGenerator + ModeTable + Sync,
{
    /// Create a search with a custom shape generator and mode table.
    pub fn with_generator(
        reference: BinaryRaster,
        config: BruteForceConfig,
        generator: G,
    ) -> Result<Self, ConfigError> {
        config.render.validate()?;
        if config.top_n == 0 {
            return Err(ConfigError::InvalidTopN);
        }
        if reference.side() != config.render.side_length {
            return Err(ConfigError::ReferenceSize {
                expected: config.render.side_length,
                actual: reference.side(),
            });
        }

        let mode_bounds = generator
            .bounds(config.mode)
            .ok_or(ConfigError::UnknownMode(config.mode))?;
        mode_bounds.validate()?;
        let search_bounds = narrow_bounds(&mode_bounds, &config)?;

        Ok(Self {
            config,
            search_bounds,
            generator,
            scorer: Scorer::new(Reference::Binary(reference)),
            cancel: CancelToken::new(),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Bounds actually enumerated.
    pub fn search_bounds(&self) -> &ModeBounds {
        &self.search_bounds
    }

    /// Enumerate the space, reporting progress every [`PROGRESS_INTERVAL`] genotypes.
    pub fn run_with_callback<F>(&self, mut callback: F) -> BruteForceResult
    where
        F: FnMut(&BruteForceProgress),
    {
        let start_time = Instant::now();
        let mut odometer = GenotypeOdometer::new(&self.search_bounds);
        let total = odometer.total();
        info!(
            "brute force start: {}, {} combinations, top {}",
            self.config.mode, total, self.config.top_n
        );
        if total > LARGE_SPACE_WARNING {
            warn!("brute force over {total} combinations will take a very long time");
        }

        let mut top = TopN::new(self.config.top_n);
        let mut checked = 0u64;
        let mut stop_reason = StopReason::Completed;

        loop {
            let chunk: Vec<Genotype> = odometer.by_ref().take(PROGRESS_INTERVAL).collect();
            if chunk.is_empty() {
                break;
            }

            let scores: Vec<f32> = chunk
                .par_iter()
                .map(|genotype| {
                    self.scorer.score(
                        &self.generator,
                        genotype,
                        self.config.mode,
                        &self.config.render,
                    )
                })
                .collect();
            for (genotype, score) in chunk.iter().zip(scores) {
                top.offer(genotype, score);
            }
            checked += chunk.len() as u64;

            if chunk.len() < PROGRESS_INTERVAL {
                break;
            }

            callback(&BruteForceProgress {
                checked,
                total,
                best: top.best(),
            });
            info!(
                "brute force: {checked}/{total} checked, best {:.4}",
                top.best().map_or(0.0, |b| b.score)
            );

            if self.cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            std::thread::yield_now();
        }

        info!(
            "brute force {:?}: {checked} checked in {:.2}s",
            stop_reason,
            start_time.elapsed().as_secs_f64()
        );

        BruteForceResult {
            top: top.into_vec(),
            checked,
            total,
            stop_reason,
        }
    }

    /// Enumerate without progress reporting.
    pub fn run(&self) -> BruteForceResult {
        self.run_with_callback(|_| {})
    }
}

/// Replace mode bounds with caller-supplied ones after checking them.
fn narrow_bounds(mode: &ModeBounds, config: &BruteForceConfig) -> Result<ModeBounds, ConfigError> {
    let min = config.search_min.clone().unwrap_or_else(|| mode.min.clone());
    let max = config.search_max.clone().unwrap_or_else(|| mode.max.clone());

    for actual in [min.len(), max.len()] {
        if actual != mode.len() {
            return Err(ConfigError::BoundsLengthMismatch {
                expected: mode.len(),
                actual,
            });
        }
    }

    let narrowed = ModeBounds::new(min, max, mode.depth_index);
    narrowed.validate()?;

    for index in 0..mode.len() {
        let (lo, hi) = narrowed.range(index);
        let (mode_lo, mode_hi) = mode.range(index);
        if lo < mode_lo || hi > mode_hi {
            return Err(ConfigError::SearchBoundsOutOfRange {
                index,
                min: lo,
                max: hi,
                mode_min: mode_lo,
                mode_max: mode_hi,
            });
        }
    }

    Ok(narrowed)
}

/// Enumerate with the built-in generator and return the ranking, best first.
pub fn brute_force<F>(
    reference: &BinaryRaster,
    config: &BruteForceConfig,
    progress: F,
) -> Result<Vec<ScoredGenotype>, ConfigError>
where
    F: FnMut(&BruteForceProgress),
{
    let search = ExhaustiveSearch::new(reference.clone(), config.clone())?;
    Ok(search.run_with_callback(progress).top)
}
