//! Genotype manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations. Every
//! operator returns a fresh genotype whose components lie within the mode's
//! bounds.

use rand::prelude::*;
use rand_distr::Triangular;

use crate::schema::{Genotype, ModeBounds};

/// Leading components inspected by [`GenomeRng::random_interesting`].
const INTERESTING_PREFIX: usize = 8;

/// Minimum non-zero components among the leading ones.
const INTERESTING_MIN_NONZERO: usize = 3;

/// How far a mutation moves a genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrength {
    /// One component moved by one step.
    Single,
    /// One to three components moved by up to two steps each.
    Strong,
}

/// Random number generator wrapper for genotype operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform random genotype within bounds.
    pub fn random_genotype(&mut self, bounds: &ModeBounds) -> Genotype {
        (0..bounds.len())
            .map(|i| self.uniform(bounds.range(i)))
            .collect::<Vec<_>>()
            .into()
    }

    /// Random genotype that avoids near-empty shapes.
    ///
    /// The depth component is drawn from a triangular distribution peaked at
    /// its maximum, and zero components among the first eight are re-rolled
    /// until at least three are non-zero.
    pub fn random_interesting(&mut self, bounds: &ModeBounds) -> Genotype {
        let mut genotype = self.random_genotype(bounds);
        let depth = bounds.depth_index;
        genotype.genes_mut()[depth] = self.biased_high(bounds.range(depth));

        let prefix = INTERESTING_PREFIX.min(bounds.len());
        let can_be_nonzero =
            |i: usize| i != depth && (bounds.min[i] != 0 || bounds.max[i] != 0);
        let attainable = (0..prefix)
            .filter(|&i| i == depth || can_be_nonzero(i))
            .count();
        let required = INTERESTING_MIN_NONZERO.min(attainable);

        loop {
            let genes = genotype.genes_mut();
            let nonzero = genes[..prefix].iter().filter(|&&g| g != 0).count();
            if nonzero >= required {
                break;
            }
            let zeros: Vec<usize> = (0..prefix)
                .filter(|&i| genes[i] == 0 && can_be_nonzero(i))
                .collect();
            let Some(&index) = zeros.choose(&mut self.rng) else {
                break;
            };
            genes[index] = self.uniform(bounds.range(index));
        }

        genotype
    }

    /// Copy `genotype` and move one component by `1..=intensity` steps.
    pub fn mutate(&mut self, genotype: &Genotype, bounds: &ModeBounds, intensity: i32) -> Genotype {
        let mut child = genotype.clone();
        if child.is_empty() {
            return child;
        }

        let index = self.rng.gen_range(0..child.len());
        let magnitude = self.rng.gen_range(1..=intensity.max(1));
        let delta = if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };

        let genes = child.genes_mut();
        genes[index] = bounds.clamp(index, genes[index].saturating_add(delta));
        child
    }

    /// Copy `genotype` and apply one to three intensity-2 mutations.
    pub fn mutate_strong(&mut self, genotype: &Genotype, bounds: &ModeBounds) -> Genotype {
        let changes = self.rng.gen_range(1..=3);
        let mut child = self.mutate(genotype, bounds, 2);
        for _ in 1..changes {
            child = self.mutate(&child, bounds, 2);
        }
        child
    }

    /// Mutate with the given strength.
    pub fn mutate_with(
        &mut self,
        genotype: &Genotype,
        bounds: &ModeBounds,
        strength: MutationStrength,
    ) -> Genotype {
        match strength {
            MutationStrength::Single => self.mutate(genotype, bounds, 1),
            MutationStrength::Strong => self.mutate_strong(genotype, bounds),
        }
    }

    /// Single-point crossover: `parent1` before the cut, `parent2` from it.
    pub fn crossover(&mut self, parent1: &Genotype, parent2: &Genotype) -> Genotype {
        let len = parent1.len().min(parent2.len());
        let cut = if len >= 2 {
            self.rng.gen_range(1..len)
        } else {
            0
        };

        parent1.genes()[..cut]
            .iter()
            .chain(&parent2.genes()[cut..len])
            .copied()
            .collect::<Vec<_>>()
            .into()
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Bernoulli trial with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.rng.r#gen::<f32>() < p
    }

    /// Uniform integer in inclusive bounds.
    fn uniform(&mut self, (lo, hi): (i32, i32)) -> i32 {
        self.rng.gen_range(lo..=hi)
    }

    /// Integer in inclusive bounds, density rising linearly toward `hi`.
    fn biased_high(&mut self, (lo, hi): (i32, i32)) -> i32 {
        if lo >= hi {
            return lo;
        }
        let top = f64::from(hi) + 1.0;
        match Triangular::new(f64::from(lo), top, top) {
            Ok(dist) => (dist.sample(&mut self.rng).floor() as i32).clamp(lo, hi),
            Err(_) => self.uniform((lo, hi)),
        }
    }
}

/// Number of components that differ between two genotypes.
pub fn genotype_distance(g1: &Genotype, g2: &Genotype) -> usize {
    let shared = g1
        .genes()
        .iter()
        .zip(g2.genes())
        .filter(|(a, b)| a != b)
        .count();
    shared + g1.len().abs_diff(g2.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Biomorph, ModeTable};
    use crate::schema::Mode;

    fn bounds() -> ModeBounds {
        Biomorph.bounds(Mode(1)).unwrap()
    }

    #[test]
    fn test_random_genotype() {
        let mut rng = GenomeRng::new(42);
        let bounds = bounds();
        for _ in 0..100 {
            let genotype = rng.random_genotype(&bounds);
            assert_eq!(genotype.len(), 9);
            assert!(bounds.contains(&genotype));
        }
    }

    #[test]
    fn test_random_interesting() {
        let mut rng = GenomeRng::new(7);
        let bounds = bounds();
        let mut depth_total = 0;
        for _ in 0..500 {
            let genotype = rng.random_interesting(&bounds);
            assert!(bounds.contains(&genotype));
            let nonzero = genotype.genes()[..8].iter().filter(|&&g| g != 0).count();
            assert!(nonzero >= 3);
            depth_total += genotype.genes()[8];
        }
        // Uniform depth over 1..=8 averages 4.5; the bias pushes it up.
        assert!(depth_total as f32 / 500.0 > 5.0);
    }

    #[test]
    fn test_random_interesting_all_zero_bounds() {
        let mut rng = GenomeRng::new(1);
        let mut bounds = bounds();
        for i in 0..8 {
            bounds.min[i] = 0;
            bounds.max[i] = 0;
        }
        let genotype = rng.random_interesting(&bounds);
        assert!(bounds.contains(&genotype));
    }

    #[test]
    fn test_mutation_copies_and_changes_one() {
        let mut rng = GenomeRng::new(42);
        let bounds = bounds();
        let original = Genotype::from(vec![0, 0, 0, 0, 0, 0, 0, 0, 4]);

        for _ in 0..50 {
            let child = rng.mutate(&original, &bounds, 1);
            assert!(bounds.contains(&child));
            assert!(genotype_distance(&original, &child) <= 1);
        }
        assert_eq!(original.genes(), &[0, 0, 0, 0, 0, 0, 0, 0, 4]);
    }

    #[test]
    fn test_mutation_clamps() {
        let mut rng = GenomeRng::new(3);
        let bounds = bounds();
        let edge = Genotype::new(bounds.max.clone());
        for _ in 0..100 {
            let child = rng.mutate(&edge, &bounds, 5);
            assert!(bounds.contains(&child));
        }
    }

    #[test]
    fn test_strong_mutation() {
        let mut rng = GenomeRng::new(11);
        let bounds = bounds();
        let original = Genotype::from(vec![0, 0, 0, 0, 0, 0, 0, 0, 4]);
        for _ in 0..50 {
            let child = rng.mutate_strong(&original, &bounds);
            assert!(bounds.contains(&child));
            assert!(genotype_distance(&original, &child) <= 3);
        }
    }

    #[test]
    fn test_crossover() {
        let mut rng = GenomeRng::new(42);
        let a = Genotype::from(vec![1; 9]);
        let b = Genotype::from(vec![2; 9]);

        for _ in 0..50 {
            let child = rng.crossover(&a, &b);
            assert_eq!(child.len(), 9);
            let genes = child.genes();
            let cut = genes.iter().position(|&g| g == 2).unwrap();
            assert!(cut >= 1);
            assert!(genes[..cut].iter().all(|&g| g == 1));
            assert!(genes[cut..].iter().all(|&g| g == 2));
        }
    }

    #[test]
    fn test_genotype_distance() {
        let a = Genotype::from(vec![1, 2, 3]);
        let b = Genotype::from(vec![1, 0, 3]);
        assert_eq!(genotype_distance(&a, &a), 0);
        assert_eq!(genotype_distance(&a, &b), 1);
        assert_eq!(genotype_distance(&a, &Genotype::from(vec![1])), 2);
    }
}
