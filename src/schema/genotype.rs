//! Genotype and individual types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-length integer parameter vector describing one shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype(Vec<i32>);

impl Genotype {
    /// Wrap a gene vector.
    pub fn new(genes: Vec<i32>) -> Self {
        Self(genes)
    }

    /// Gene values.
    pub fn genes(&self) -> &[i32] {
        &self.0
    }

    /// Mutable gene values.
    pub(crate) fn genes_mut(&mut self) -> &mut [i32] {
        &mut self.0
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the genotype has no genes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gene at `index`.
    pub fn get(&self, index: usize) -> Option<i32> {
        self.0.get(index).copied()
    }

    /// Consume into the raw gene vector.
    pub fn into_inner(self) -> Vec<i32> {
        self.0
    }
}

impl From<Vec<i32>> for Genotype {
    fn from(genes: Vec<i32>) -> Self {
        Self(genes)
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, g) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{g}")?;
        }
        write!(f, "]")
    }
}

/// A genotype together with its fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// The genotype.
    pub genotype: Genotype,
    /// Similarity to the reference, higher is better.
    pub fitness: f32,
}

impl Individual {
    /// Unevaluated individual (fitness 0).
    pub fn new(genotype: Genotype) -> Self {
        Self {
            genotype,
            fitness: 0.0,
        }
    }
}

/// Entry in an exhaustive-search ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGenotype {
    pub genotype: Genotype,
    pub score: f32,
}

/// Sort individuals by descending fitness. Stable, so ties keep insertion order.
pub fn sort_by_fitness(population: &mut [Individual]) {
    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
}
