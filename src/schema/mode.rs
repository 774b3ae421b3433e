//! Mode selectors and per-mode genotype bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Genotype};

/// Selects a genotype layout (length and per-component bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mode(pub u8);

impl Mode {
    /// The smallest mode: eight direction genes plus recursion depth.
    pub const BASIC: Mode = Mode(1);
}

impl Default for Mode {
    fn default() -> Self {
        Self::BASIC
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode {}", self.0)
    }
}

/// Inclusive per-component bounds for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeBounds {
    /// Lower bound for each component.
    pub min: Vec<i32>,
    /// Upper bound for each component.
    pub max: Vec<i32>,
    /// Index of the recursion-depth component.
    pub depth_index: usize,
}

impl ModeBounds {
    /// Create bounds from parallel min/max vectors.
    pub fn new(min: Vec<i32>, max: Vec<i32>, depth_index: usize) -> Self {
        Self {
            min,
            max,
            depth_index,
        }
    }

    /// Genotype length for this mode.
    pub fn len(&self) -> usize {
        self.min.len()
    }

    /// Whether the mode has no components at all.
    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Inclusive range of component `index`.
    pub fn range(&self, index: usize) -> (i32, i32) {
        (self.min[index], self.max[index])
    }

    /// Clamp `value` into the range of component `index`.
    pub fn clamp(&self, index: usize, value: i32) -> i32 {
        value.clamp(self.min[index], self.max[index])
    }

    /// Whether every component of `genotype` lies within bounds.
    pub fn contains(&self, genotype: &Genotype) -> bool {
        genotype.len() == self.len()
            && genotype
                .genes()
                .iter()
                .enumerate()
                .all(|(i, &g)| g >= self.min[i] && g <= self.max[i])
    }

    /// Number of distinct genotypes in the bounded space (saturating).
    pub fn combinations(&self) -> u64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| (i64::from(hi) - i64::from(lo) + 1).max(0) as u64)
            .fold(1u64, u64::saturating_mul)
    }

    /// Check structural consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min.is_empty() {
            return Err(ConfigError::EmptyGenotype);
        }
        if self.min.len() != self.max.len() {
            return Err(ConfigError::BoundsLengthMismatch {
                expected: self.min.len(),
                actual: self.max.len(),
            });
        }
        if let Some(index) = (0..self.len()).find(|&i| self.min[i] > self.max[i]) {
            return Err(ConfigError::InvertedBounds {
                index,
                min: self.min[index],
                max: self.max[index],
            });
        }
        if self.depth_index >= self.len() {
            return Err(ConfigError::InvalidDepthIndex {
                index: self.depth_index,
                len: self.len(),
            });
        }
        Ok(())
    }
}
