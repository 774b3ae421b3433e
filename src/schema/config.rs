//! Configuration types for rendering, evolutionary search and exhaustive search.

use serde::{Deserialize, Serialize};

use super::Mode;

fn default_side_length() -> usize {
    80
}
fn default_line_thickness() -> f32 {
    2.0
}
fn default_padding() -> usize {
    4
}

/// How genotypes are drawn into rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Side length of the square raster in cells.
    #[serde(default = "default_side_length")]
    pub side_length: usize,
    /// Stroke width in cells.
    #[serde(default = "default_line_thickness")]
    pub line_thickness: f32,
    /// Margin kept free around the scaled shape.
    #[serde(default = "default_padding")]
    pub padding: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            side_length: default_side_length(),
            line_thickness: default_line_thickness(),
            padding: default_padding(),
        }
    }
}

impl RenderConfig {
    /// Render settings at a given side length, other fields default.
    pub fn with_side_length(side_length: usize) -> Self {
        Self {
            side_length,
            ..Default::default()
        }
    }

    /// Space available to the shape once padding is removed.
    pub fn drawable(&self) -> usize {
        self.side_length.saturating_sub(2 * self.padding)
    }

    /// Validate render settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drawable() == 0 {
            return Err(ConfigError::InvalidRender(format!(
                "side length {} leaves no room inside padding {}",
                self.side_length, self.padding
            )));
        }
        if !(self.line_thickness > 0.0 && self.line_thickness.is_finite()) {
            return Err(ConfigError::InvalidRender(format!(
                "line thickness must be positive, got {}",
                self.line_thickness
            )));
        }
        Ok(())
    }
}

/// Similarity algorithm used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringMode {
    /// Symmetric chamfer distance between binary rasters.
    #[default]
    Chamfer,
    /// Blurred normalized cross-correlation between grayscale rasters.
    Correlation,
}

/// Immutable configuration for one evolutionary search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Genotype layout to search.
    #[serde(default)]
    pub mode: Mode,
    /// Rasterization settings; must match the reference raster.
    #[serde(default)]
    pub render: RenderConfig,
    /// Individuals per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Generations to run after the initial population.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Probability that an offspring is mutated after crossover.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Top individuals copied unchanged into the next generation.
    #[serde(default = "default_elite_count")]
    pub elite_count: usize,
    /// Fraction of each generation replaced by random immigrants.
    #[serde(default = "default_immigrant_rate")]
    pub immigrant_rate: f32,
    /// Similarity algorithm.
    #[serde(default)]
    pub scoring: ScoringMode,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            render: RenderConfig::default(),
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            elite_count: default_elite_count(),
            immigrant_rate: default_immigrant_rate(),
            scoring: ScoringMode::default(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    60
}
fn default_generations() -> usize {
    150
}
fn default_mutation_rate() -> f32 {
    0.3
}
fn default_elite_count() -> usize {
    4
}
fn default_immigrant_rate() -> f32 {
    0.1
}

impl SearchConfig {
    /// Validate everything that does not depend on the mode table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.render.validate()?;

        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.elite_count > self.population_size {
            return Err(ConfigError::TooManyElites {
                elites: self.elite_count,
                population: self.population_size,
            });
        }
        check_rate("mutation_rate", self.mutation_rate)?;
        check_rate("immigrant_rate", self.immigrant_rate)?;
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate { name, value })
    }
}

fn default_top_n() -> usize {
    10
}

/// Configuration for an exhaustive enumeration of a mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceConfig {
    /// Mode to enumerate.
    #[serde(default)]
    pub mode: Mode,
    /// Per-component lower bounds; the mode's own bounds when absent.
    #[serde(default)]
    pub search_min: Option<Vec<i32>>,
    /// Per-component upper bounds; the mode's own bounds when absent.
    #[serde(default)]
    pub search_max: Option<Vec<i32>>,
    /// Length of the returned ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Rasterization settings; must match the reference raster.
    #[serde(default)]
    pub render: RenderConfig,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            search_min: None,
            search_max: None,
            top_n: default_top_n(),
            render: RenderConfig::default(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} has no bounds in the mode table")]
    UnknownMode(Mode),
    #[error("Genotype length must be non-zero")]
    EmptyGenotype,
    #[error("Bounds length mismatch: expected {expected}, got {actual}")]
    BoundsLengthMismatch { expected: usize, actual: usize },
    #[error("Component {index} has min ({min}) > max ({max})")]
    InvertedBounds { index: usize, min: i32, max: i32 },
    #[error("Depth index {index} out of range for genotype length {len}")]
    InvalidDepthIndex { index: usize, len: usize },
    #[error("Search bounds for component {index} ({min}..={max}) exceed mode bounds ({mode_min}..={mode_max})")]
    SearchBoundsOutOfRange {
        index: usize,
        min: i32,
        max: i32,
        mode_min: i32,
        mode_max: i32,
    },
    #[error("Population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
    #[error("Elite count {elites} exceeds population size {population}")]
    TooManyElites { elites: usize, population: usize },
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("Invalid render settings: {0}")]
    InvalidRender(String),
    #[error("Reference is {actual:?} but scoring expects {expected:?}")]
    ReferenceMismatch {
        expected: ScoringMode,
        actual: ScoringMode,
    },
    #[error("Reference side length {actual} does not match render side length {expected}")]
    ReferenceSize { expected: usize, actual: usize },
    #[error("Top-N size must be at least 1")]
    InvalidTopN,
}
