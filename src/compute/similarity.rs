//! Image similarity metrics.
//!
//! Two independent scores in `[0, 1]`:
//!
//! - **Chamfer** (binary rasters): symmetric mean distance between the
//!   foreground pixels of both masks, mapped through `exp(-d / 2)` and damped
//!   by the ratio of foreground pixel counts.
//! - **Correlation** (grayscale rasters): normalized cross-correlation of the
//!   inverted, box-blurred fields, mapped from `[-1, 1]` to `[0, 1]`.
//!
//! Search runs score thousands of renders against one reference, so the
//! reference side of each metric is precomputed once in a [`Scorer`].

use crate::schema::{Genotype, Mode, RenderConfig, ScoringMode};

use super::raster::{BinaryRaster, GrayRaster, render_binary, render_grayscale};
use super::shape::ShapeGenerator;

/// Distance value for cells with no foreground reachable.
const UNREACHED: u32 = u32::MAX / 2;

/// Weight of the chamfer term that is independent of foreground density.
const DENSITY_FLOOR: f32 = 0.7;

/// Reference raster in the representation matching its scoring algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Compared by chamfer distance.
    Binary(BinaryRaster),
    /// Compared by blurred normalized cross-correlation.
    Grayscale(GrayRaster),
}

impl Reference {
    /// Scoring algorithm implied by the representation.
    pub fn scoring_mode(&self) -> ScoringMode {
        match self {
            Reference::Binary(_) => ScoringMode::Chamfer,
            Reference::Grayscale(_) => ScoringMode::Correlation,
        }
    }

    /// Side length of the reference raster.
    pub fn side(&self) -> usize {
        match self {
            Reference::Binary(r) => r.side(),
            Reference::Grayscale(r) => r.side(),
        }
    }
}

// ============================================================================
// Chamfer
// ============================================================================

/// Manhattan distance from every cell to the nearest foreground cell.
///
/// Two-pass relaxation: top-left to bottom-right using the up/left
/// neighbours, then bottom-right to top-left using down/right.
pub fn distance_transform(mask: &BinaryRaster) -> Vec<u32> {
    let side = mask.side();
    let mut dist: Vec<u32> = mask
        .cells()
        .iter()
        .map(|&fg| if fg { 0 } else { UNREACHED })
        .collect();

    for y in 0..side {
        for x in 0..side {
            let i = y * side + x;
            if y > 0 {
                dist[i] = dist[i].min(dist[i - side] + 1);
            }
            if x > 0 {
                dist[i] = dist[i].min(dist[i - 1] + 1);
            }
        }
    }

    for y in (0..side).rev() {
        for x in (0..side).rev() {
            let i = y * side + x;
            if y + 1 < side {
                dist[i] = dist[i].min(dist[i + side] + 1);
            }
            if x + 1 < side {
                dist[i] = dist[i].min(dist[i + 1] + 1);
            }
        }
    }

    dist
}

/// Binary mask with its distance transform.
#[derive(Debug, Clone)]
pub(crate) struct ChamferTarget {
    mask: BinaryRaster,
    distances: Vec<u32>,
    count: usize,
}

impl ChamferTarget {
    fn new(mask: BinaryRaster) -> Self {
        let distances = distance_transform(&mask);
        let count = mask.foreground_count();
        Self {
            mask,
            distances,
            count,
        }
    }

    /// Mean distance from this mask's foreground to `other`'s nearest foreground.
    fn mean_distance_to(&self, other: &ChamferTarget) -> f64 {
        let total: f64 = self
            .mask
            .cells()
            .iter()
            .zip(&other.distances)
            .filter(|(fg, _)| **fg)
            .map(|(_, &d)| f64::from(d))
            .sum();
        total / self.count as f64
    }

    fn similarity(&self, other: &ChamferTarget) -> f32 {
        if self.count == 0 || other.count == 0 || self.mask.side() != other.mask.side() {
            return 0.0;
        }

        let chamfer = (self.mean_distance_to(other) + other.mean_distance_to(self)) / 2.0;
        let similarity = (-chamfer * 0.5).exp() as f32;

        let density = self.count.min(other.count) as f32 / self.count.max(other.count) as f32;
        similarity * (DENSITY_FLOOR + (1.0 - DENSITY_FLOOR) * density)
    }
}

/// Chamfer similarity of two binary rasters. Symmetric; 0 if either is empty.
pub fn chamfer_similarity(a: &BinaryRaster, b: &BinaryRaster) -> f32 {
    ChamferTarget::new(a.clone()).similarity(&ChamferTarget::new(b.clone()))
}

// ============================================================================
// Correlation
// ============================================================================

/// Blur radius used for a raster of side `side`.
pub fn blur_radius(side: usize) -> usize {
    (side / 20).max(2)
}

/// Separable box blur (horizontal, then vertical) with edge-clipped windows.
pub fn box_blur(field: &[f64], side: usize, radius: usize) -> Vec<f64> {
    let mut horizontal = vec![0.0; field.len()];
    let mut out = vec![0.0; field.len()];
    let mut prefix = Vec::with_capacity(side + 1);

    for y in 0..side {
        blur_line(field, &mut horizontal, y * side, 1, side, radius, &mut prefix);
    }
    for x in 0..side {
        blur_line(&horizontal, &mut out, x, side, side, radius, &mut prefix);
    }
    out
}

fn blur_line(
    src: &[f64],
    dst: &mut [f64],
    start: usize,
    stride: usize,
    len: usize,
    radius: usize,
    prefix: &mut Vec<f64>,
) {
    prefix.clear();
    prefix.push(0.0);
    let mut acc = 0.0;
    for i in 0..len {
        acc += src[start + i * stride];
        prefix.push(acc);
    }

    for i in 0..len {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(len - 1);
        dst[start + i * stride] = (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64;
    }
}

/// Inverted, blurred, mean-centred field.
#[derive(Debug, Clone)]
pub(crate) struct CorrelationTarget {
    side: usize,
    centered: Vec<f64>,
    norm_sq: f64,
}

impl CorrelationTarget {
    fn new(field: &GrayRaster) -> Self {
        let side = field.side();
        let inverted: Vec<f64> = field.cells().iter().map(|&v| 1.0 - f64::from(v)).collect();
        let blurred = box_blur(&inverted, side, blur_radius(side));

        let mean = if blurred.is_empty() {
            0.0
        } else {
            blurred.iter().sum::<f64>() / blurred.len() as f64
        };
        let centered: Vec<f64> = blurred.iter().map(|v| v - mean).collect();
        let norm_sq = centered.iter().map(|v| v * v).sum();

        Self {
            side,
            centered,
            norm_sq,
        }
    }

    fn is_flat(&self) -> bool {
        self.norm_sq <= 1e-12 * self.centered.len().max(1) as f64
    }

    fn similarity(&self, other: &CorrelationTarget) -> f32 {
        if self.side != other.side || self.is_flat() || other.is_flat() {
            return 0.0;
        }

        let covariance: f64 = self
            .centered
            .iter()
            .zip(&other.centered)
            .map(|(a, b)| a * b)
            .sum();
        let ncc = covariance / (self.norm_sq * other.norm_sq).sqrt();

        ((ncc + 1.0) / 2.0).clamp(0.0, 1.0) as f32
    }
}

/// Correlation similarity of two grayscale rasters. 0 if either is uniform.
pub fn correlation_similarity(a: &GrayRaster, b: &GrayRaster) -> f32 {
    CorrelationTarget::new(a).similarity(&CorrelationTarget::new(b))
}

// ============================================================================
// Prepared scorer
// ============================================================================

/// A reference with its per-run precomputation done.
#[derive(Debug, Clone)]
pub(crate) enum Scorer {
    Chamfer(ChamferTarget),
    Correlation(CorrelationTarget),
}

impl Scorer {
    pub(crate) fn new(reference: Reference) -> Self {
        match reference {
            Reference::Binary(mask) => Scorer::Chamfer(ChamferTarget::new(mask)),
            Reference::Grayscale(field) => Scorer::Correlation(CorrelationTarget::new(&field)),
        }
    }

    /// Render `genotype` and compare it against the reference.
    pub(crate) fn score<G: ShapeGenerator + ?Sized>(
        &self,
        generator: &G,
        genotype: &Genotype,
        mode: Mode,
        render: &RenderConfig,
    ) -> f32 {
        match self {
            Scorer::Chamfer(reference) => {
                let mask = render_binary(generator, genotype, mode, render);
                ChamferTarget::new(mask).similarity(reference)
            }
            Scorer::Correlation(reference) => {
                let field = render_grayscale(generator, genotype, mode, render);
                CorrelationTarget::new(&field).similarity(reference)
            }
        }
    }
}
