//! Shape generation: turning a genotype into line segments.
//!
//! The search core only needs two things from a shape family: the segments a
//! genotype draws ([`ShapeGenerator`]) and the bounds of each mode
//! ([`ModeTable`]). [`Biomorph`] provides both for the classic recursive
//! eight-direction branching figure.
//!
//! # Genes
//!
//! Genes 0-7 define eight direction vectors
//!
//! ```text
//! dx = [-g1, -g0,  0, g0, g1, g2,  0, -g2]
//! dy = [ g5,  g4, g3, g4, g5, g6, g7,  g6]
//! ```
//!
//! where direction 2 points straight up. Gene 8 is the recursion depth: a
//! branch at depth `d` heading in direction `k` draws a segment of `d` times
//! vector `k`, then forks into directions `k-1` and `k+1` at depth `d-1`.

use serde::{Deserialize, Serialize};

use crate::schema::{Genotype, Mode, ModeBounds};

/// Upper limit on recursion depth regardless of gene value.
pub const MAX_DEPTH: i32 = 12;

/// A straight line between two points, tagged with its recursion depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// Remaining recursion depth when the segment was drawn.
    pub depth: u32,
}

/// Produces the segments of a genotype. Must be pure and deterministic.
pub trait ShapeGenerator {
    fn segments(&self, genotype: &Genotype, mode: Mode) -> Vec<Segment>;
}

/// Maps a mode to its genotype bounds.
pub trait ModeTable {
    /// Bounds for `mode`, or `None` if the mode does not exist.
    fn bounds(&self, mode: Mode) -> Option<ModeBounds>;
}

/// Dawkins-style biomorph generator and its mode table.
///
/// - Mode 1: 9 genes (directions, depth).
/// - Mode 2: 11 genes, adding segment count and segment spacing.
/// - Mode 3: 13 genes, adding horizontal and vertical gradients across segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Biomorph;

const DEPTH_GENE: usize = 8;

impl ModeTable for Biomorph {
    fn bounds(&self, mode: Mode) -> Option<ModeBounds> {
        let mut min = vec![-3; 8];
        let mut max = vec![3; 8];
        min.push(1);
        max.push(8);

        match mode.0 {
            1 => {}
            2 => {
                min.extend([1, 1]);
                max.extend([6, 8]);
            }
            3 => {
                min.extend([1, 1, -2, -2]);
                max.extend([6, 8, 2, 2]);
            }
            _ => return None,
        }

        Some(ModeBounds::new(min, max, DEPTH_GENE))
    }
}

impl ShapeGenerator for Biomorph {
    fn segments(&self, genotype: &Genotype, mode: Mode) -> Vec<Segment> {
        let Some(layout) = Layout::for_mode(mode) else {
            return Vec::new();
        };
        let genes = genotype.genes();
        if genes.len() != layout.len {
            return Vec::new();
        }

        let depth = genes[DEPTH_GENE].clamp(0, MAX_DEPTH);
        let (count, spacing) = if layout.segmented {
            (genes[9].max(1), genes[10])
        } else {
            (1, 0)
        };
        let (grad_x, grad_y) = if layout.gradient {
            (genes[11], genes[12])
        } else {
            (0, 0)
        };

        let mut segments = Vec::new();
        for s in 0..count {
            let mut local = [0i32; 8];
            local.copy_from_slice(&genes[..8]);
            for g in &mut local[..3] {
                *g += s * grad_x;
            }
            for g in &mut local[3..8] {
                *g += s * grad_y;
            }

            let (dx, dy) = direction_vectors(&local);
            let origin_y = -((s * spacing * depth) as f32);
            branch(&mut segments, &dx, &dy, 0.0, origin_y, depth as u32);
        }

        segments
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    len: usize,
    segmented: bool,
    gradient: bool,
}

impl Layout {
    fn for_mode(mode: Mode) -> Option<Self> {
        match mode.0 {
            1 => Some(Self {
                len: 9,
                segmented: false,
                gradient: false,
            }),
            2 => Some(Self {
                len: 11,
                segmented: true,
                gradient: false,
            }),
            3 => Some(Self {
                len: 13,
                segmented: true,
                gradient: true,
            }),
            _ => None,
        }
    }
}

/// Build the eight direction vectors from the first eight genes.
fn direction_vectors(g: &[i32; 8]) -> ([f32; 8], [f32; 8]) {
    let dx = [-g[1], -g[0], 0, g[0], g[1], g[2], 0, -g[2]].map(|v| v as f32);
    let dy = [g[5], g[4], g[3], g[4], g[5], g[6], g[7], g[6]].map(|v| v as f32);
    (dx, dy)
}

/// Draw the branching tree rooted at `(x, y)` heading up.
fn branch(out: &mut Vec<Segment>, dx: &[f32; 8], dy: &[f32; 8], x: f32, y: f32, depth: u32) {
    let mut stack = vec![(x, y, depth, 2usize)];

    while let Some((x, y, depth, dir)) = stack.pop() {
        if depth == 0 {
            continue;
        }
        let x1 = x + depth as f32 * dx[dir];
        let y1 = y + depth as f32 * dy[dir];
        out.push(Segment {
            x0: x,
            y0: y,
            x1,
            y1,
            depth,
        });

        stack.push((x1, y1, depth - 1, (dir + 1) % 8));
        stack.push((x1, y1, depth - 1, (dir + 7) % 8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stem() {
        let genotype = Genotype::from(vec![0, 0, 0, 2, 0, 0, 0, 0, 1]);
        let segments = Biomorph.segments(&genotype, Mode(1));

        assert_eq!(segments.len(), 1);
        let s = segments[0];
        assert_eq!((s.x0, s.y0, s.x1, s.y1, s.depth), (0.0, 0.0, 0.0, 2.0, 1));
    }

    #[test]
    fn test_segment_count_doubles_per_level() {
        let genotype = Genotype::from(vec![1, 1, 1, 1, 1, 1, 1, 1, 5]);
        let segments = Biomorph.segments(&genotype, Mode(1));
        assert_eq!(segments.len(), (1 << 5) - 1);
        assert_eq!(segments.iter().filter(|s| s.depth == 5).count(), 1);
        assert_eq!(segments.iter().filter(|s| s.depth == 1).count(), 16);
    }

    #[test]
    fn test_deterministic() {
        let genotype = Genotype::from(vec![-2, 3, 1, 0, -1, 2, -3, 1, 6]);
        assert_eq!(
            Biomorph.segments(&genotype, Mode(1)),
            Biomorph.segments(&genotype, Mode(1))
        );
    }

    #[test]
    fn test_segmented_mode_repeats_tree() {
        let genotype = Genotype::from(vec![0, 0, 0, 2, 0, 0, 0, 0, 1, 3, 2]);
        let segments = Biomorph.segments(&genotype, Mode(2));
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].y0, -2.0);
        assert_eq!(segments[2].y0, -4.0);
    }

    #[test]
    fn test_wrong_length_draws_nothing() {
        let genotype = Genotype::from(vec![0, 0, 0, 2, 0, 0, 0, 0, 1]);
        assert!(Biomorph.segments(&genotype, Mode(2)).is_empty());
        assert!(Biomorph.segments(&genotype, Mode(9)).is_empty());
    }

    #[test]
    fn test_mode_table() {
        for (mode, len) in [(1, 9), (2, 11), (3, 13)] {
            let bounds = Biomorph.bounds(Mode(mode)).unwrap();
            assert_eq!(bounds.len(), len);
            assert!(bounds.validate().is_ok());
        }
        assert!(Biomorph.bounds(Mode(0)).is_none());
    }
}
