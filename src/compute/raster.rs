//! Rasterization of shapes and preparation of reference images.
//!
//! Both paths use the same geometry: the foreground bounding box is scaled
//! uniformly to fit inside `side_length - 2 * padding` and its midpoint is
//! placed at the raster center. A rendered genotype and a scanned reference
//! are therefore compared on identical terms.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::schema::{Genotype, Mode, RenderConfig};

use super::shape::{Segment, ShapeGenerator};

/// Pixels at or above this brightness are ignored when stretching contrast.
const NEAR_WHITE: u8 = 250;

/// Square sample grid in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    side: usize,
    cells: Vec<T>,
}

/// Foreground (`true`) / background mask.
pub type BinaryRaster = Raster<bool>;

/// Brightness field in `[0, 1]`, 0 is fully dark.
pub type GrayRaster = Raster<f32>;

impl<T: Clone> Raster<T> {
    /// Raster with every cell set to `value`.
    pub fn filled(side: usize, value: T) -> Self {
        Self {
            side,
            cells: vec![value; side * side],
        }
    }
}

impl<T> Raster<T> {
    /// Wrap row-major cells. Returns `None` unless `cells.len() == side * side`.
    pub fn from_cells(side: usize, cells: Vec<T>) -> Option<Self> {
        (cells.len() == side * side).then_some(Self { side, cells })
    }

    /// Side length in cells.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Cell at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.side && y < self.side {
            self.cells.get(y * self.side + x)
        } else {
            None
        }
    }
}

impl BinaryRaster {
    /// Number of foreground cells.
    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

impl GrayRaster {
    /// Threshold into a mask; cells strictly darker than `cutoff` are foreground.
    pub fn threshold(&self, cutoff: f32) -> BinaryRaster {
        Raster {
            side: self.side,
            cells: self.cells.iter().map(|&v| v < cutoff).collect(),
        }
    }
}

// ============================================================================
// Genotype rendering
// ============================================================================

/// Render a genotype as a binary mask.
pub fn render_binary<G: ShapeGenerator + ?Sized>(
    generator: &G,
    genotype: &Genotype,
    mode: Mode,
    render: &RenderConfig,
) -> BinaryRaster {
    rasterize_segments(&generator.segments(genotype, mode), render).threshold(0.5)
}

/// Render a genotype as a grayscale field (white background, black strokes).
pub fn render_grayscale<G: ShapeGenerator + ?Sized>(
    generator: &G,
    genotype: &Genotype,
    mode: Mode,
    render: &RenderConfig,
) -> GrayRaster {
    rasterize_segments(&generator.segments(genotype, mode), render)
}

/// Scale, center and stroke a set of segments onto a white canvas.
pub fn rasterize_segments(segments: &[Segment], render: &RenderConfig) -> GrayRaster {
    let side = render.side_length;
    let mut canvas = Raster::filled(side, 1.0f32);

    let Some((min_x, min_y, max_x, max_y)) = segment_bounds(segments) else {
        return canvas;
    };

    let extent = (max_x - min_x).max(max_y - min_y);
    let scale = if extent > 0.0 {
        render.drawable().max(1) as f32 / extent
    } else {
        1.0
    };
    let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    let half = side as f32 / 2.0;
    let to_pixel = |x: f32, y: f32| (half + (x - cx) * scale, half - (y - cy) * scale);

    let radius = render.line_thickness / 2.0;
    for s in segments {
        let (px0, py0) = to_pixel(s.x0, s.y0);
        let (px1, py1) = to_pixel(s.x1, s.y1);
        stroke(&mut canvas, (px0, py0), (px1, py1), radius);
    }

    canvas
}

fn segment_bounds(segments: &[Segment]) -> Option<(f32, f32, f32, f32)> {
    if segments.is_empty() {
        return None;
    }
    let mut bounds = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for s in segments {
        bounds.0 = bounds.0.min(s.x0).min(s.x1);
        bounds.1 = bounds.1.min(s.y0).min(s.y1);
        bounds.2 = bounds.2.max(s.x0).max(s.x1);
        bounds.3 = bounds.3.max(s.y0).max(s.y1);
    }
    Some(bounds)
}

/// Paint every pixel whose center lies within `radius` of segment `a`-`b`.
fn stroke(canvas: &mut GrayRaster, a: (f32, f32), b: (f32, f32), radius: f32) {
    let side = canvas.side;
    if side == 0 {
        return;
    }
    let limit = side as f32 - 1.0;
    let x_lo = (a.0.min(b.0) - radius).floor().clamp(0.0, limit) as usize;
    let x_hi = (a.0.max(b.0) + radius).ceil().clamp(0.0, limit) as usize;
    let y_lo = (a.1.min(b.1) - radius).floor().clamp(0.0, limit) as usize;
    let y_hi = (a.1.max(b.1) + radius).ceil().clamp(0.0, limit) as usize;

    let r2 = radius * radius;
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            if distance_sq_to_segment(p, a, b) <= r2 {
                canvas.cells[y * side + x] = 0.0;
            }
        }
    }
}

fn distance_sq_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (dx, dy) = (p.0 - (a.0 + t * abx), p.1 - (a.1 + t * aby));
    dx * dx + dy * dy
}

// ============================================================================
// Reference preparation
// ============================================================================

/// Options for turning an external image into a binary reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceOptions {
    /// Brightness cutoff (0-255); pixels strictly below are foreground.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Stretch the observed brightness range to 0-255 before thresholding.
    #[serde(default)]
    pub enhance_contrast: bool,
}

fn default_threshold() -> u8 {
    128
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            enhance_contrast: false,
        }
    }
}

/// Errors while loading a reference image.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Failed to decode reference image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Reference image has zero width or height")]
    EmptyImage,
}

/// Decode an image file into 8-bit luma, compositing transparency over white.
pub fn load_reference_image<P: AsRef<Path>>(path: P) -> Result<GrayImage, ReferenceError> {
    let decoded = image::open(path)?.to_luma_alpha8();
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ReferenceError::EmptyImage);
    }

    let mut gray = GrayImage::new(decoded.width(), decoded.height());
    for (x, y, pixel) in decoded.enumerate_pixels() {
        let [luma, alpha] = pixel.0;
        let alpha = f32::from(alpha) / 255.0;
        let value = f32::from(luma) * alpha + 255.0 * (1.0 - alpha);
        gray.put_pixel(x, y, Luma([value.round() as u8]));
    }
    Ok(gray)
}

/// Fit an external image to the raster geometry and threshold it.
pub fn prepare_reference(
    image: &GrayImage,
    render: &RenderConfig,
    options: ReferenceOptions,
) -> BinaryRaster {
    let source = if options.enhance_contrast {
        stretch_contrast(image)
    } else {
        image.clone()
    };
    let fitted = fit_to_canvas(&source, render, options.threshold);

    Raster {
        side: render.side_length,
        cells: fitted.pixels().map(|p| p.0[0] < options.threshold).collect(),
    }
}

/// Fit an external image to the raster geometry, keeping brightness.
pub fn prepare_grayscale_reference(image: &GrayImage, render: &RenderConfig) -> GrayRaster {
    let fitted = fit_to_canvas(image, render, default_threshold());

    Raster {
        side: render.side_length,
        cells: fitted.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect(),
    }
}

/// Map the darkest and brightest non-white pixels to 0 and 255.
fn stretch_contrast(image: &GrayImage) -> GrayImage {
    let (lo, hi) = image
        .pixels()
        .map(|p| p.0[0])
        .filter(|&v| v < NEAR_WHITE)
        .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if hi <= lo {
        return image.clone();
    }

    let range = f32::from(hi - lo);
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let v = f32::from(pixel.0[0].saturating_sub(lo)) * 255.0 / range;
        pixel.0[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Bounding box `(x, y, width, height)` of pixels darker than `threshold`.
fn foreground_bounds(image: &GrayImage, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] >= threshold {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Crop to the foreground, scale into the drawable area and center on white.
fn fit_to_canvas(image: &GrayImage, render: &RenderConfig, threshold: u8) -> GrayImage {
    let side = render.side_length as u32;
    let mut canvas = GrayImage::from_pixel(side, side, Luma([255]));

    let Some((x, y, width, height)) = foreground_bounds(image, threshold) else {
        return canvas;
    };

    // A lone pixel has no extent to scale, like a zero-length render.
    let extent = width.max(height);
    let scale = if extent > 1 {
        render.drawable().max(1) as f32 / extent as f32
    } else {
        1.0
    };
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, side.max(1));
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, side.max(1));

    let cropped = imageops::crop_imm(image, x, y, width, height).to_image();
    let resized = imageops::resize(&cropped, new_width, new_height, FilterType::Triangle);

    let offset_x = (i64::from(side) - i64::from(new_width)) / 2;
    let offset_y = (i64::from(side) - i64::from(new_height)) / 2;
    imageops::overlay(&mut canvas, &resized, offset_x, offset_y);

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Biomorph;

    fn stem() -> Genotype {
        Genotype::from(vec![0, 0, 0, 2, 0, 0, 0, 0, 1])
    }

    #[test]
    fn test_empty_segments_render_background() {
        let render = RenderConfig::with_side_length(16);
        let gray = rasterize_segments(&[], &render);
        assert!(gray.cells().iter().all(|&v| v == 1.0));
        assert_eq!(gray.threshold(0.5).foreground_count(), 0);
    }

    #[test]
    fn test_stem_is_vertical_and_centered() {
        let render = RenderConfig::with_side_length(80);
        let mask = render_binary(&Biomorph, &stem(), Mode(1), &render);

        // Spans the drawable height, two cells wide around the center column.
        assert!(*mask.get(40, 4).unwrap());
        assert!(*mask.get(40, 75).unwrap());
        assert!(*mask.get(39, 40).unwrap());
        assert!(!mask.get(20, 40).unwrap());
        assert!(!mask.get(40, 1).unwrap());
    }

    #[test]
    fn test_thickness_widens_stroke() {
        let thin = RenderConfig {
            line_thickness: 1.0,
            ..RenderConfig::with_side_length(40)
        };
        let thick = RenderConfig {
            line_thickness: 5.0,
            ..thin
        };
        let a = render_binary(&Biomorph, &stem(), Mode(1), &thin).foreground_count();
        let b = render_binary(&Biomorph, &stem(), Mode(1), &thick).foreground_count();
        assert!(b > a);
    }

    #[test]
    fn test_prepare_reference_blank_image() {
        let image = GrayImage::from_pixel(30, 30, Luma([255]));
        let reference = prepare_reference(
            &image,
            &RenderConfig::with_side_length(20),
            ReferenceOptions::default(),
        );
        assert_eq!(reference.side(), 20);
        assert_eq!(reference.foreground_count(), 0);
    }

    #[test]
    fn test_prepare_reference_centers_square() {
        // Dark 10x10 block in a corner of a large image.
        let mut image = GrayImage::from_pixel(100, 60, Luma([255]));
        for y in 2..12 {
            for x in 70..80 {
                image.put_pixel(x, y, Luma([0]));
            }
        }

        let render = RenderConfig::with_side_length(40);
        let reference = prepare_reference(&image, &render, ReferenceOptions::default());

        // Scaled to fill 32x32 in the middle of the raster.
        assert!(*reference.get(20, 20).unwrap());
        assert!(*reference.get(5, 5).unwrap());
        assert!(*reference.get(34, 34).unwrap());
        assert!(!reference.get(2, 2).unwrap());
        assert!(!reference.get(38, 20).unwrap());
    }

    #[test]
    fn test_single_point_matches_between_render_and_reference() {
        let render = RenderConfig::default();
        let dot = Genotype::from(vec![0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let rendered = render_binary(&Biomorph, &dot, Mode(1), &render);

        let mut image = GrayImage::from_pixel(50, 50, Luma([255]));
        image.put_pixel(12, 30, Luma([0]));
        let reference = prepare_reference(&image, &render, ReferenceOptions::default());

        // Both stay a small dot at the center rather than filling the canvas.
        for mask in [&rendered, &reference] {
            let count = mask.foreground_count();
            assert!(count > 0 && count <= 4, "{count} foreground cells");
            assert!(*mask.get(39, 39).unwrap() || *mask.get(40, 40).unwrap());
        }
    }

    #[test]
    fn test_contrast_stretch_recovers_faint_scan() {
        // Faint gray strokes that fall above the threshold without stretching.
        let mut image = GrayImage::from_pixel(20, 20, Luma([245]));
        for y in 5..15 {
            image.put_pixel(10, y, Luma([200]));
        }
        let render = RenderConfig::with_side_length(20);

        let plain = prepare_reference(&image, &render, ReferenceOptions::default());
        assert_eq!(plain.foreground_count(), 0);

        let stretched = prepare_reference(
            &image,
            &render,
            ReferenceOptions {
                enhance_contrast: true,
                ..Default::default()
            },
        );
        assert!(stretched.foreground_count() > 0);
    }

    #[test]
    fn test_grayscale_reference_range() {
        let mut image = GrayImage::from_pixel(10, 10, Luma([255]));
        image.put_pixel(5, 5, Luma([0]));
        let reference = prepare_grayscale_reference(&image, &RenderConfig::with_side_length(16));
        assert!(reference.cells().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(reference.cells().iter().any(|&v| v < 0.5));
    }
}
