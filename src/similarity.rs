//! Structural similarity scoring.
//!
//! Frames are compared as small grayscale images. [`scoring_view`] reduces a
//! decoded RGB frame to the fixed scoring resolution; [`StructuralSimilarity`]
//! computes the mean structural similarity (SSIM) of two such views.
//!
//! The SSIM definition follows the common 8-bit convention: uniform 7×7
//! windows, sample covariance, `C1 = (0.01·255)²`, `C2 = (0.03·255)²`, and
//! the mean taken over every window that lies fully inside the image.
//!
//! # Example
//!
//! ```
//! use framelag::{SimilarityScorer, StructuralSimilarity};
//! use image::GrayImage;
//!
//! let a = GrayImage::from_fn(64, 48, |x, y| image::Luma([((x * 3 + y) % 256) as u8]));
//! let score = StructuralSimilarity::new().score(&a, &a.clone())?;
//! assert!((score - 1.0).abs() < 1e-9);
//! # Ok::<(), framelag::FramelagError>(())
//! ```

use image::{GrayImage, Luma, RgbImage, imageops::FilterType};

use crate::error::FramelagError;

const DYNAMIC_RANGE: f64 = 255.0;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Default side length of the SSIM window.
pub const DEFAULT_WINDOW_SIZE: u32 = 7;

/// Scores how structurally similar two grayscale frames are.
///
/// Implementations must be pure: the same inputs always give the same
/// score and no frame history is kept between calls.
pub trait SimilarityScorer: Send + Sync {
    /// Return a score in `[-1, 1]`, where `1.0` means identical structure.
    ///
    /// # Errors
    ///
    /// Returns [`FramelagError::SimilarityError`] if the images differ in
    /// size.
    fn score(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, FramelagError>;
}

/// Mean structural similarity over sliding square windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralSimilarity {
    window_size: u32,
}

impl Default for StructuralSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralSimilarity {
    /// Create a scorer using 7×7 windows.
    pub fn new() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Use `size`×`size` windows. Clamped to at least 2.
    #[must_use]
    pub fn with_window_size(mut self, size: u32) -> Self {
        self.window_size = size.max(2);
        self
    }

    /// The window side length in pixels.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }
}

impl SimilarityScorer for StructuralSimilarity {
    fn score(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, FramelagError> {
        if a.dimensions() != b.dimensions() {
            return Err(FramelagError::SimilarityError {
                left: a.dimensions(),
                right: b.dimensions(),
            });
        }

        let (width, height) = a.dimensions();
        if width == 0 || height == 0 {
            return Ok(1.0);
        }

        // Images smaller than one window are scored as a single window.
        let (window_w, window_h) = if width < self.window_size || height < self.window_size {
            (width as usize, height as usize)
        } else {
            (self.window_size as usize, self.window_size as usize)
        };

        let tables = MomentTables::build(a.as_raw(), b.as_raw(), width as usize, height as usize);

        let samples = (window_w * window_h) as f64;
        let covariance_norm = if samples > 1.0 {
            samples / (samples - 1.0)
        } else {
            1.0
        };
        let c1 = (K1 * DYNAMIC_RANGE).powi(2);
        let c2 = (K2 * DYNAMIC_RANGE).powi(2);

        let rows = height as usize - window_h + 1;
        let columns = width as usize - window_w + 1;
        let mut total = 0.0;

        for row in 0..rows {
            for column in 0..columns {
                let m = tables.window(column, row, window_w, window_h);
                let ux = m.x / samples;
                let uy = m.y / samples;
                let vx = covariance_norm * (m.xx / samples - ux * ux);
                let vy = covariance_norm * (m.yy / samples - uy * uy);
                let vxy = covariance_norm * (m.xy / samples - ux * uy);

                let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                total += numerator / denominator;
            }
        }

        Ok((total / (rows * columns) as f64).clamp(-1.0, 1.0))
    }
}

/// Reduce a decoded frame to the single-channel view used for scoring.
///
/// The frame is resized to exactly `width`×`height` (aspect ratio is not
/// preserved) and converted to BT.601 luma, `0.299 R + 0.587 G + 0.114 B`
/// rounded to the nearest integer.
pub fn scoring_view(frame: &RgbImage, width: u32, height: u32) -> GrayImage {
    if frame.dimensions() == (width, height) {
        bt601_luma(frame)
    } else {
        let resized = image::imageops::resize(frame, width, height, FilterType::Triangle);
        bt601_luma(&resized)
    }
}

fn bt601_luma(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
        Luma([((weighted + 500) / 1000) as u8])
    })
}

/// Raw window sums of `x`, `y`, `x²`, `y²` and `x·y`.
struct WindowMoments {
    x: f64,
    y: f64,
    xx: f64,
    yy: f64,
    xy: f64,
}

/// Summed-area tables for the five moments, each `(w + 1) × (h + 1)`.
struct MomentTables {
    stride: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    xx: Vec<f64>,
    yy: Vec<f64>,
    xy: Vec<f64>,
}

impl MomentTables {
    fn build(a: &[u8], b: &[u8], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let len = stride * (height + 1);
        let mut tables = Self {
            stride,
            x: vec![0.0; len],
            y: vec![0.0; len],
            xx: vec![0.0; len],
            yy: vec![0.0; len],
            xy: vec![0.0; len],
        };

        for row in 0..height {
            let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for column in 0..width {
                let pa = a[row * width + column] as f64;
                let pb = b[row * width + column] as f64;
                sx += pa;
                sy += pb;
                sxx += pa * pa;
                syy += pb * pb;
                sxy += pa * pb;

                let above = row * stride + column + 1;
                let here = (row + 1) * stride + column + 1;
                tables.x[here] = tables.x[above] + sx;
                tables.y[here] = tables.y[above] + sy;
                tables.xx[here] = tables.xx[above] + sxx;
                tables.yy[here] = tables.yy[above] + syy;
                tables.xy[here] = tables.xy[above] + sxy;
            }
        }

        tables
    }

    fn window(&self, column: usize, row: usize, w: usize, h: usize) -> WindowMoments {
        let top_left = row * self.stride + column;
        let top_right = top_left + w;
        let bottom_left = (row + h) * self.stride + column;
        let bottom_right = bottom_left + w;
        let sum = |table: &[f64]| {
            table[bottom_right] - table[top_right] - table[bottom_left] + table[top_left]
        };

        WindowMoments {
            x: sum(&self.x),
            y: sum(&self.y),
            xx: sum(&self.xx),
            yy: sum(&self.yy),
            xy: sum(&self.xy),
        }
    }
}
