//! Pixel <-> map coordinate mapping

use serde::{Deserialize, Serialize};

/// Six-coefficient affine mapping from `(col, row)` to map `(x, y)`:
///
/// ```text
/// x = origin_x + col * pixel_width  + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Exports are always north-up (no rotation, negative `pixel_height`), but
/// rotated GeoTIFFs read from disk keep their terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Map coordinates of the top-left corner of pixel (0, 0)
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GeoTIFF `ModelPixelScale` (`[sx, sy, sz]`) and the first
    /// `ModelTiepoint` (`[i, j, k, x, y, z]`).
    pub fn from_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        let (&[sx, sy, ..], &[i, j, _, x, y, ..]) = (scale, tiepoint) else {
            return None;
        };
        Some(Self::new(x - i * sx, y + j * sy, sx, -sy))
    }

    /// From a row-major 4x4 GeoTIFF `ModelTransformation` matrix.
    pub fn from_model_transformation(m: &[f64]) -> Option<Self> {
        let &[a, b, _, d, e, f, _, h, ..] = m else {
            return None;
        };
        Some(Self {
            origin_x: d,
            origin_y: h,
            pixel_width: a,
            pixel_height: f,
            row_rotation: b,
            col_rotation: e,
        })
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Center of pixel `(col, row)`
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Top-left corner of pixel `(col, row)`
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Fractional `(col, row)` under `(x, y)`; NaN for a degenerate transform.
    /// Floor the result to get the containing pixel.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Pixel width in map units
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    /// `(min_x, min_y, max_x, max_y)` covered by a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        [(0, 0), (width, 0), (0, height), (width, height)]
            .into_iter()
            .map(|(c, r)| self.pixel_to_geo_corner(c, r))
            .fold(
                (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
                |(x0, y0, x1, y1), (x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
