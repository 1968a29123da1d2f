//! Scalar raster to RGBA pixels.

use crate::scheme::ColorScheme;
use urbanlens_core::raster::{Raster, RasterElement};

/// Light grey used for pixels outside the study area
pub const NEUTRAL_NODATA: [u8; 4] = [220, 220, 220, 255];

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// A scheme stretched over `[min, max]`
#[derive(Debug, Clone)]
pub struct ColormapParams {
    pub scheme: ColorScheme,
    pub min: f64,
    pub max: f64,
    /// RGBA for no-data cells, transparent unless set
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    /// `scheme` over [0, 1]
    pub fn new(scheme: ColorScheme) -> Self {
        Self::with_range(scheme, 0.0, 1.0)
    }

    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            nodata_color: TRANSPARENT,
        }
    }

    pub fn with_nodata_color(self, rgba: [u8; 4]) -> Self {
        Self {
            nodata_color: rgba,
            ..self
        }
    }

    /// Widen the range to `[-m, m]` with `m` the larger bound magnitude, so
    /// zero sits at the middle of a divergent ramp.
    pub fn symmetric(self) -> Self {
        let m = self.min.abs().max(self.max.abs());
        let m = if m > 0.0 { m } else { 1.0 };
        Self {
            min: -m,
            max: m,
            ..self
        }
    }

    /// Position of `v` along the ramp; a degenerate range maps everything to 0.
    pub fn normalize(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span.abs() <= f64::EPSILON {
            0.0
        } else {
            (v - self.min) / span
        }
    }

    pub fn color_of(&self, v: f64) -> [u8; 4] {
        if v.is_finite() {
            self.scheme.color_at(self.normalize(v)).to_rgba(255)
        } else {
            self.nodata_color
        }
    }
}

/// Stretch `scheme` over the finite valid range of `raster`.
///
/// With no valid cells the range is [0, 1]; a constant raster `v` gets
/// [v, v + 1].
pub fn auto_params<T: RasterElement>(raster: &Raster<T>, scheme: ColorScheme) -> ColormapParams {
    let range = raster
        .valid_values()
        .filter_map(RasterElement::to_f64)
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| {
            Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
        });

    match range {
        None => ColormapParams::new(scheme),
        Some((lo, hi)) if hi - lo <= f64::EPSILON => {
            ColormapParams::with_range(scheme, lo, lo + 1.0)
        }
        Some((lo, hi)) => ColormapParams::with_range(scheme, lo, hi),
    }
}

/// Row-major RGBA bytes (`rows * cols * 4`). Cells equal to the raster's
/// nodata value, and non-finite cells, get `params.nodata_color`.
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let nodata = raster.nodata();
    raster
        .data()
        .iter()
        .flat_map(|v| match v.to_f64() {
            Some(x) if !v.is_nodata(nodata) => params.color_of(x),
            _ => params.nodata_color,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndvi_on_grayscale() {
        let r = Raster::from_vec(vec![-1.0, 0.0, 1.0, f64::NAN], 2, 2).unwrap();
        let params = ColormapParams::with_range(ColorScheme::Grayscale, -1.0, 1.0);
        let rgba = raster_to_rgba(&r, &params);
        assert_eq!(
            rgba,
            [0, 0, 0, 255, 128, 128, 128, 255, 255, 255, 255, 255, 0, 0, 0, 0]
        );
    }

    #[test]
    fn zero_nodata_in_temperature_export() {
        let mut r = Raster::from_vec(vec![0u16, 300], 1, 2).unwrap();
        r.set_nodata(Some(0));
        let params = ColormapParams::with_range(ColorScheme::Inferno, 250.0, 350.0)
            .with_nodata_color(NEUTRAL_NODATA);
        let rgba = raster_to_rgba(&r, &params);
        assert_eq!(&rgba[..4], &NEUTRAL_NODATA);
        assert_eq!(&rgba[4..], &ColorScheme::Inferno.color_at(0.5).to_rgba(255));
    }

    #[test]
    fn auto_range_from_valid_cells() {
        let r = Raster::from_vec(vec![28.5, f64::NAN, 41.0], 1, 3).unwrap();
        let params = auto_params(&r, ColorScheme::Inferno);
        assert_eq!((params.min, params.max), (28.5, 41.0));

        let empty = Raster::filled(1, 2, f64::NAN);
        let params = auto_params(&empty, ColorScheme::Inferno);
        assert_eq!((params.min, params.max), (0.0, 1.0));

        let flat = Raster::<f64>::filled(2, 2, 42.0);
        let params = auto_params(&flat, ColorScheme::Inferno);
        assert_eq!((params.min, params.max), (42.0, 43.0));
    }

    #[test]
    fn symmetric_range_centres_zero() {
        let params = ColormapParams::with_range(ColorScheme::Divergent, -0.2, 0.5).symmetric();
        assert_eq!((params.min, params.max), (-0.5, 0.5));
        assert_eq!(params.normalize(0.0), 0.5);

        let flat = ColormapParams::with_range(ColorScheme::Divergent, 0.0, 0.0).symmetric();
        assert_eq!((flat.min, flat.max), (-1.0, 1.0));
    }
}
