//! Land surface temperature (LST) from thermal band exports
//!
//! Exports store temperature as `u16` tenths of a degree Celsius with 0 as
//! no-data. Landsat Collection-2 Level-2 `ST_B10` digital numbers are
//! converted with the USGS scale and offset before encoding.

use tracing::{debug, warn};
use urbanlens_core::raster::Raster;

/// Landsat C2 L2 surface temperature scale (K per DN)
pub const LANDSAT_ST_SCALE: f64 = 0.003_418_02;
/// Landsat C2 L2 surface temperature offset (K)
pub const LANDSAT_ST_OFFSET: f64 = 149.0;
const KELVIN_OFFSET: f64 = 273.15;

/// How raw exported samples turn into degrees Celsius
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalDecode {
    /// Multiplier from stored value to °C
    pub scale: f64,
    /// Raw values treated as no-data
    pub nodata_values: Vec<f64>,
    /// Fallback path: raw values at or above this are no-data
    pub fallback_ceiling: f64,
}

impl Default for ThermalDecode {
    fn default() -> Self {
        Self {
            scale: 0.1,
            nodata_values: vec![0.0, 65535.0],
            fallback_ceiling: 60000.0,
        }
    }
}

/// Decoded temperature raster
#[derive(Debug, Clone)]
pub struct LstRaster {
    /// °C, NaN where no-data
    pub celsius: Raster<f64>,
    /// Number of finite pixels
    pub valid_count: usize,
    /// Whether the fallback mask (0 or >= ceiling) produced the result
    pub used_fallback: bool,
}

impl LstRaster {
    /// Finite (min, max) in °C
    pub fn range(&self) -> Option<(f64, f64)> {
        finite_range(&self.celsius)
    }
}

/// Decode a raw thermal export to °C.
///
/// Values listed in `nodata_values` (and NaN) become NaN, the rest are
/// multiplied by `scale`. When no valid pixel remains, the raster is
/// decoded again masking only 0 and values `>= fallback_ceiling`.
pub fn decode_lst(raw: &Raster<f64>, decode: &ThermalDecode) -> LstRaster {
    let primary = raw.map(|v| {
        if v.is_nan() || decode.nodata_values.iter().any(|nd| v == *nd) {
            f64::NAN
        } else {
            v * decode.scale
        }
    });
    let valid = count_finite(&primary);
    if valid > 0 {
        debug!(valid, "decoded temperature");
        return finish(primary, valid, false);
    }

    warn!("no valid temperature data after masking no-data values, retrying with fallback mask");
    let fallback = raw.map(|v| {
        if v.is_nan() || v == 0.0 || v >= decode.fallback_ceiling {
            f64::NAN
        } else {
            v * decode.scale
        }
    });
    let valid = count_finite(&fallback);
    finish(fallback, valid, true)
}

fn finish(mut celsius: Raster<f64>, valid_count: usize, used_fallback: bool) -> LstRaster {
    celsius.set_nodata(Some(f64::NAN));
    LstRaster {
        celsius,
        valid_count,
        used_fallback,
    }
}

/// Landsat C2 L2 `ST_B10` digital number to °C
pub fn landsat_st_to_celsius(dn: f64) -> f64 {
    dn * LANDSAT_ST_SCALE + LANDSAT_ST_OFFSET - KELVIN_OFFSET
}

/// Encode °C as tenths of a degree in a `u16`.
///
/// Non-finite input encodes to 0 (no-data). Valid temperatures are clamped
/// to `1..=65534` so they never collide with either no-data value.
pub fn encode_deci_celsius(celsius: f64) -> u16 {
    if !celsius.is_finite() {
        return 0;
    }
    (celsius * 10.0).round().clamp(1.0, 65534.0) as u16
}

fn count_finite(r: &Raster<f64>) -> usize {
    r.data().iter().filter(|v| v.is_finite()).count()
}

fn finite_range(r: &Raster<f64>) -> Option<(f64, f64)> {
    r.data()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_masks_nodata() {
        let raw = Raster::from_vec(vec![0.0, 315.0, 65535.0, 402.0], 2, 2).unwrap();
        let lst = decode_lst(&raw, &ThermalDecode::default());

        assert!(!lst.used_fallback);
        assert_eq!(lst.valid_count, 2);
        assert!(lst.celsius.get(0, 0).unwrap().is_nan());
        assert_relative_eq!(lst.celsius.get(0, 1).unwrap(), 31.5, epsilon = 1e-9);
        assert!(lst.celsius.get(1, 0).unwrap().is_nan());
        let (lo, hi) = lst.range().unwrap();
        assert_relative_eq!(lo, 31.5, epsilon = 1e-9);
        assert_relative_eq!(hi, 40.2, epsilon = 1e-9);
    }

    #[test]
    fn test_fallback_when_nothing_valid() {
        // Every value hits a no-data entry of the primary mask
        let decode = ThermalDecode {
            nodata_values: vec![0.0, 300.0, 61000.0],
            ..ThermalDecode::default()
        };
        let raw = Raster::from_vec(vec![300.0, 300.0, 0.0, 61000.0], 2, 2).unwrap();
        let lst = decode_lst(&raw, &decode);

        // 300 is recovered; 0 and values at or above the ceiling stay masked
        assert!(lst.used_fallback);
        assert_eq!(lst.valid_count, 2);
        assert_relative_eq!(lst.celsius.get(0, 0).unwrap(), 30.0, epsilon = 1e-9);
        assert_relative_eq!(lst.celsius.get(0, 1).unwrap(), 30.0, epsilon = 1e-9);
        assert!(lst.celsius.get(1, 0).unwrap().is_nan());
        assert!(lst.celsius.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_all_nodata_stays_empty() {
        let raw = Raster::from_vec(vec![0.0; 4], 2, 2).unwrap();
        let lst = decode_lst(&raw, &ThermalDecode::default());
        assert!(lst.used_fallback);
        assert_eq!(lst.valid_count, 0);
        assert!(lst.range().is_none());
    }

    #[test]
    fn test_landsat_conversion() {
        // 44_000 DN ≈ 26.24 °C
        let c = landsat_st_to_celsius(44_000.0);
        assert_relative_eq!(c, 44_000.0 * 0.00341802 + 149.0 - 273.15, epsilon = 1e-9);
        assert!(c > 25.0 && c < 27.0);
    }

    #[test]
    fn test_encode_deci_celsius() {
        assert_eq!(encode_deci_celsius(31.54), 315);
        assert_eq!(encode_deci_celsius(f64::NAN), 0);
        assert_eq!(encode_deci_celsius(-5.0), 1);
        assert_eq!(encode_deci_celsius(1e6), 65534);
    }
}
