//! Reflectance scaling for true-colour exports

use urbanlens_core::raster::Raster;

/// Sentinel-2 L2A reflectance quantification value
pub const REFLECTANCE_SCALE: f64 = 1e-4;

/// Surface reflectance DN to an 8-bit display value.
///
/// `dn * 0.0001 * 255`, truncated and clamped to `0..=255`. NaN maps to 0.
pub fn reflectance_to_u8(dn: f64) -> u8 {
    if dn.is_nan() {
        return 0;
    }
    (dn * REFLECTANCE_SCALE * 255.0).trunc().clamp(0.0, 255.0) as u8
}

/// 8-bit display value to `[0, 1]`
pub fn u8_to_unit(v: u8) -> f64 {
    v as f64 / 255.0
}

/// Apply [`reflectance_to_u8`] to a whole band, keeping georeference.
pub fn scale_reflectance(band: &Raster<f64>) -> Raster<u8> {
    band.map(reflectance_to_u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reflectance_to_u8() {
        assert_eq!(reflectance_to_u8(0.0), 0);
        assert_eq!(reflectance_to_u8(1000.0), 25);
        assert_eq!(reflectance_to_u8(10_000.0), 255);
        assert_eq!(reflectance_to_u8(25_000.0), 255);
        assert_eq!(reflectance_to_u8(-50.0), 0);
        assert_eq!(reflectance_to_u8(f64::NAN), 0);
    }

    #[test]
    fn test_u8_to_unit() {
        assert_relative_eq!(u8_to_unit(255), 1.0);
        assert_relative_eq!(u8_to_unit(51), 0.2);
    }
}
