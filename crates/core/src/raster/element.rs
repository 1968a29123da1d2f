//! Cell sample types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// A sample type a [`Raster`](crate::Raster) can hold.
///
/// Exported products use `u8` (true color) and `u16` (scaled reflectance,
/// surface temperature DN); derived indices are `f64`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Fill value for cells that have no source sample
    fn default_nodata() -> Self;

    /// NaN always counts as missing; otherwise compare with `nodata`.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    fn is_float() -> bool;

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// `None` when `value` is out of range for this type
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! unsigned_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                0
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_float() -> bool {
                false
            }
        }
    )*};
}

macro_rules! signed_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_float() -> bool {
                false
            }
        }
    )*};
}

macro_rules! float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan() || nodata.map_or(false, |nd| *self == nd)
            }

            fn is_float() -> bool {
                true
            }
        }
    )*};
}

unsigned_element!(u8, u16, u32);
signed_element!(i16, i32);
float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_missing_whatever_the_sentinel() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(0.0)));
        assert!(!0.5f64.is_nodata(Some(f64::NAN)));
        assert!((-9999.0f32).is_nodata(Some(-9999.0)));
    }

    #[test]
    fn exported_bands_use_zero() {
        assert_eq!(u8::default_nodata(), 0);
        assert_eq!(u16::default_nodata(), 0);
        assert!(0u16.is_nodata(Some(0)));
        assert!(!1u16.is_nodata(Some(0)));
        assert!(!0u16.is_nodata(None));
    }

    #[test]
    fn from_f64_rejects_out_of_range() {
        assert_eq!(u8::from_f64(300.0), None);
        assert_eq!(u16::from_f64(512.0), Some(512));
        assert_eq!(u16::from_f64(-1.0), None);
    }
}
