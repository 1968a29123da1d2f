//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, NDBI, NDMI, MNDWI with zero-denominator guards
//! - Thermal: land surface temperature decoding and encoding
//! - Scaling: reflectance to 8-bit display values
//! - Change: two-date difference with categories
//! - Classes: index interpretation classes and reclassification

mod change;
mod classes;
mod indices;
mod scaling;
mod thermal;

pub use change::{
    raster_difference, summarize_change, ChangeSummary, RasterDiffParams, CHANGE_DECREASE,
    CHANGE_INCREASE, CHANGE_NO_CHANGE,
};
pub use classes::{
    class_fractions, reclassify, ClassFraction, IndexClass, ReclassEntry, ReclassifyParams,
};
pub use indices::{
    compute_index_from_file, mndwi, ndbi, ndmi, ndvi, normalized_difference, SpectralBand,
    SpectralIndex, ZeroGuard,
};
pub use scaling::{reflectance_to_u8, scale_reflectance, u8_to_unit, REFLECTANCE_SCALE};
pub use thermal::{
    decode_lst, encode_deci_celsius, landsat_st_to_celsius, LstRaster, ThermalDecode,
    LANDSAT_ST_OFFSET, LANDSAT_ST_SCALE,
};
