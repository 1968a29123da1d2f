//! # urbanlens algorithms
//!
//! Per-pixel analysis of exported study-area imagery.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: Spectral indices, land surface temperature, reflectance
//!   scaling, change detection, index classes
//! - **statistics**: NaN-aware summaries, two-date comparison, raw diagnostics

pub mod imagery;
pub mod statistics;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        class_fractions, compute_index_from_file, decode_lst, mndwi, ndbi, ndmi, ndvi,
        normalized_difference, raster_difference, reflectance_to_u8, RasterDiffParams,
        SpectralBand, SpectralIndex, ThermalDecode, ZeroGuard,
    };
    pub use crate::statistics::{compare_means, shared_range, summarize, SummaryStats};
    pub use urbanlens_core::prelude::*;
}
