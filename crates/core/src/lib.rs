//! # urbanlens core
//!
//! Core types and I/O shared by the urbanlens crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `MultiBandRaster<T>`: same-shape bands sharing one georeference
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system identifier
//! - GeoTIFF reading (any band of chunky multi-sample files) and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, MultiBandRaster, Raster, RasterElement, RasterStatistics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};
}
