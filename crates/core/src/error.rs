//! Core error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoding or encoding failure inside the TIFF container
    #[error("GeoTIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid raster size {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Pixel ({row}, {col}) is outside a {rows}x{cols} raster")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two rasters that must share a grid do not
    #[error("Rasters differ in size: {er}x{ec} vs {ar}x{ac}")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band {band} requested but the file has {count} band(s)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Unsupported sample format: {0}")]
    UnsupportedDataType(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Invalid {name} '{value}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
