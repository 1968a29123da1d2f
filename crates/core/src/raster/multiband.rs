//! Multi-band raster: same-shape bands sharing one georeference

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};

/// An ordered stack of bands with identical shape.
///
/// Band numbers are 1-based, matching GeoTIFF/GDAL convention. The
/// georeference of the first band is the georeference of the stack.
#[derive(Debug, Clone)]
pub struct MultiBandRaster<T: RasterElement> {
    bands: Vec<Raster<T>>,
}

impl<T: RasterElement> MultiBandRaster<T> {
    /// Build a stack; every band must have the shape of the first one.
    pub fn new(bands: Vec<Raster<T>>) -> Result<Self> {
        let first = bands.first().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "0".into(),
            reason: "a multi-band raster needs at least one band".into(),
        })?;
        let (er, ec) = first.shape();
        if let Some(bad) = bands.iter().find(|b| b.shape() != (er, ec)) {
            let (ar, ac) = bad.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Self { bands })
    }

    /// Band `n` (1-based)
    pub fn band(&self, n: usize) -> Result<&Raster<T>> {
        if n == 0 || n > self.bands.len() {
            return Err(Error::BandOutOfRange {
                band: n,
                count: self.bands.len(),
            });
        }
        Ok(&self.bands[n - 1])
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Shared (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }

    pub fn transform(&self) -> &GeoTransform {
        self.bands[0].transform()
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.bands[0].crs()
    }

    pub fn nodata(&self) -> Option<T> {
        self.bands[0].nodata()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Raster<T>> {
        self.bands.iter()
    }

    pub fn into_bands(self) -> Vec<Raster<T>> {
        self.bands
    }

    /// Pixel-interleaved samples (`r0 g0 b0 r1 g1 b1 ...`) as stored in a
    /// chunky TIFF.
    pub fn interleaved(&self) -> Vec<T> {
        let (rows, cols) = self.shape();
        let mut out = Vec::with_capacity(rows * cols * self.bands.len());
        for row in 0..rows {
            for col in 0..cols {
                for band in &self.bands {
                    out.push(band.data()[(row, col)]);
                }
            }
        }
        out
    }
}
