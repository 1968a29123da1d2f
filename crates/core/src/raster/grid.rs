//! Georeferenced single-band grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// One band of cells indexed `(row, col)`, north-up, with its georeference.
///
/// Index rasters are `Raster<f64>` with NaN for pixels that carry no value;
/// exported bands are `Raster<u8>` or `Raster<u16>` with 0 as no-data.
///
/// ```ignore
/// use urbanlens_core::Raster;
///
/// let mut ndvi: Raster<f64> = Raster::filled(512, 512, f64::NAN);
/// ndvi.set(10, 20, 0.42)?;
/// assert_eq!(ndvi.get(10, 20)?, 0.42);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster with an identity transform
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Raster from row-major values. Fails if `data.len() != rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// `data` placed on this raster's grid; nodata is left unset.
    fn regridded<U: RasterElement>(&self, data: Array2<U>) -> Raster<U> {
        Raster {
            data,
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    /// Zero-filled raster of another element type on the same georeference
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        self.regridded(Array2::zeros((rows, cols)))
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    /// # Safety
    /// `row < self.rows()` and `col < self.cols()` must hold.
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let err = self.out_of_bounds(row, col);
        let cell = self.data.get_mut((row, col)).ok_or(err)?;
        *cell = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Pixel width in map units
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// `(min_x, min_y, max_x, max_y)` of the outer cell edges
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a cell center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional `(col, row)` of a map coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// NaN (for floats) or equal to this raster's nodata value
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(move |v| !self.is_nodata(*v))
    }

    /// Cell-wise conversion on the same grid. The result has no nodata value;
    /// callers set one if `f` produces a sentinel.
    pub fn map<U: RasterElement, F>(&self, f: F) -> Raster<U>
    where
        F: Fn(T) -> U,
    {
        self.regridded(self.data.mapv(f))
    }

    /// Min, max and mean of the valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut stats = RasterStatistics {
            min: None,
            max: None,
            mean: None,
            valid_count: 0,
            nodata_count: 0,
        };
        let mut sum = 0.0;

        for value in self.valid_values() {
            stats.min = Some(stats.min.map_or(value, |m| if value < m { value } else { m }));
            stats.max = Some(stats.max.map_or(value, |m| if value > m { value } else { m }));
            if let Some(v) = value.to_f64() {
                sum += v;
                stats.valid_count += 1;
            }
        }

        stats.nodata_count = self.len() - stats.valid_count;
        if stats.valid_count > 0 {
            stats.mean = Some(sum / stats.valid_count as f64);
        }
        stats
    }
}

/// Summary of the valid cells of a raster, in its own element type
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
