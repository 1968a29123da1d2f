//! Normalized-difference spectral indices
//!
//! NDVI, NDBI, NDMI and MNDWI computed from the two-band exports the
//! catalog crate writes. Each index fixes which sensor band sits in file
//! band 1 and band 2 (see [`SpectralIndex::band_layout`]).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;
use urbanlens_core::io::read_geotiff_bands;
use urbanlens_core::raster::Raster;
use urbanlens_core::{Error, Result};

use crate::maybe_rayon::*;

/// Sensor bands used by the indices and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralBand {
    Blue,
    Green,
    Red,
    Nir,
    /// Shortwave infrared, ~1.6 µm
    Swir,
}

impl SpectralBand {
    /// Sentinel-2 MSI band name
    pub fn sentinel2(&self) -> &'static str {
        match self {
            SpectralBand::Blue => "B2",
            SpectralBand::Green => "B3",
            SpectralBand::Red => "B4",
            SpectralBand::Nir => "B8",
            SpectralBand::Swir => "B11",
        }
    }

    /// Asset key of the band in Earth Search `sentinel-2-l2a` items
    pub fn asset_key(&self) -> &'static str {
        match self {
            SpectralBand::Blue => "blue",
            SpectralBand::Green => "green",
            SpectralBand::Red => "red",
            SpectralBand::Nir => "nir",
            SpectralBand::Swir => "swir16",
        }
    }
}

impl fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpectralBand::Blue => "Blue",
            SpectralBand::Green => "Green",
            SpectralBand::Red => "Red",
            SpectralBand::Nir => "NIR",
            SpectralBand::Swir => "SWIR",
        };
        write!(f, "{} ({})", name, self.sentinel2())
    }
}

/// Supported normalized-difference indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Normalized Difference Moisture Index
    Ndmi,
    /// Modified Normalized Difference Water Index (Xu, 2006)
    Mndwi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 4] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Ndbi,
        SpectralIndex::Ndmi,
        SpectralIndex::Mndwi,
    ];

    /// Lowercase name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Ndbi => "ndbi",
            SpectralIndex::Ndmi => "ndmi",
            SpectralIndex::Mndwi => "mndwi",
        }
    }

    /// Uppercase label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndbi => "NDBI",
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Mndwi => "MNDWI",
        }
    }

    /// Formula in terms of band names
    pub fn formula(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "(NIR - Red) / (NIR + Red)",
            SpectralIndex::Ndbi => "(SWIR - NIR) / (SWIR + NIR)",
            SpectralIndex::Ndmi => "(NIR - SWIR) / (NIR + SWIR)",
            SpectralIndex::Mndwi => "(Green - SWIR) / (Green + SWIR)",
        }
    }

    /// Bands stored as (file band 1, file band 2) in an export for this index
    pub fn band_layout(&self) -> (SpectralBand, SpectralBand) {
        match self {
            SpectralIndex::Ndvi => (SpectralBand::Red, SpectralBand::Nir),
            SpectralIndex::Ndbi | SpectralIndex::Ndmi => (SpectralBand::Swir, SpectralBand::Nir),
            SpectralIndex::Mndwi => (SpectralBand::Green, SpectralBand::Swir),
        }
    }

    /// Compute the index from file bands 1 and 2, in [`band_layout`](Self::band_layout) order.
    pub fn compute(
        &self,
        band1: &Raster<f64>,
        band2: &Raster<f64>,
        guard: ZeroGuard,
    ) -> Result<Raster<f64>> {
        match self {
            SpectralIndex::Ndvi => ndvi(band2, band1, guard),
            SpectralIndex::Ndbi => ndbi(band1, band2, guard),
            SpectralIndex::Ndmi => ndmi(band2, band1, guard),
            SpectralIndex::Mndwi => mndwi(band1, band2, guard),
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        SpectralIndex::ALL
            .into_iter()
            .find(|i| i.name() == lower)
            .ok_or_else(|| Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected one of ndvi, ndbi, ndmi, mndwi".into(),
            })
    }
}

/// Handling of a zero denominator `a + b == 0`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZeroGuard {
    /// The pixel becomes NaN
    #[default]
    Nodata,
    /// The denominator is replaced by the given value
    Epsilon(f64),
}

impl ZeroGuard {
    /// Replacement denominator used by the exploratory notebooks
    pub const NOTEBOOK_EPSILON: f64 = 1e-4;

    pub fn epsilon() -> Self {
        ZeroGuard::Epsilon(Self::NOTEBOOK_EPSILON)
    }
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Pixels where either band is nodata are NaN. A zero denominator is
/// handled by `guard`. Finite results outside [-1, 1] are masked to NaN.
pub fn normalized_difference(
    band_a: &Raster<f64>,
    band_b: &Raster<f64>,
    guard: ZeroGuard,
) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if is_nodata_f64(a, nodata_a) || is_nodata_f64(b, nodata_b) {
                    continue;
                }

                let mut sum = a + b;
                if sum.abs() < 1e-10 {
                    match guard {
                        ZeroGuard::Nodata => continue,
                        ZeroGuard::Epsilon(e) => sum = e,
                    }
                }

                let value = (a - b) / sum;
                if value.is_finite() && (-1.0..=1.0).contains(&value) {
                    row_data[col] = value;
                }
            }
            row_data
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// - Dense vegetation: above 0.6
/// - Sparse vegetation: 0.2 to 0.6
/// - Bare soil, roads, buildings: 0 to 0.2
/// - Water/clouds: negative
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>, guard: ZeroGuard) -> Result<Raster<f64>> {
    normalized_difference(nir, red, guard)
}

/// Normalized Difference Built-up Index
///
/// `NDBI = (SWIR - NIR) / (SWIR + NIR)`
///
/// Concrete and rooftops reflect more SWIR than NIR, so built-up
/// surfaces score high (~0.3 and above).
pub fn ndbi(swir: &Raster<f64>, nir: &Raster<f64>, guard: ZeroGuard) -> Result<Raster<f64>> {
    normalized_difference(swir, nir, guard)
}

/// Normalized Difference Moisture Index
///
/// `NDMI = (NIR - SWIR) / (NIR + SWIR)`
pub fn ndmi(nir: &Raster<f64>, swir: &Raster<f64>, guard: ZeroGuard) -> Result<Raster<f64>> {
    normalized_difference(nir, swir, guard)
}

/// Modified Normalized Difference Water Index (Xu, 2006)
///
/// `MNDWI = (Green - SWIR) / (Green + SWIR)`
///
/// Open water is above ~0.3.
pub fn mndwi(green: &Raster<f64>, swir: &Raster<f64>, guard: ZeroGuard) -> Result<Raster<f64>> {
    normalized_difference(green, swir, guard)
}

/// Read bands 1 and 2 of an exported file and compute `index` from them.
pub fn compute_index_from_file<P: AsRef<Path>>(
    index: SpectralIndex,
    path: P,
    guard: ZeroGuard,
) -> Result<Raster<f64>> {
    let stack = read_geotiff_bands::<f64, _>(path.as_ref())?;
    let (first, second) = index.band_layout();
    debug!(
        path = %path.as_ref().display(),
        bands = stack.len(),
        band1 = %first,
        band2 = %second,
        "computing {}",
        index
    );
    index.compute(stack.band(1)?, stack.band(2)?, guard)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
