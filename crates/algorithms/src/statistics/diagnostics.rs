//! Raw value diagnostics for exported rasters

use std::fmt;

use urbanlens_core::raster::Raster;

const UNIQUE_SAMPLE: usize = 10;

/// What a raw export contains before any decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDiagnostics {
    /// Finite minimum, NaN if none
    pub raw_min: f64,
    /// Finite maximum, NaN if none
    pub raw_max: f64,
    pub rows: usize,
    pub cols: usize,
    /// Smallest distinct finite values, ascending
    pub unique_sample: Vec<f64>,
    pub zero_count: usize,
    pub nonzero_count: usize,
}

pub fn diagnose(raw: &Raster<f64>) -> RasterDiagnostics {
    let (rows, cols) = raw.shape();

    let mut finite: Vec<f64> = raw.data().iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(f64::total_cmp);

    let (raw_min, raw_max) = match (finite.first(), finite.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (f64::NAN, f64::NAN),
    };

    let zero_count = finite.iter().filter(|&&v| v == 0.0).count();
    // NaN compares unequal to zero
    let nonzero_count = raw.len() - zero_count;

    finite.dedup();
    finite.truncate(UNIQUE_SAMPLE);

    RasterDiagnostics {
        raw_min,
        raw_max,
        rows,
        cols,
        unique_sample: finite,
        zero_count,
        nonzero_count,
    }
}

impl fmt::Display for RasterDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Raw data range: {} to {}", self.raw_min, self.raw_max)?;
        writeln!(f, "Raw data shape: ({}, {})", self.rows, self.cols)?;
        writeln!(f, "Unique values sample: {:?}", self.unique_sample)?;
        writeln!(f, "Number of zero values: {}", self.zero_count)?;
        write!(f, "Number of non-zero values: {}", self.nonzero_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diagnose() {
        let values: Vec<f64> = vec![0.0, 0.0, 315.0, 402.0, 315.0, 65535.0];
        let raw = Raster::from_vec(values, 2, 3).unwrap();
        let d = diagnose(&raw);

        assert_relative_eq!(d.raw_min, 0.0);
        assert_relative_eq!(d.raw_max, 65535.0);
        assert_eq!((d.rows, d.cols), (2, 3));
        assert_eq!(d.unique_sample, vec![0.0, 315.0, 402.0, 65535.0]);
        assert_eq!(d.zero_count, 2);
        assert_eq!(d.nonzero_count, 4);
        assert!(d.to_string().contains("Number of zero values: 2"));
    }

    #[test]
    fn test_unique_sample_is_truncated() {
        let raw = Raster::from_vec((0..25).map(|v| v as f64).collect(), 5, 5).unwrap();
        let d = diagnose(&raw);
        assert_eq!(d.unique_sample.len(), 10);
        assert_relative_eq!(d.unique_sample[9], 9.0);
    }
}
