//! NaN-aware summary statistics

use std::fmt;

use serde::Serialize;
use urbanlens_core::raster::Raster;

/// Statistics over the valid (finite, non-nodata) cells of a raster.
///
/// `min`, `max`, `mean` and `std_dev` are NaN when no cell is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub nodata_count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl SummaryStats {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Share of valid cells
    pub fn valid_fraction(&self) -> f64 {
        let total = self.count + self.nodata_count;
        if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64
        }
    }
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:.4} max={:.4} mean={:.4} std={:.4} valid={} nodata={}",
            self.min, self.max, self.mean, self.std_dev, self.count, self.nodata_count
        )
    }
}

/// Summarize a raster, skipping NaN and the raster's nodata value.
pub fn summarize(raster: &Raster<f64>) -> SummaryStats {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut mean = 0.0;
    let mut m2 = 0.0;

    // Welford's online variance
    for v in raster.valid_values().filter(|v| v.is_finite()) {
        count += 1;
        min = min.min(v);
        max = max.max(v);
        let delta = v - mean;
        mean += delta / count as f64;
        m2 += delta * (v - mean);
    }

    if count == 0 {
        return SummaryStats {
            count: 0,
            nodata_count: raster.len(),
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std_dev: f64::NAN,
        };
    }

    SummaryStats {
        count,
        nodata_count: raster.len() - count,
        min,
        max,
        mean,
        std_dev: (m2 / count as f64).sqrt(),
    }
}

/// Means of two dates and their difference
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanComparison {
    pub before: f64,
    pub after: f64,
    /// `after - before`
    pub change: f64,
}

pub fn compare_means(before: &Raster<f64>, after: &Raster<f64>) -> MeanComparison {
    let before = summarize(before).mean;
    let after = summarize(after).mean;
    MeanComparison {
        before,
        after,
        change: after - before,
    }
}

/// Combined finite (min, max) of two rasters, for a shared colour scale.
pub fn shared_range(a: &Raster<f64>, b: &Raster<f64>) -> Option<(f64, f64)> {
    let sa = summarize(a);
    let sb = summarize(b);
    match (sa.is_empty(), sb.is_empty()) {
        (true, true) => None,
        (false, true) => Some((sa.min, sa.max)),
        (true, false) => Some((sb.min, sb.max)),
        (false, false) => Some((sa.min.min(sb.min), sa.max.max(sb.max))),
    }
}
