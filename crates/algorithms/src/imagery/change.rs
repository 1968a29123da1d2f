//! Two-date change between index or temperature rasters

use ndarray::Array2;
use urbanlens_core::raster::Raster;
use urbanlens_core::{Error, Result};

use crate::maybe_rayon::*;

/// Thresholds for raster difference classification
#[derive(Debug, Clone, Copy)]
pub struct RasterDiffParams {
    /// `after - before` below this is a decrease
    pub decrease_threshold: f64,
    /// `after - before` above this is an increase
    pub increase_threshold: f64,
}

impl RasterDiffParams {
    /// Symmetric thresholds `-t` / `+t`
    pub fn symmetric(t: f64) -> Self {
        Self {
            decrease_threshold: -t.abs(),
            increase_threshold: t.abs(),
        }
    }
}

impl Default for RasterDiffParams {
    /// ±0.1, a meaningful step for normalized-difference indices
    fn default() -> Self {
        Self::symmetric(0.1)
    }
}

pub const CHANGE_DECREASE: f64 = 1.0;
pub const CHANGE_NO_CHANGE: f64 = 2.0;
pub const CHANGE_INCREASE: f64 = 3.0;

/// Compute raster difference with change categories.
///
/// `diff = after - before`
///
/// Output categories:
/// - 1.0 = decrease (diff < decrease_threshold)
/// - 2.0 = no significant change
/// - 3.0 = increase (diff > increase_threshold)
///
/// NaN in either input yields NaN in both outputs.
pub fn raster_difference(
    before: &Raster<f64>,
    after: &Raster<f64>,
    params: RasterDiffParams,
) -> Result<(Raster<f64>, Raster<f64>)> {
    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: after.rows(),
            ac: after.cols(),
        });
    }

    let (diff_data, cat_data): (Vec<f64>, Vec<f64>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };

                if b.is_nan() || a.is_nan() {
                    out.push((f64::NAN, f64::NAN));
                    continue;
                }
                let d = a - b;
                let cat = if d < params.decrease_threshold {
                    CHANGE_DECREASE
                } else if d > params.increase_threshold {
                    CHANGE_INCREASE
                } else {
                    CHANGE_NO_CHANGE
                };
                out.push((d, cat));
            }
            out
        })
        .unzip();

    Ok((
        with_data(before, rows, cols, diff_data)?,
        with_data(before, rows, cols, cat_data)?,
    ))
}

/// Share of valid pixels per change category
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChangeSummary {
    pub decrease: f64,
    pub no_change: f64,
    pub increase: f64,
    pub valid_count: usize,
}

/// Summarize a category raster produced by [`raster_difference`].
pub fn summarize_change(categories: &Raster<f64>) -> ChangeSummary {
    let mut counts = [0usize; 3];
    for &c in categories.data().iter() {
        if c == CHANGE_DECREASE {
            counts[0] += 1;
        } else if c == CHANGE_NO_CHANGE {
            counts[1] += 1;
        } else if c == CHANGE_INCREASE {
            counts[2] += 1;
        }
    }
    let valid: usize = counts.iter().sum();
    if valid == 0 {
        return ChangeSummary::default();
    }
    let share = |n: usize| n as f64 / valid as f64;
    ChangeSummary {
        decrease: share(counts[0]),
        no_change: share(counts[1]),
        increase: share(counts[2]),
        valid_count: valid,
    }
}

fn with_data(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut out = template.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(f64::NAN));
    *out.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use urbanlens_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_raster_difference() {
        let before = make_band(5, 5, 0.2);
        let after = make_band(5, 5, 0.45);

        let (diff, cat) = raster_difference(&before, &after, RasterDiffParams::default()).unwrap();
        assert_relative_eq!(diff.get(2, 2).unwrap(), 0.25, epsilon = 1e-10);
        assert_relative_eq!(cat.get(2, 2).unwrap(), CHANGE_INCREASE);
    }

    #[test]
    fn test_raster_difference_decrease() {
        let before = make_band(5, 5, 35.0);
        let after = make_band(5, 5, 28.0);

        let (_, cat) =
            raster_difference(&before, &after, RasterDiffParams::symmetric(5.0)).unwrap();
        assert_relative_eq!(cat.get(2, 2).unwrap(), CHANGE_DECREASE);
    }

    #[test]
    fn test_nan_propagates_and_summary() {
        let mut before = make_band(2, 2, 0.3);
        before.set(0, 0, f64::NAN).unwrap();
        let mut after = make_band(2, 2, 0.3);
        after.set(1, 1, 0.6).unwrap();

        let (diff, cat) = raster_difference(&before, &after, RasterDiffParams::default()).unwrap();
        assert!(diff.get(0, 0).unwrap().is_nan());

        let summary = summarize_change(&cat);
        assert_eq!(summary.valid_count, 3);
        assert_relative_eq!(summary.increase, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.no_change, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.decrease, 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let before = make_band(2, 2, 0.0);
        let after = make_band(3, 2, 0.0);
        assert!(raster_difference(&before, &after, RasterDiffParams::default()).is_err());
    }
}
