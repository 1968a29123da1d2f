//! Interpretation classes for index values and generic reclassification

use ndarray::Array2;
use urbanlens_core::raster::Raster;
use urbanlens_core::{Error, Result};

use super::indices::SpectralIndex;
use crate::maybe_rayon::*;

/// A reclassification entry mapping an input range to an output value
#[derive(Debug, Clone)]
pub struct ReclassEntry {
    /// Minimum value (inclusive)
    pub min: f64,
    /// Maximum value (exclusive unless `include_max`, or the last class)
    pub max: f64,
    pub include_max: bool,
    /// Output value for this class
    pub value: f64,
}

impl ReclassEntry {
    /// `[min, max)`
    pub fn new(min: f64, max: f64, value: f64) -> Self {
        Self {
            min,
            max,
            include_max: false,
            value,
        }
    }

    /// `[min, max]`
    pub fn closed(min: f64, max: f64, value: f64) -> Self {
        Self {
            include_max: true,
            ..Self::new(min, max, value)
        }
    }

    fn contains(&self, val: f64) -> bool {
        val >= self.min && (val < self.max || (self.include_max && val <= self.max))
    }
}

/// Parameters for reclassification
#[derive(Debug, Clone)]
pub struct ReclassifyParams {
    /// Reclassification table, sorted by `min`
    pub classes: Vec<ReclassEntry>,
    /// Value for cells that don't match any class
    pub default_value: f64,
}

impl Default for ReclassifyParams {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            default_value: f64::NAN,
        }
    }
}

/// Reclassify raster values based on a classification table.
///
/// The first entry containing the value wins; the last entry always
/// includes its `max`. NaN and nodata cells stay NaN.
pub fn reclassify(raster: &Raster<f64>, params: &ReclassifyParams) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();
    let classes = &params.classes;
    let default = params.default_value;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let val = unsafe { raster.get_unchecked(row, col) };

                if val.is_nan() || nodata.map_or(false, |nd| (val - nd).abs() < f64::EPSILON) {
                    continue;
                }

                row_data[col] = classify(val, classes).unwrap_or(default);
            }
            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

fn classify(val: f64, classes: &[ReclassEntry]) -> Option<f64> {
    if let Some(entry) = classes.iter().find(|e| e.contains(val)) {
        return Some(entry.value);
    }
    classes
        .last()
        .filter(|last| (val - last.max).abs() < 1e-10)
        .map(|last| last.value)
}

/// One interpretation class of an index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexClass {
    pub name: &'static str,
    /// Inclusive lower bound
    pub min: f64,
    /// Upper bound; the last class always includes 1.0
    pub max: f64,
    pub include_max: bool,
}

/// `[min, max)`
const fn class(name: &'static str, min: f64, max: f64) -> IndexClass {
    IndexClass {
        name,
        min,
        max,
        include_max: false,
    }
}

/// `[min, max]`
const fn up_to(name: &'static str, min: f64, max: f64) -> IndexClass {
    IndexClass {
        name,
        min,
        max,
        include_max: true,
    }
}

const NDVI_CLASSES: [IndexClass; 4] = [
    class("water / clouds", -1.0, 0.0),
    up_to("bare soil / built-up", 0.0, 0.2),
    up_to("sparse vegetation", 0.2, 0.6),
    class("dense vegetation", 0.6, 1.0),
];

const NDBI_CLASSES: [IndexClass; 3] = [
    class("vegetation / water", -1.0, 0.0),
    class("transitional", 0.0, 0.3),
    class("built-up", 0.3, 1.0),
];

const NDMI_CLASSES: [IndexClass; 3] = [
    class("dry", -1.0, 0.2),
    class("moderate moisture", 0.2, 0.4),
    class("wet", 0.4, 1.0),
];

const MNDWI_CLASSES: [IndexClass; 3] = [
    class("non-water", -1.0, 0.0),
    up_to("uncertain", 0.0, 0.3),
    class("open water", 0.3, 1.0),
];

impl SpectralIndex {
    /// Interpretation classes covering [-1, 1]
    pub fn classes(&self) -> &'static [IndexClass] {
        match self {
            SpectralIndex::Ndvi => &NDVI_CLASSES,
            SpectralIndex::Ndbi => &NDBI_CLASSES,
            SpectralIndex::Ndmi => &NDMI_CLASSES,
            SpectralIndex::Mndwi => &MNDWI_CLASSES,
        }
    }

    /// Reclassification table mapping each class to its 1-based position
    pub fn reclassify_params(&self) -> ReclassifyParams {
        ReclassifyParams {
            classes: self
                .classes()
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let value = (i + 1) as f64;
                    if c.include_max {
                        ReclassEntry::closed(c.min, c.max, value)
                    } else {
                        ReclassEntry::new(c.min, c.max, value)
                    }
                })
                .collect(),
            default_value: f64::NAN,
        }
    }
}

/// Share of one class among the valid pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassFraction {
    pub class: IndexClass,
    pub count: usize,
    pub fraction: f64,
}

/// Per-class pixel share of the finite pixels of an index raster.
pub fn class_fractions(raster: &Raster<f64>, index: SpectralIndex) -> Result<Vec<ClassFraction>> {
    let classified = reclassify(raster, &index.reclassify_params())?;
    let classes = index.classes();

    let mut counts = vec![0usize; classes.len()];
    for &v in classified.data().iter() {
        if v.is_finite() {
            counts[v as usize - 1] += 1;
        }
    }
    let total: usize = counts.iter().sum();

    Ok(classes
        .iter()
        .zip(counts)
        .map(|(&class, count)| ClassFraction {
            class,
            count,
            fraction: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reclassify_last_class_inclusive() {
        let raster = Raster::from_vec(vec![-0.5, 0.1, 0.5, 1.0], 2, 2).unwrap();
        let params = ReclassifyParams {
            classes: vec![ReclassEntry::new(-1.0, 0.0, 1.0), ReclassEntry::new(0.0, 1.0, 2.0)],
            default_value: 0.0,
        };
        let out = reclassify(&raster, &params).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(out.get(0, 1).unwrap(), 2.0);
        assert_relative_eq!(out.get(1, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_reclassify_default_and_nan() {
        let raster = Raster::from_vec(vec![5.0, f64::NAN], 1, 2).unwrap();
        let params = ReclassifyParams {
            classes: vec![ReclassEntry::new(0.0, 1.0, 1.0)],
            default_value: -1.0,
        };
        let out = reclassify(&raster, &params).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), -1.0);
        assert!(out.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_class_tables_cover_range() {
        for index in SpectralIndex::ALL {
            let classes = index.classes();
            assert_relative_eq!(classes[0].min, -1.0);
            assert_relative_eq!(classes[classes.len() - 1].max, 1.0);
            for pair in classes.windows(2) {
                assert_relative_eq!(pair[0].max, pair[1].min);
            }
        }
    }

    #[test]
    fn test_ndvi_class_fractions() {
        let ndvi = Raster::from_vec(vec![-0.2, 0.1, 0.3, 0.7, 0.9, f64::NAN], 2, 3).unwrap();
        let fractions = class_fractions(&ndvi, SpectralIndex::Ndvi).unwrap();

        assert_eq!(fractions.len(), 4);
        assert_eq!(fractions[0].count, 1);
        assert_eq!(fractions[3].count, 2);
        assert_relative_eq!(fractions[3].fraction, 0.4, epsilon = 1e-12);
        let total: f64 = fractions.iter().map(|f| f.fraction).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_values() {
        let class_of = |index: SpectralIndex, v: f64| {
            let r = Raster::from_vec(vec![v], 1, 1).unwrap();
            let fractions = class_fractions(&r, index).unwrap();
            fractions.iter().find(|f| f.count == 1).map(|f| f.class.name)
        };
        assert_eq!(class_of(SpectralIndex::Ndvi, 0.0), Some("bare soil / built-up"));
        assert_eq!(class_of(SpectralIndex::Ndvi, 0.2), Some("bare soil / built-up"));
        assert_eq!(class_of(SpectralIndex::Ndvi, 0.6), Some("sparse vegetation"));
        assert_eq!(class_of(SpectralIndex::Ndvi, 1.0), Some("dense vegetation"));
        assert_eq!(class_of(SpectralIndex::Mndwi, 0.3), Some("uncertain"));
        assert_eq!(class_of(SpectralIndex::Mndwi, 0.3001), Some("open water"));
        assert_eq!(class_of(SpectralIndex::Ndbi, 0.3), Some("built-up"));
        assert_eq!(class_of(SpectralIndex::Ndmi, 0.2), Some("moderate moisture"));
    }

    #[test]
    fn test_closed_entry_keeps_its_max() {
        let raster = Raster::from_vec(vec![0.5, 0.50001], 1, 2).unwrap();
        let params = ReclassifyParams {
            classes: vec![ReclassEntry::closed(0.0, 0.5, 1.0), ReclassEntry::new(0.5, 1.0, 2.0)],
            default_value: 0.0,
        };
        let out = reclassify(&raster, &params).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(out.get(0, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_fractions_of_empty_raster() {
        let empty = Raster::filled(2, 2, f64::NAN);
        let fractions = class_fractions(&empty, SpectralIndex::Mndwi).unwrap();
        assert!(fractions.iter().all(|f| f.count == 0 && f.fraction == 0.0));
    }
}
