//! End-to-end analysis over exported files: two dates, one study area.
//!
//! Files are written with the same writers the export pipeline uses, then
//! read back through the public analysis entry points.

use approx::assert_relative_eq;
use tempfile::TempDir;
use urbanlens_algorithms::imagery::{
    class_fractions, compute_index_from_file, decode_lst, raster_difference, summarize_change,
    RasterDiffParams, SpectralIndex, ThermalDecode, ZeroGuard,
};
use urbanlens_algorithms::statistics::{compare_means, diagnose, shared_range, summarize};
use urbanlens_core::io::{read_geotiff, write_multiband_u16, write_u16};
use urbanlens_core::{GeoTransform, MultiBandRaster, Raster, CRS};

const ROWS: usize = 8;
const COLS: usize = 8;

fn georeferenced(values: Vec<u16>) -> Raster<u16> {
    let mut r = Raster::from_vec(values, ROWS, COLS).unwrap();
    r.set_transform(GeoTransform::new(716_420.0, 3_152_310.0, 10.0, -10.0));
    r.set_crs(Some(CRS::utm(43, true)));
    r.set_nodata(Some(0));
    r
}

/// Red/NIR export where the outer ring is outside the study polygon (0)
fn red_nir_export(dir: &TempDir, name: &str, nir_level: u16) -> std::path::PathBuf {
    let mut red = Vec::with_capacity(ROWS * COLS);
    let mut nir = Vec::with_capacity(ROWS * COLS);
    for row in 0..ROWS {
        for col in 0..COLS {
            let edge = row == 0 || col == 0 || row == ROWS - 1 || col == COLS - 1;
            red.push(if edge { 0 } else { 1000 });
            nir.push(if edge { 0 } else { nir_level });
        }
    }
    let path = dir.path().join(name);
    let stack = MultiBandRaster::new(vec![georeferenced(red), georeferenced(nir)]).unwrap();
    write_multiband_u16(&stack, &path, None).unwrap();
    path
}

#[test]
fn ndvi_two_dates() {
    let dir = tempfile::tempdir().unwrap();
    let before = red_nir_export(&dir, "sector14_2020-01-30.tif", 3000);
    let after = red_nir_export(&dir, "sector14_2025-01-28.tif", 1500);

    let ndvi_before =
        compute_index_from_file(SpectralIndex::Ndvi, &before, ZeroGuard::Nodata).unwrap();
    let ndvi_after =
        compute_index_from_file(SpectralIndex::Ndvi, &after, ZeroGuard::Nodata).unwrap();

    let stats = summarize(&ndvi_before);
    assert_eq!(stats.count, 36);
    assert_eq!(stats.nodata_count, 28);
    assert_relative_eq!(stats.mean, 0.5, epsilon = 1e-9);

    let cmp = compare_means(&ndvi_before, &ndvi_after);
    assert_relative_eq!(cmp.after, 0.2, epsilon = 1e-9);
    assert_relative_eq!(cmp.change, -0.3, epsilon = 1e-9);

    let fractions = class_fractions(&ndvi_after, SpectralIndex::Ndvi).unwrap();
    // 0.2 is still "bare soil / built-up"
    assert_eq!(fractions[1].count, 36);

    let (_, cats) =
        raster_difference(&ndvi_before, &ndvi_after, RasterDiffParams::default()).unwrap();
    let change = summarize_change(&cats);
    assert_relative_eq!(change.decrease, 1.0);
    assert_eq!(ndvi_after.crs().and_then(|c| c.epsg()), Some(32643));
}

#[test]
fn file_nodata_masks_ring_under_epsilon_guard() {
    let dir = tempfile::tempdir().unwrap();
    let path = red_nir_export(&dir, "sector14_2023-12-05.tif", 3000);

    // The file nodata masks the zero ring regardless of the guard
    let ndvi =
        compute_index_from_file(SpectralIndex::Ndvi, &path, ZeroGuard::epsilon()).unwrap();
    assert_eq!(summarize(&ndvi).count, 36);
}

#[test]
fn lst_two_dates() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (name, level) in [("lst_2022-01-30.tif", 185u16), ("lst_2025-01-29.tif", 215u16)] {
        let values: Vec<u16> = (0..ROWS * COLS)
            .map(|i| if i % 9 == 0 { 0 } else { level + (i % 5) as u16 })
            .collect();
        let path = dir.path().join(name);
        write_u16(&georeferenced(values), &path, None).unwrap();
        paths.push(path);
    }

    let raw_before: Raster<f64> = read_geotiff(&paths[0], None).unwrap();
    let diag = diagnose(&raw_before);
    assert_eq!(diag.zero_count, 8);
    assert_relative_eq!(diag.raw_min, 0.0);

    let decode = ThermalDecode::default();
    let before = decode_lst(&raw_before, &decode);
    let after = decode_lst(&read_geotiff(&paths[1], None).unwrap(), &decode);
    assert!(!before.used_fallback);
    assert_eq!(before.valid_count, 56);

    let (lo, hi) = shared_range(&before.celsius, &after.celsius).unwrap();
    assert_relative_eq!(lo, 18.5, epsilon = 1e-9);
    assert_relative_eq!(hi, 21.9, epsilon = 1e-9);
}
