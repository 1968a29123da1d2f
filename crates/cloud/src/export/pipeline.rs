//! Export pipeline: AOI to native grid, windowed reads, nearest-neighbour
//! resampling, polygon mask, scaling and GeoTIFF output.

use std::fs;
use std::path::PathBuf;

use geo::{BoundingRect, Contains, Point, Polygon};
use tracing::{debug, info};
use urbanlens_algorithms::imagery::{encode_deci_celsius, landsat_st_to_celsius, reflectance_to_u8};
use urbanlens_core::crs::CRS;
use urbanlens_core::io::{write_multiband_u16, write_multiband_u8, GeoTiffOptions, TiffCompression};
use urbanlens_core::raster::{GeoTransform, MultiBandRaster, Raster, RasterElement};

use crate::error::{CloudError, Result};
use crate::export::request::{ExportKind, ExportRequest};
use crate::geometry::BBox;
use crate::range_reader::HttpOptions;
use crate::window::AssetReader;

/// Target grid of an export
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub crs: Option<CRS>,
}

impl GridSpec {
    /// Grid of `scale` cells snapped to multiples of `scale`, covering `bbox`.
    pub fn covering(bbox: &BBox, scale: f64, crs: Option<CRS>) -> Self {
        let origin_x = (bbox.min_x / scale).floor() * scale;
        let origin_y = (bbox.max_y / scale).ceil() * scale;
        let cols = ((bbox.max_x - origin_x) / scale).ceil().max(1.0) as usize;
        let rows = ((origin_y - bbox.min_y) / scale).ceil().max(1.0) as usize;
        Self {
            transform: GeoTransform::new(origin_x, origin_y, scale, -scale),
            rows,
            cols,
            crs,
        }
    }

    pub fn bbox(&self) -> BBox {
        let (a, b, c, d) = self.transform.bounds(self.cols, self.rows);
        BBox::new(a, b, c, d)
    }

    fn empty(&self) -> Raster<f64> {
        let mut r = Raster::filled(self.rows, self.cols, f64::NAN);
        r.set_transform(self.transform);
        r.set_crs(self.crs);
        r.set_nodata(Some(f64::NAN));
        r
    }
}

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub path: PathBuf,
    pub rows: usize,
    pub cols: usize,
    /// Pixels inside the polygon with data in every band
    pub valid_pixels: usize,
}

/// Sample `src` at every grid cell center. Cells outside `src` or on its
/// nodata become NaN.
pub fn resample_nearest(src: &Raster<f64>, grid: &GridSpec) -> Raster<f64> {
    let mut out = grid.empty();
    let (src_rows, src_cols) = src.shape();
    let nodata = src.nodata();
    let data = src.data();

    for ((row, col), v) in out.data_mut().indexed_iter_mut() {
        let (x, y) = grid.transform.pixel_to_geo(col, row);
        let (fc, fr) = src.geo_to_pixel(x, y);
        if !(fc >= 0.0 && fr >= 0.0) {
            continue;
        }
        let (sc, sr) = (fc.floor() as usize, fr.floor() as usize);
        if sr >= src_rows || sc >= src_cols {
            continue;
        }
        let s = data[(sr, sc)];
        if !s.is_nodata(nodata) {
            *v = s;
        }
    }
    out
}

/// Set every cell whose center lies outside `polygon` to NaN.
///
/// Returns the number of cells kept.
pub fn mask_outside(raster: &mut Raster<f64>, polygon: &Polygon<f64>) -> usize {
    let transform = *raster.transform();
    let mut inside = 0;
    for ((row, col), v) in raster.data_mut().indexed_iter_mut() {
        let (x, y) = transform.pixel_to_geo(col, row);
        if polygon.contains(&Point::new(x, y)) {
            inside += 1;
        } else {
            *v = f64::NAN;
        }
    }
    inside
}

/// Run an export to completion. `cancelled` is checked between assets.
pub fn run_export(
    request: &ExportRequest,
    http: &HttpOptions,
    cancelled: &dyn Fn() -> bool,
) -> Result<ExportOutput> {
    let mut readers = Vec::with_capacity(request.assets.len());
    for href in &request.assets {
        if cancelled() {
            return Err(cancelled_error(request));
        }
        readers.push(AssetReader::open(href, http)?);
    }

    let epsg = request
        .scene
        .epsg
        .or_else(|| readers.first().and_then(|r| r.metadata().crs.as_ref()).and_then(|c| c.epsg()))
        .ok_or_else(|| CloudError::InvalidTiff {
            reason: format!("scene {} has no EPSG code", request.scene.id),
        })?;
    let polygon = request.aoi.projected(epsg).ok_or_else(|| {
        CloudError::Core(urbanlens_core::Error::InvalidParameter {
            name: "epsg",
            value: epsg.to_string(),
            reason: "only WGS84 and UTM scenes can be exported".into(),
        })
    })?;
    let native = polygon
        .bounding_rect()
        .map(BBox::from)
        .ok_or(CloudError::BBoxOutside)?;

    let grid = GridSpec::covering(&native, request.scale_m, Some(CRS::from_epsg(epsg)));
    info!(
        scene = %request.scene.id,
        kind = %request.kind,
        epsg,
        rows = grid.rows,
        cols = grid.cols,
        "exporting"
    );

    let read_bbox = grid.bbox();
    let mut bands = Vec::with_capacity(readers.len());
    for (i, (reader, href)) in readers.iter_mut().zip(&request.assets).enumerate() {
        if cancelled() {
            return Err(cancelled_error(request));
        }
        let window: Raster<f64> = reader.read_bbox(&read_bbox)?;
        debug!(href = %href, rows = window.rows(), cols = window.cols(), "asset window read");
        let mut band = resample_nearest(&window, &grid);
        mask_outside(&mut band, &polygon);
        let offset = request.dn_offsets.get(i).copied().unwrap_or(0.0);
        if offset != 0.0 {
            debug!(href = %href, offset, "removing DN offset");
            remove_offset(&mut band, offset);
        }
        bands.push(band);
    }

    let valid_pixels = count_valid(&bands);
    let path = request.output_path();
    fs::create_dir_all(request.folder()).map_err(urbanlens_core::Error::from)?;
    let options = Some(GeoTiffOptions {
        compression: TiffCompression::Deflate,
    });

    match request.kind {
        ExportKind::TrueColor => {
            let scaled = bands.iter().map(|b| zero_nodata(b.map(reflectance_to_u8))).collect();
            write_multiband_u8(&MultiBandRaster::new(scaled)?, &path, options)?;
        }
        ExportKind::BandPair(_) => {
            let raw = bands.iter().map(|b| zero_nodata(b.map(dn_to_u16))).collect();
            write_multiband_u16(&MultiBandRaster::new(raw)?, &path, options)?;
        }
        ExportKind::SurfaceTemperature => {
            let deci = bands
                .iter()
                .map(|b| zero_nodata(b.map(|dn| encode_deci_celsius(landsat_st_to_celsius(dn)))))
                .collect();
            write_multiband_u16(&MultiBandRaster::new(deci)?, &path, options)?;
        }
    }

    info!(path = %path.display(), valid_pixels, "export written");
    Ok(ExportOutput {
        path,
        rows: grid.rows,
        cols: grid.cols,
        valid_pixels,
    })
}

/// Subtract `offset` from every valid cell, flooring at 0.
pub fn remove_offset(band: &mut Raster<f64>, offset: f64) {
    band.data_mut().mapv_inplace(|dn| {
        if dn.is_nan() {
            dn
        } else {
            (dn - offset).max(0.0)
        }
    });
}

fn dn_to_u16(dn: f64) -> u16 {
    if dn.is_finite() {
        dn.round().clamp(0.0, u16::MAX as f64) as u16
    } else {
        0
    }
}

fn zero_nodata<T: RasterElement + From<u8>>(mut r: Raster<T>) -> Raster<T> {
    r.set_nodata(Some(<T as From<u8>>::from(0)));
    r
}

fn count_valid(bands: &[Raster<f64>]) -> usize {
    let Some(first) = bands.first() else {
        return 0;
    };
    let (rows, cols) = first.shape();
    (0..rows * cols)
        .filter(|&i| {
            let (r, c) = (i / cols, i % cols);
            bands.iter().all(|b| b.data()[(r, c)].is_finite())
        })
        .count()
}

fn cancelled_error(request: &ExportRequest) -> CloudError {
    CloudError::Task {
        id: request.scene.id.clone(),
        reason: "cancelled".into(),
    }
}
