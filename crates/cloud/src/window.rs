//! Windowed GeoTIFF reading: open a (remote) image, read a bounding box.
//!
//! Decoding is left to the `tiff` crate; only the chunks that intersect the
//! window are requested from the underlying reader.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use ndarray::Array2;
use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;
use tracing::debug;
use urbanlens_core::crs::CRS;
use urbanlens_core::io::{decoding_to_vec, read_georeference};
use urbanlens_core::raster::{GeoTransform, Raster, RasterElement};

use crate::error::{CloudError, Result};
use crate::geometry::BBox;
use crate::range_reader::{HttpOptions, HttpRangeSource, RangeReader};
use crate::tile_index::{chunks_for_bbox, ChunkLayout, ChunkMapping};

/// Image metadata exposed by [`WindowReader::metadata`].
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub chunk_width: u32,
    pub chunk_height: u32,
    pub geo_transform: GeoTransform,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
}

impl ImageMetadata {
    /// Image extent `(min_x, min_y, max_x, max_y)` in native coordinates.
    pub fn bounds(&self) -> BBox {
        let (a, b, c, d) = self
            .geo_transform
            .bounds(self.width as usize, self.height as usize);
        BBox::new(a, b, c, d)
    }
}

/// Single-band GeoTIFF opened for windowed reads.
pub struct WindowReader<R: Read + Seek> {
    decoder: Decoder<R>,
    meta: ImageMetadata,
}

impl<R: Read + Seek> WindowReader<R> {
    /// Parse the header and georeference.
    pub fn new(reader: R) -> Result<Self> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions()?;

        let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1);
        if samples != 1 {
            return Err(CloudError::InvalidTiff {
                reason: format!("expected a single-band asset, found {samples} samples per pixel"),
            });
        }

        let georef = read_georeference(&mut decoder);
        let geo_transform = georef.transform.ok_or_else(|| CloudError::InvalidTiff {
            reason: "missing ModelPixelScale/ModelTiepoint georeference".into(),
        })?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();

        let meta = ImageMetadata {
            width,
            height,
            chunk_width,
            chunk_height,
            geo_transform,
            crs: georef.crs,
            nodata: georef.nodata,
        };
        debug!(?meta, "opened GeoTIFF for windowed reads");
        Ok(Self { decoder, meta })
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.meta
    }

    fn layout(&self) -> ChunkLayout {
        ChunkLayout::new(
            self.meta.width,
            self.meta.height,
            self.meta.chunk_width,
            self.meta.chunk_height,
        )
    }

    /// Read the pixels covering `bbox` (native CRS) into a `Raster<T>`.
    pub fn read_bbox<T: RasterElement>(&mut self, bbox: &BBox) -> Result<Raster<T>> {
        let mapping = chunks_for_bbox(bbox, &self.meta.geo_transform, &self.layout())
            .ok_or(CloudError::BBoxOutside)?;
        self.assemble(&mapping)
    }

    /// Read the whole image.
    pub fn read_full<T: RasterElement>(&mut self) -> Result<Raster<T>> {
        let bbox = self.meta.bounds();
        self.read_bbox(&bbox)
    }

    fn assemble<T: RasterElement>(&mut self, mapping: &ChunkMapping) -> Result<Raster<T>> {
        let cw = self.meta.chunk_width as usize;
        let ch = self.meta.chunk_height as usize;
        let (px_min_col, px_min_row, px_max_col, px_max_row) = mapping.pixel_window;
        let (out_rows, out_cols) = mapping.output_shape;
        debug!(chunks = mapping.chunks.len(), rows = out_rows, cols = out_cols, "reading window");

        let mut output = Array2::<T>::from_elem((out_rows, out_cols), T::default_nodata());

        for req in &mapping.chunks {
            let (data_w, data_h) = self.decoder.chunk_data_dimensions(req.index);
            let values: Vec<T> = decoding_to_vec(self.decoder.read_chunk(req.index)?)?;
            // Edge chunks may come back clipped or padded
            let stride = if values.len() == cw * ch { cw } else { data_w as usize };

            let chunk_col0 = req.chunk_col * cw;
            let chunk_row0 = req.chunk_row * ch;

            for local_row in 0..data_h as usize {
                let img_row = chunk_row0 + local_row;
                if img_row < px_min_row || img_row >= px_max_row {
                    continue;
                }
                for local_col in 0..data_w as usize {
                    let img_col = chunk_col0 + local_col;
                    if img_col < px_min_col || img_col >= px_max_col {
                        continue;
                    }
                    if let Some(&v) = values.get(local_row * stride + local_col) {
                        output[(img_row - px_min_row, img_col - px_min_col)] = v;
                    }
                }
            }
        }

        let mut raster = Raster::from_array(output);
        let gt = &self.meta.geo_transform;
        let (corner_x, corner_y) = gt.pixel_to_geo_corner(px_min_col, px_min_row);
        raster.set_transform(GeoTransform::new(
            corner_x,
            corner_y,
            gt.pixel_width,
            gt.pixel_height,
        ));
        raster.set_crs(self.meta.crs);
        raster.set_nodata(self.meta.nodata.and_then(T::from_f64));
        Ok(raster)
    }
}

/// Remote or local asset, as referenced by a STAC href.
pub enum AssetReader {
    Remote(WindowReader<RangeReader<HttpRangeSource>>),
    Local(WindowReader<BufReader<File>>),
}

impl AssetReader {
    /// `http(s)://` hrefs are read with Range requests, anything else as a
    /// local path.
    pub fn open(href: &str, options: &HttpOptions) -> Result<Self> {
        if href.starts_with("http://") || href.starts_with("https://") {
            let source = HttpRangeSource::open(href, options)?;
            Ok(Self::Remote(WindowReader::new(RangeReader::new(source))?))
        } else {
            let path = href.strip_prefix("file://").unwrap_or(href);
            let file = File::open(Path::new(path)).map_err(urbanlens_core::Error::from)?;
            Ok(Self::Local(WindowReader::new(BufReader::new(file))?))
        }
    }

    pub fn metadata(&self) -> &ImageMetadata {
        match self {
            Self::Remote(r) => r.metadata(),
            Self::Local(r) => r.metadata(),
        }
    }

    pub fn read_bbox<T: RasterElement>(&mut self, bbox: &BBox) -> Result<Raster<T>> {
        match self {
            Self::Remote(r) => r.read_bbox(bbox),
            Self::Local(r) => r.read_bbox(bbox),
        }
    }
}

/// One-shot: open `href` and read the window covering `bbox` (native CRS).
pub fn read_window(href: &str, bbox: &BBox, options: &HttpOptions) -> Result<Raster<f64>> {
    AssetReader::open(href, options)?.read_bbox(bbox)
}
