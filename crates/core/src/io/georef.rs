//! GeoTIFF georeferencing tags.
//!
//! Reads ModelPixelScale + ModelTiepoint (or ModelTransformation) into a
//! [`GeoTransform`], the EPSG code from the GeoKeyDirectory, and the
//! GDAL_NODATA ascii tag.

use std::io::{Read, Seek};

use tiff::decoder::Decoder;
use tiff::tags::Tag;

use crate::crs::CRS;
use crate::raster::GeoTransform;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Georeference carried by a GeoTIFF image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Georeference {
    pub transform: Option<GeoTransform>,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
}

impl Georeference {
    pub fn new(transform: GeoTransform, crs: Option<CRS>, nodata: Option<f64>) -> Self {
        Self {
            transform: Some(transform),
            crs,
            nodata,
        }
    }

    /// GeoKeyDirectory entries for this georeference.
    ///
    /// Always declares PixelIsArea; adds the model type and EPSG key when
    /// the CRS has a code.
    pub fn geokey_directory(&self) -> Vec<u16> {
        let mut keys: Vec<[u16; 4]> = Vec::new();
        let epsg = self.crs.as_ref().and_then(|c| c.epsg());
        let geographic = self.crs.as_ref().map_or(false, |c| c.is_geographic());

        let model = if geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        };
        keys.push([GT_MODEL_TYPE, 0, 1, model]);
        keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);

        // EPSG codes above u16::MAX cannot be stored inline
        if let Some(code) = epsg.and_then(|c| u16::try_from(c).ok()) {
            let key = if geographic {
                GEOGRAPHIC_TYPE
            } else {
                PROJECTED_CS_TYPE
            };
            keys.push([key, 0, 1, code]);
        }

        let mut out = vec![1, 1, 0, keys.len() as u16];
        for k in keys {
            out.extend_from_slice(&k);
        }
        out
    }
}

/// Read the georeference tags of the current image of `decoder`.
///
/// Missing tags leave the matching field `None`; a malformed tag is
/// treated as missing.
pub fn read_georeference<R: Read + Seek>(decoder: &mut Decoder<R>) -> Georeference {
    let transform = read_transform(decoder);

    let crs = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()
        .and_then(|dir| parse_geokey_epsg(&dir))
        .map(CRS::from_epsg);

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok());

    Georeference {
        transform,
        crs,
        nodata,
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if let Some(gt) = GeoTransform::from_tiepoint(&scale, &tiepoint) {
            return Some(gt);
        }
    }

    decoder
        .get_tag_f64_vec(Tag::ModelTransformationTag)
        .ok()
        .and_then(|m| GeoTransform::from_model_transformation(&m))
}

/// EPSG code from a raw GeoKeyDirectory.
///
/// Layout: `[version, revision, minor, count, (key, location, count, value)*]`.
/// Only inline values (location 0) are considered.
pub fn parse_geokey_epsg(dir: &[u16]) -> Option<u32> {
    if dir.len() < 4 {
        return None;
    }
    let num_keys = dir[3] as usize;

    let mut geographic = None;
    for entry in dir[4..].chunks_exact(4).take(num_keys) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => return Some(value as u32),
            GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            _ => {}
        }
    }
    geographic
}
