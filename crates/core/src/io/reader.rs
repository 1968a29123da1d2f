//! GeoTIFF reader

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use super::georef::read_georeference;
use super::interleaved::read_interleaved;
use crate::error::{Error, Result};
use crate::raster::{MultiBandRaster, Raster, RasterElement};

/// Read band `band` (1-based, default 1) of a GeoTIFF file.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    read_geotiff_from_reader(BufReader::new(file), band)
}

/// Read all bands of a GeoTIFF file.
pub fn read_geotiff_bands<T, P>(path: P) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_bands(BufReader::new(file))
}

/// Same as [`read_geotiff`] on an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    read_geotiff_from_reader(Cursor::new(data), band)
}

/// Same as [`read_geotiff_bands`] on an in-memory buffer
pub fn read_geotiff_bands_from_buffer<T>(data: &[u8]) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
{
    decode_bands(Cursor::new(data))
}

/// Read one band from any `Read + Seek` source
pub fn read_geotiff_from_reader<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let band = band.unwrap_or(1);
    let stack = decode_bands::<T, R>(reader)?;
    if band == 0 || band > stack.len() {
        return Err(Error::BandOutOfRange {
            band,
            count: stack.len(),
        });
    }
    let mut bands = stack.into_bands();
    Ok(bands.swap_remove(band - 1))
}

fn decode_bands<T, R>(mut reader: R) -> Result<MultiBandRaster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut file = Vec::new();
    reader.read_to_end(&mut file)?;
    let mut decoder = Decoder::new(Cursor::new(file.as_slice()))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;
    let planar = decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1);
    if samples > 1 && planar != 1 {
        return Err(Error::UnsupportedDataType(
            "planar (band-sequential) multi-sample TIFF".into(),
        ));
    }

    let georef = read_georeference(&mut decoder);
    debug!(rows, cols, samples, ?georef, "decoding GeoTIFF");

    // Band stacks that are neither gray nor RGB(A) bypass the tiff decoder
    let data: Vec<T> = match decoder.colortype() {
        Ok(_) => decoding_to_vec(decoder.read_image()?)?,
        Err(_) => read_interleaved(&mut decoder, &file)?,
    };
    if data.len() != rows * cols * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let nodata = georef.nodata.and_then(T::from_f64);
    let mut bands = Vec::with_capacity(samples);
    for b in 0..samples {
        let values: Vec<T> = data.iter().skip(b).step_by(samples).copied().collect();
        let mut raster = Raster::from_vec(values, rows, cols)?;
        if let Some(gt) = georef.transform {
            raster.set_transform(gt);
        }
        raster.set_crs(georef.crs);
        raster.set_nodata(nodata);
        bands.push(raster);
    }

    MultiBandRaster::new(bands)
}

/// Cast a decoded sample buffer to `T`.
///
/// Samples that do not fit `T` become `T::default_nodata()`.
pub fn decoding_to_vec<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
            .collect()
    }

    let out = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".into(),
            ))
        }
    };
    Ok(out)
}
