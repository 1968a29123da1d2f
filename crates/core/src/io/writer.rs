//! GeoTIFF writer

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{ColorType, Gray16, Gray32Float, Gray8, RGB8};
use tiff::encoder::compression::{Compression, Deflate, Lzw, Uncompressed};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::{PhotometricInterpretation, SampleFormat, Tag};
use tracing::debug;

use super::georef::Georeference;
use crate::error::{Error, Result};
use crate::raster::{MultiBandRaster, Raster, RasterElement};

/// Compression applied to written images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Lzw,
    Deflate,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: TiffCompression,
}

/// Two 16-bit unsigned samples per pixel (band-pair exports)
struct Gray16x2;

impl ColorType for Gray16x2 {
    type Inner = u16;
    const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
    const BITS_PER_SAMPLE: &'static [u16] = &[16, 16];
    const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::Uint, SampleFormat::Uint];
}

/// Write a raster as a single-band 32-bit float GeoTIFF.
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_f32(raster, file, &options.unwrap_or_default())
}

/// Same as [`write_geotiff`] into a byte buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_f32(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

/// Write a single-band 16-bit unsigned GeoTIFF.
pub fn write_u16<P: AsRef<Path>>(
    raster: &Raster<u16>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let (rows, cols) = raster.shape();
    let data: Vec<u16> = raster.data().iter().copied().collect();
    let georef = georef_of(raster);
    encode::<Gray16, _>(file, cols, rows, &data, &georef, &options.unwrap_or_default())
}

/// Write 1 or 3 bands of 8-bit samples (grey or RGB).
pub fn write_multiband_u8<P: AsRef<Path>>(
    bands: &MultiBandRaster<u8>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let (rows, cols) = bands.shape();
    let data = bands.interleaved();
    let georef = georef_of(bands.band(1)?);
    let options = options.unwrap_or_default();
    let file = BufWriter::new(File::create(path.as_ref())?);
    match bands.len() {
        1 => encode::<Gray8, _>(file, cols, rows, &data, &georef, &options),
        3 => encode::<RGB8, _>(file, cols, rows, &data, &georef, &options),
        n => Err(Error::InvalidParameter {
            name: "bands",
            value: n.to_string(),
            reason: "8-bit export supports 1 or 3 bands".into(),
        }),
    }
}

/// Write 1 or 2 bands of 16-bit unsigned samples.
pub fn write_multiband_u16<P: AsRef<Path>>(
    bands: &MultiBandRaster<u16>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let (rows, cols) = bands.shape();
    let data = bands.interleaved();
    let georef = georef_of(bands.band(1)?);
    let options = options.unwrap_or_default();
    let file = BufWriter::new(File::create(path.as_ref())?);
    match bands.len() {
        1 => encode::<Gray16, _>(file, cols, rows, &data, &georef, &options),
        2 => encode::<Gray16x2, _>(file, cols, rows, &data, &georef, &options),
        n => Err(Error::InvalidParameter {
            name: "bands",
            value: n.to_string(),
            reason: "16-bit export supports 1 or 2 bands".into(),
        }),
    }
}

fn georef_of<T: RasterElement>(raster: &Raster<T>) -> Georeference {
    Georeference::new(
        *raster.transform(),
        raster.crs().copied(),
        raster.nodata().and_then(|v| v.to_f64()),
    )
}

fn encode_f32<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();
    let mut georef = georef_of(raster);
    // Float outputs mark missing cells with NaN
    if georef.nodata.is_none() && T::is_float() {
        georef.nodata = Some(f64::NAN);
    }
    encode::<Gray32Float, _>(writer, cols, rows, &data, &georef, options)
}

fn encode<C, W>(
    writer: W,
    cols: usize,
    rows: usize,
    data: &[C::Inner],
    georef: &Georeference,
    options: &GeoTiffOptions,
) -> Result<()>
where
    C: ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    debug!(rows, cols, compression = ?options.compression, "encoding GeoTIFF");
    match options.compression {
        TiffCompression::None => {
            encode_with::<C, W, _>(writer, cols, rows, data, georef, Uncompressed)
        }
        TiffCompression::Lzw => encode_with::<C, W, _>(writer, cols, rows, data, georef, Lzw),
        TiffCompression::Deflate => {
            encode_with::<C, W, _>(writer, cols, rows, data, georef, Deflate::default())
        }
    }
}

fn encode_with<C, W, D>(
    writer: W,
    cols: usize,
    rows: usize,
    data: &[C::Inner],
    georef: &Georeference,
    compression: D,
) -> Result<()>
where
    C: ColorType,
    W: Write + Seek,
    D: Compression,
    [C::Inner]: TiffValue,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image =
        encoder.new_image_with_compression::<C, D>(cols as u32, rows as u32, compression)?;

    if let Some(gt) = georef.transform {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    }

    let geokeys = georef.geokey_directory();
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = georef.nodata {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::io::{read_geotiff, read_geotiff_bands, read_geotiff_from_buffer};
    use crate::raster::GeoTransform;
    use approx::assert_relative_eq;

    fn georeferenced<T: RasterElement>(values: Vec<T>, rows: usize, cols: usize) -> Raster<T> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(716_000.0, 3_152_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32643)));
        r
    }

    #[test]
    fn f32_roundtrip_keeps_georeference() {
        let raster = georeferenced(vec![0.1f32, -0.5, f32::NAN, 0.9, 0.0, 1.0], 2, 3);
        let buf = write_geotiff_to_buffer(&raster, None).unwrap();

        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_relative_eq!(back.get(0, 1).unwrap(), -0.5, epsilon = 1e-6);
        assert!(back.get(0, 2).unwrap().is_nan());
        assert_relative_eq!(back.transform().origin_x, 716_000.0);
        assert_relative_eq!(back.transform().pixel_height, -10.0);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32643));
        assert!(back.nodata().map_or(false, |v| v.is_nan()));
    }

    #[test]
    fn rgb_bands_deinterleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");

        let mut r = georeferenced(vec![10u8, 11, 12, 13], 2, 2);
        r.set_nodata(Some(0));
        let g = georeferenced(vec![20u8, 21, 22, 23], 2, 2);
        let b = georeferenced(vec![30u8, 31, 32, 33], 2, 2);
        let stack = MultiBandRaster::new(vec![r, g, b]).unwrap();
        write_multiband_u8(&stack, &path, None).unwrap();

        let green: Raster<u8> = read_geotiff(&path, Some(2)).unwrap();
        assert_eq!(green.get(1, 1).unwrap(), 23);
        assert_eq!(green.nodata(), Some(0));

        let all: MultiBandRaster<u8> = read_geotiff_bands(&path).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.band(3).unwrap().get(0, 0).unwrap(), 30);
        assert!(matches!(
            read_geotiff::<u8, _>(&path, Some(4)),
            Err(Error::BandOutOfRange { band: 4, count: 3 })
        ));
    }

    #[test]
    fn u16_band_pair_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.tif");

        let swir = georeferenced(vec![2400u16, 0, 2600, 2700], 2, 2);
        let nir = georeferenced(vec![3000u16, 0, 1000, 2700], 2, 2);
        let stack = MultiBandRaster::new(vec![swir, nir]).unwrap();
        let options = GeoTiffOptions {
            compression: TiffCompression::Lzw,
        };
        write_multiband_u16(&stack, &path, Some(options)).unwrap();

        let back: MultiBandRaster<f64> = read_geotiff_bands(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_relative_eq!(back.band(1).unwrap().get(0, 0).unwrap(), 2400.0);
        assert_relative_eq!(back.band(2).unwrap().get(1, 0).unwrap(), 1000.0);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32643));
    }

    #[test]
    fn band_pair_reads_back_under_every_compression() {
        let dir = tempfile::tempdir().unwrap();
        let (rows, cols) = (37, 23);
        let red: Vec<u16> = (0..rows * cols).map(|i| (i * 7 % 5000) as u16).collect();
        let nir: Vec<u16> = (0..rows * cols).map(|i| (i * 13 % 9000) as u16).collect();

        let values = |r: &Raster<u16>| r.data().iter().copied().collect::<Vec<_>>();

        for compression in [
            TiffCompression::None,
            TiffCompression::Lzw,
            TiffCompression::Deflate,
        ] {
            let path = dir.path().join(format!("{compression:?}.tif"));
            let mut first = georeferenced(red.clone(), rows, cols);
            first.set_nodata(Some(0));
            let second = georeferenced(nir.clone(), rows, cols);
            let stack = MultiBandRaster::new(vec![first, second]).unwrap();
            write_multiband_u16(&stack, &path, Some(GeoTiffOptions { compression })).unwrap();

            let back: MultiBandRaster<u16> = read_geotiff_bands(&path).unwrap();
            assert_eq!(back.shape(), (rows, cols), "{compression:?}");
            assert_eq!(values(back.band(1).unwrap()), red);
            assert_eq!(values(back.band(2).unwrap()), nir);
            assert_eq!(back.band(2).unwrap().nodata(), Some(0));

            let second: Raster<f64> = read_geotiff(&path, Some(2)).unwrap();
            assert_relative_eq!(second.get(36, 22).unwrap(), f64::from(nir[rows * cols - 1]));
        }
    }

    #[test]
    fn single_band_u16_with_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lst.tif");

        let mut lst = georeferenced(vec![0u16, 315, 402, 65535], 2, 2);
        lst.set_nodata(Some(0));
        write_u16(&lst, &path, None).unwrap();

        let back: Raster<u16> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.nodata(), Some(0));
        assert_eq!(back.get(1, 1).unwrap(), 65535);
        assert_eq!(back.statistics().valid_count, 3);
    }

    #[test]
    fn rejects_unsupported_band_count() {
        let dir = tempfile::tempdir().unwrap();
        let band = || georeferenced(vec![1u8; 4], 2, 2);
        let stack = MultiBandRaster::new(vec![band(), band()]).unwrap();
        assert!(write_multiband_u8(&stack, dir.path().join("x.tif"), None).is_err());
    }
}
