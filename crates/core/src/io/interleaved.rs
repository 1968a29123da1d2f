//! Pixel-interleaved images with any number of samples.
//!
//! `tiff` only interprets gray, RGB, RGBA, CMYK and YCbCr pixels, so band
//! stacks such as two-band index exports are decoded here straight from
//! their strips or tiles.

use std::borrow::Cow;
use std::io::{Read, Seek};

use tiff::decoder::{ChunkType, Decoder};
use tiff::tags::Tag;

use crate::error::{Error, Result};
use crate::raster::RasterElement;

/// TIFF compression codes
pub mod compression {
    pub const NONE: u32 = 1;
    pub const LZW: u32 = 5;
    pub const DEFLATE: u32 = 8;
    pub const ADOBE_DEFLATE: u32 = 32946;
}

mod sample_format {
    pub const UINT: u32 = 1;
    pub const INT: u32 = 2;
    pub const FLOAT: u32 = 3;
}

const NO_PREDICTOR: u32 = 1;
const HORIZONTAL_PREDICTOR: u32 = 2;

/// Storage layout of the current image, read from its tags
#[derive(Debug)]
struct Layout {
    width: usize,
    height: usize,
    samples: usize,
    bits: usize,
    format: u32,
    compression: u32,
    predictor: u32,
    big_endian: bool,
    chunk_width: usize,
    chunk_height: usize,
    tiled: bool,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl Layout {
    fn read<R: Read + Seek>(decoder: &mut Decoder<R>, file: &[u8]) -> Result<Self> {
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;

        let bits = decoder.get_tag_u16_vec(Tag::BitsPerSample)?;
        let bits = match bits.split_first() {
            Some((&first, rest)) if rest.iter().all(|&b| b == first) => first as usize,
            _ => {
                return Err(Error::UnsupportedDataType(format!(
                    "mixed bits per sample {bits:?}"
                )))
            }
        };
        let format = decoder
            .get_tag_u32_vec(Tag::SampleFormat)
            .ok()
            .and_then(|v| v.first().copied())
            .unwrap_or(sample_format::UINT);
        match (format, bits) {
            (sample_format::UINT | sample_format::INT, 8 | 16 | 32 | 64)
            | (sample_format::FLOAT, 32 | 64) => {}
            _ => {
                return Err(Error::UnsupportedDataType(format!(
                    "{bits}-bit samples with sample format {format}"
                )))
            }
        }

        let compression = decoder
            .get_tag_u32(Tag::Compression)
            .unwrap_or(compression::NONE);
        let predictor = decoder.get_tag_u32(Tag::Predictor).unwrap_or(NO_PREDICTOR);
        if predictor != NO_PREDICTOR
            && !(predictor == HORIZONTAL_PREDICTOR && format != sample_format::FLOAT)
        {
            return Err(Error::UnsupportedDataType(format!(
                "predictor {predictor} on sample format {format}"
            )));
        }

        let tiled = decoder.get_chunk_type() == ChunkType::Tile;
        let (offsets, byte_counts, chunk_width, chunk_height) = if tiled {
            (
                decoder.get_tag_u64_vec(Tag::TileOffsets)?,
                decoder.get_tag_u64_vec(Tag::TileByteCounts)?,
                decoder.get_tag_u32(Tag::TileWidth)? as usize,
                decoder.get_tag_u32(Tag::TileLength)? as usize,
            )
        } else {
            let rows_per_strip = decoder
                .get_tag_u32(Tag::RowsPerStrip)
                .map_or(height, |r| r as usize);
            (
                decoder.get_tag_u64_vec(Tag::StripOffsets)?,
                decoder.get_tag_u64_vec(Tag::StripByteCounts)?,
                width,
                rows_per_strip.clamp(1, height.max(1)),
            )
        };
        if chunk_width == 0 || offsets.len() != byte_counts.len() {
            return Err(Error::Decompress("inconsistent chunk tags".into()));
        }

        Ok(Self {
            width,
            height,
            samples,
            bits,
            format,
            compression,
            predictor,
            big_endian: file.starts_with(b"MM"),
            chunk_width,
            chunk_height,
            tiled,
            offsets,
            byte_counts,
        })
    }
}

/// Every sample of the decoder's current image, pixel-interleaved in
/// row-major order. `file` is the complete TIFF the decoder reads from.
pub(crate) fn read_interleaved<T, R>(decoder: &mut Decoder<R>, file: &[u8]) -> Result<Vec<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let layout = Layout::read(decoder, file)?;
    let Layout {
        width,
        height,
        samples,
        chunk_width,
        chunk_height,
        ..
    } = layout;

    let across = width.div_ceil(chunk_width);
    let row_len = chunk_width * samples;
    let bytes_per_sample = layout.bits / 8;
    let mut out = vec![T::default_nodata(); width * height * samples];

    for (i, (&offset, &count)) in layout.offsets.iter().zip(&layout.byte_counts).enumerate() {
        let row0 = (i / across) * chunk_height;
        let col0 = (i % across) * chunk_width;
        if row0 >= height {
            break;
        }
        let rows_here = chunk_height.min(height - row0);
        let cols_here = chunk_width.min(width - col0);
        let stored_rows = if layout.tiled { chunk_height } else { rows_here };

        let start = offset as usize;
        let raw = file
            .get(start..start + count as usize)
            .ok_or_else(|| Error::Decompress(format!("chunk {i} lies outside the file")))?;
        let expected = stored_rows * row_len * bytes_per_sample;
        let data = decompress(raw, layout.compression, expected)?;

        let mut words = to_words(&data, bytes_per_sample, layout.big_endian);
        if words.len() < stored_rows * row_len {
            return Err(Error::Decompress(format!(
                "chunk {i} holds {} samples, expected {}",
                words.len(),
                stored_rows * row_len
            )));
        }
        if layout.predictor == HORIZONTAL_PREDICTOR {
            undo_horizontal(&mut words[..stored_rows * row_len], row_len, samples, layout.bits);
        }

        for r in 0..rows_here {
            let src = &words[r * row_len..r * row_len + cols_here * samples];
            let dst = ((row0 + r) * width + col0) * samples;
            for (slot, &word) in out[dst..dst + src.len()].iter_mut().zip(src) {
                *slot = word_to(word, layout.bits, layout.format);
            }
        }
    }

    Ok(out)
}

/// Inflate one chunk. `expected` is only a capacity hint.
fn decompress(data: &[u8], code: u32, expected: usize) -> Result<Cow<'_, [u8]>> {
    match code {
        compression::NONE => Ok(Cow::Borrowed(data)),
        compression::LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .decode(data)
            .map(Cow::Owned)
            .map_err(|e| Error::Decompress(format!("LZW: {e}"))),
        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            let mut out = Vec::with_capacity(expected);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
                return Ok(Cow::Owned(out));
            }
            // Some writers omit the zlib header
            out.clear();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(format!("DEFLATE: {e}")))?;
            Ok(Cow::Owned(out))
        }
        other => Err(Error::UnsupportedDataType(format!("TIFF compression {other}"))),
    }
}

/// Raw sample bits, one word per sample
fn to_words(data: &[u8], bytes_per_sample: usize, big_endian: bool) -> Vec<u64> {
    data.chunks_exact(bytes_per_sample)
        .map(|b| {
            let fold = |acc: u64, &byte: &u8| (acc << 8) | u64::from(byte);
            if big_endian {
                b.iter().fold(0, fold)
            } else {
                b.iter().rev().fold(0, fold)
            }
        })
        .collect()
}

/// Integrate horizontal differencing row by row, per sample channel.
fn undo_horizontal(words: &mut [u64], row_len: usize, samples: usize, bits: usize) {
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    for row in words.chunks_exact_mut(row_len) {
        for i in samples..row.len() {
            row[i] = row[i].wrapping_add(row[i - samples]) & mask;
        }
    }
}

fn word_to<T: RasterElement>(word: u64, bits: usize, format: u32) -> T {
    let value = match (format, bits) {
        (sample_format::INT, 8) => f64::from(word as u8 as i8),
        (sample_format::INT, 16) => f64::from(word as u16 as i16),
        (sample_format::INT, 32) => f64::from(word as u32 as i32),
        (sample_format::INT, _) => word as i64 as f64,
        (sample_format::FLOAT, 32) => f64::from(f32::from_bits(word as u32)),
        (sample_format::FLOAT, _) => f64::from_bits(word),
        _ => word as f64,
    };
    T::from_f64(value).unwrap_or_else(T::default_nodata)
}
