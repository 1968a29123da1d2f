//! GeoTIFF reading and writing on top of the `tiff` crate

mod georef;
mod interleaved;
mod reader;
mod writer;

pub use georef::{parse_geokey_epsg, read_georeference, Georeference};
pub use reader::{
    decoding_to_vec, read_geotiff, read_geotiff_bands, read_geotiff_bands_from_buffer,
    read_geotiff_from_buffer, read_geotiff_from_reader,
};
pub use writer::{
    write_geotiff, write_geotiff_to_buffer, write_multiband_u16, write_multiband_u8, write_u16,
    GeoTiffOptions, TiffCompression,
};
