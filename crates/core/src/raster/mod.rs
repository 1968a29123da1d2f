//! In-memory rasters: single bands, band stacks and their georeference

mod element;
mod geotransform;
mod grid;
mod multiband;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use multiband::MultiBandRaster;
