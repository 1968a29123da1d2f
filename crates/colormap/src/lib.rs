//! # urbanlens colormap
//!
//! Color mapping, raster-to-RGBA rendering and comparison plots.
//!
//! Five schemes cover the study outputs: grayscale for built-up, moisture
//! and water indices, RdYlGn for NDVI, inferno for surface temperature,
//! a divergent ramp for change, and a water ramp. [`ComparisonPlot`]
//! places two or more dates side by side on one scale and writes a PNG.
//!
//! ## Usage
//!
//! ```ignore
//! use urbanlens_colormap::{ColorScheme, ColormapParams, ComparisonPlot};
//!
//! let params = ColormapParams::with_range(ColorScheme::RdYlGn, -1.0, 1.0);
//! ComparisonPlot::scalar(&params, [("Dec 2023", &dec), ("Jun 2024", &jun)])
//!     .save("ndvi.png")?;
//! ```

mod error;
mod plot;
mod render;
mod scheme;

pub use error::PlotError;
pub use plot::{rgb_composite, ComparisonPlot, Panel};
pub use render::{auto_params, raster_to_rgba, ColormapParams, NEUTRAL_NODATA};
pub use scheme::{ColorScheme, ColorStop, Rgb};
