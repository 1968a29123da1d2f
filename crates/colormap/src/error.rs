//! Plot errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("nothing to plot")]
    Empty,

    #[error("panel '{0}' has no pixels")]
    EmptyPanel(String),

    #[error("unknown color scheme '{0}'; expected gray, rdylgn, inferno, divergent or water")]
    UnknownScheme(String),

    #[error("an RGB composite needs 3 bands, got {0}")]
    BandCount(usize),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
