//! Error types for catalog search, remote reads and exports.

use thiserror::Error;

/// Errors produced by the cloud crate.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid TIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("no scene found in {collection} for {window} with cloud cover below {max_cloud}%")]
    NoScene {
        collection: String,
        window: String,
        max_cloud: f64,
    },

    #[error("bbox does not intersect raster extent")]
    BBoxOutside,

    #[error("item {item} has no asset '{asset}'")]
    AssetMissing { item: String, asset: String },

    #[error("invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    #[error("export task {id} failed: {reason}")]
    Task { id: String, reason: String },

    #[error("timed out after {secs} s waiting for task {id}")]
    Timeout { id: String, secs: u64 },

    #[error("core error: {0}")]
    Core(#[from] urbanlens_core::Error),
}

impl From<tiff::TiffError> for CloudError {
    fn from(e: tiff::TiffError) -> Self {
        CloudError::InvalidTiff {
            reason: e.to_string(),
        }
    }
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
