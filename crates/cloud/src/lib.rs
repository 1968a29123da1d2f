//! # urbanlens cloud
//!
//! Scene search against STAC catalogs, windowed reads of remote GeoTIFF
//! assets over HTTP Range requests, and study-area export tasks.
//!
//! A typical export:
//! 1. build a [`SceneQuery`] for the study [`Aoi`] and a [`DateWindow`]
//! 2. [`find_scene`] picks the least cloudy item (with an optional fallback)
//! 3. [`ExportRequest::from_item`] resolves the assets
//! 4. a [`LocalExportTask`] runs the pipeline and [`monitor`] polls it

pub mod blocking;
pub mod error;
pub mod export;
pub mod geometry;
pub mod range_reader;
pub mod reproject;
pub mod scene;
pub mod stac_client;
pub mod stac_models;
pub mod tile_index;
pub mod window;

pub use blocking::StacClientBlocking;
pub use error::{CloudError, Result};
pub use export::{
    monitor, run_export, ExportDestination, ExportKind, ExportOutput, ExportRequest, ExportTask,
    LocalExportTask, MonitorOptions, TaskState, TaskStatus,
};
pub use geometry::{Aoi, BBox};
pub use range_reader::{HttpOptions, HttpRangeSource, RangeReader, RangeSource};
pub use scene::{
    find_scene, parse_date, select_best, DateWindow, FallbackPolicy, SceneInfo, SceneQuery,
    LANDSAT_C2_L2, SENTINEL2_L2A,
};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams};
pub use window::{read_window, AssetReader, ImageMetadata, WindowReader};
