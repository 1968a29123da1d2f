//! Study-area exports: clip a scene to the polygon, resample, scale and
//! write a GeoTIFF, tracked as a task that can be polled.

pub mod monitor;
pub mod pipeline;
pub mod request;
pub mod task;

pub use monitor::{monitor, MonitorOptions};
pub use pipeline::{
    mask_outside, remove_offset, resample_nearest, run_export, ExportOutput, GridSpec,
};
pub use request::{ExportDestination, ExportKind, ExportRequest};
pub use task::{ExportTask, LocalExportTask, TaskState, TaskStatus};
