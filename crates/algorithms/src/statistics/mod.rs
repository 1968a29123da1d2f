//! Summary statistics for index and temperature rasters
//!
//! - **summary**: NaN-aware count/min/max/mean/std and two-date comparison
//! - **diagnostics**: raw value dump of a thermal export

pub mod diagnostics;
pub mod summary;

pub use diagnostics::{diagnose, RasterDiagnostics};
pub use summary::{compare_means, shared_range, summarize, MeanComparison, SummaryStats};
