//! Scene selection: date windows, catalog queries and least-cloudy picking.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blocking::StacClientBlocking;
use crate::error::{CloudError, Result};
use crate::geometry::Aoi;
use crate::stac_models::{SortDirection, StacItem, StacSearchParams};

/// Sentinel-2 Level-2A surface reflectance
pub const SENTINEL2_L2A: &str = "sentinel-2-l2a";
/// Landsat Collection 2 Level-2 (surface reflectance and temperature)
pub const LANDSAT_C2_L2: &str = "landsat-c2-l2";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|e| CloudError::InvalidDate {
        input: trimmed.to_string(),
        reason: e.to_string(),
    })
}

/// Acquisition window, start inclusive and end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(CloudError::InvalidDate {
                input: format!("{start}/{end}"),
                reason: "end date must be after start date".into(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// The window grown by `days` on both sides.
    pub fn widened(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end + Duration::days(days),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Closed RFC 3339 interval for STAC `datetime`.
    pub fn to_stac_datetime(&self) -> String {
        let last = self.end - Duration::days(1);
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            self.start.format(DATE_FORMAT),
            last.format(DATE_FORMAT)
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A catalog query for one study area and date window.
#[derive(Debug, Clone)]
pub struct SceneQuery {
    pub collection: String,
    pub aoi: Aoi,
    pub window: DateWindow,
    /// Cloud cover ceiling in percent, exclusive
    pub max_cloud: f64,
    pub limit: u32,
}

impl SceneQuery {
    pub fn new(collection: impl Into<String>, aoi: Aoi, window: DateWindow) -> Self {
        Self {
            collection: collection.into(),
            aoi,
            window,
            max_cloud: 30.0,
            limit: 100,
        }
    }

    pub fn with_max_cloud(mut self, max_cloud: f64) -> Self {
        self.max_cloud = max_cloud;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Search body: intersecting the polygon, inside the window, below the
    /// cloud ceiling, least cloudy first.
    pub fn to_search_params(&self) -> StacSearchParams {
        StacSearchParams::new()
            .intersects(self.aoi.to_geojson())
            .datetime(self.window.to_stac_datetime())
            .collection(self.collection.as_str())
            .cloud_cover_below(self.max_cloud)
            .sort_by("properties.eo:cloud_cover", SortDirection::Asc)
            .limit(self.limit)
    }
}

/// Second attempt when the first search finds nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    pub widen_days: i64,
    pub max_cloud: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            widen_days: 31,
            max_cloud: 50.0,
        }
    }
}

impl FallbackPolicy {
    pub fn apply(&self, query: &SceneQuery) -> SceneQuery {
        SceneQuery {
            window: query.window.widened(self.widen_days),
            max_cloud: self.max_cloud,
            ..query.clone()
        }
    }
}

/// Least cloudy item strictly below `max_cloud`; ties go to the earliest date.
///
/// Items without a cloud cover value rank after every item that has one and
/// are only picked when no item reports cloud cover.
pub fn select_best(items: &[StacItem], max_cloud: f64) -> Option<&StacItem> {
    items
        .iter()
        .filter(|item| item.cloud_cover().map_or(true, |c| c < max_cloud))
        .min_by(|a, b| {
            let ca = a.cloud_cover().unwrap_or(f64::INFINITY);
            let cb = b.cloud_cover().unwrap_or(f64::INFINITY);
            ca.total_cmp(&cb)
                .then_with(|| a.acquisition_date().cmp(&b.acquisition_date()))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Summary of the scene chosen for an export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneInfo {
    pub id: String,
    pub collection: String,
    pub date: NaiveDate,
    pub cloud_cover: Option<f64>,
    pub epsg: Option<u32>,
}

impl SceneInfo {
    pub fn from_item(item: &StacItem) -> Result<Self> {
        let date = item.acquisition_date().ok_or_else(|| CloudError::InvalidDate {
            input: item.properties.datetime.clone().unwrap_or_default(),
            reason: format!("item {} has no usable datetime", item.id),
        })?;
        Ok(Self {
            id: item.id.clone(),
            collection: item.collection.clone().unwrap_or_default(),
            date,
            cloud_cover: item.cloud_cover(),
            epsg: item.epsg(),
        })
    }

    /// `YYYY-MM-DD`, as used in export file names
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for SceneInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.date_string())?;
        match self.cloud_cover {
            Some(c) => write!(f, " cloud {:.2}%", c),
            None => write!(f, " cloud n/a"),
        }
    }
}

/// Run `query`, then the fallback query if nothing matched.
///
/// Returns the chosen item and whether the fallback was used.
pub fn find_scene(
    client: &StacClientBlocking,
    query: &SceneQuery,
    fallback: Option<FallbackPolicy>,
) -> Result<(StacItem, bool)> {
    if let Some(item) = search_best(client, query)? {
        return Ok((item, false));
    }

    let Some(policy) = fallback else {
        return Err(no_scene(query));
    };
    let relaxed = policy.apply(query);
    warn!(
        window = %relaxed.window,
        max_cloud = relaxed.max_cloud,
        "no scene found, retrying with a wider window"
    );
    match search_best(client, &relaxed)? {
        Some(item) => Ok((item, true)),
        None => Err(no_scene(&relaxed)),
    }
}

fn search_best(client: &StacClientBlocking, query: &SceneQuery) -> Result<Option<StacItem>> {
    let items = client.search_all(&query.to_search_params())?;
    info!(
        collection = %query.collection,
        window = %query.window,
        found = items.len(),
        "scene search"
    );
    let best = select_best(&items, query.max_cloud).cloned();
    if let Some(item) = &best {
        debug!(id = %item.id, cloud = ?item.cloud_cover(), "best scene");
    }
    Ok(best)
}

fn no_scene(query: &SceneQuery) -> CloudError {
    CloudError::NoScene {
        collection: query.collection.clone(),
        window: query.window.to_string(),
        max_cloud: query.max_cloud,
    }
}
