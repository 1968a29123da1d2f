//! Study-area geometry in WGS84 longitude/latitude.

use geo::{BoundingRect, Contains, Coord, LineString, MapCoords, Point, Polygon, Rect};
use serde_json::json;

use crate::error::{CloudError, Result};
use crate::reproject::{is_wgs84, UtmZone};

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Check if two bboxes intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl From<Rect<f64>> for BBox {
    fn from(r: Rect<f64>) -> Self {
        Self::new(r.min().x, r.min().y, r.max().x, r.max().y)
    }
}

/// Area of interest: a WGS84 polygon (rectangles are stored as polygons).
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    polygon: Polygon<f64>,
}

impl Aoi {
    /// Polygon from `[lon, lat]` vertices. The ring is closed if needed.
    pub fn from_polygon(vertices: &[[f64; 2]]) -> Result<Self> {
        let mut ring: Vec<Coord<f64>> = vertices.iter().map(|&[x, y]| Coord { x, y }).collect();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(urbanlens_core::Error::InvalidParameter {
                name: "polygon",
                value: format!("{} vertices", ring.len()),
                reason: "a polygon needs at least 3 distinct vertices".into(),
            }
            .into());
        }
        if let Some(c) = ring.iter().find(|c| !valid_lon_lat(c.x, c.y)) {
            return Err(out_of_range(c.x, c.y));
        }
        Ok(Self {
            polygon: Polygon::new(LineString::from(ring), vec![]),
        })
    }

    /// Rectangle `[west, south, east, north]`.
    pub fn from_bbox(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        if !valid_lon_lat(west, south) || !valid_lon_lat(east, north) {
            return Err(out_of_range(west, south));
        }
        if west >= east || south >= north {
            return Err(urbanlens_core::Error::InvalidParameter {
                name: "bbox",
                value: format!("[{west}, {south}, {east}, {north}]"),
                reason: "west must be < east and south < north".into(),
            }
            .into());
        }
        let rect = Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north });
        Ok(Self {
            polygon: rect.to_polygon(),
        })
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Bounding box in degrees.
    pub fn bbox(&self) -> BBox {
        // from_* guarantees a non-empty ring
        self.polygon
            .bounding_rect()
            .map(BBox::from)
            .unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Closed ring of `[lon, lat]` vertices.
    pub fn vertices(&self) -> Vec<[f64; 2]> {
        self.polygon.exterior().coords().map(|c| [c.x, c.y]).collect()
    }

    /// GeoJSON `Polygon` geometry, as used by STAC `intersects`.
    pub fn to_geojson(&self) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [self.vertices()],
        })
    }

    /// Whether `(lon, lat)` lies strictly inside the polygon.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygon.contains(&Point::new(lon, lat))
    }

    /// UTM EPSG code of the zone holding the polygon's bbox center.
    pub fn utm_epsg(&self) -> u32 {
        let b = self.bbox();
        let lon = (b.min_x + b.max_x) / 2.0;
        let lat = (b.min_y + b.max_y) / 2.0;
        UtmZone::containing(lon, lat).epsg()
    }

    /// The polygon in the coordinates of `epsg` (WGS84 or UTM).
    pub fn projected(&self, epsg: u32) -> Option<Polygon<f64>> {
        if is_wgs84(epsg) {
            return Some(self.polygon.clone());
        }
        let zone = UtmZone::from_epsg(epsg)?;
        Some(self.polygon.map_coords(|c| {
            let (x, y) = zone.forward(c.x, c.y);
            Coord { x, y }
        }))
    }
}

fn valid_lon_lat(lon: f64, lat: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)
}

fn out_of_range(lon: f64, lat: f64) -> CloudError {
    urbanlens_core::Error::InvalidParameter {
        name: "coordinates",
        value: format!("({lon}, {lat})"),
        reason: "longitude must be in [-180, 180] and latitude in [-90, 90]".into(),
    }
    .into()
}
