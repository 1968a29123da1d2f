//! Serde models for STAC Item Search.
//!
//! The request body carries the `query` and `sortby` extensions; responses
//! keep only what scene selection and export read.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// DN added to Sentinel-2 L2A reflectance from processing baseline 04.00
pub const S2_BOA_ADD_OFFSET: f64 = 1000.0;

const S2_QUANTIFICATION: f64 = 1e-4;

/// `sortby` direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

/// JSON body of `POST /search`. Unset fields are left out of the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StacSearchParams {
    /// `[west, south, east, north]` in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// GeoJSON geometry the footprint must intersect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,
    /// RFC 3339 instant or `start/end` interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Query extension: property name to operator object
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub query: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<SortBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bbox(self, bbox: [f64; 4]) -> Self {
        Self {
            bbox: Some(bbox),
            ..self
        }
    }

    pub fn intersects(self, geometry: Value) -> Self {
        Self {
            intersects: Some(geometry),
            ..self
        }
    }

    pub fn datetime(self, interval: impl Into<String>) -> Self {
        Self {
            datetime: Some(interval.into()),
            ..self
        }
    }

    pub fn collection(mut self, id: impl Into<String>) -> Self {
        self.collections.push(id.into());
        self
    }

    /// Page size
    pub fn limit(self, n: u32) -> Self {
        Self {
            limit: Some(n),
            ..self
        }
    }

    /// `eo:cloud_cover < percent`
    pub fn cloud_cover_below(mut self, percent: f64) -> Self {
        self.query
            .insert("eo:cloud_cover".to_string(), json!({ "lt": percent }));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sortby.push(SortBy {
            field: field.into(),
            direction,
        });
        self
    }
}

/// One page of search results (a GeoJSON FeatureCollection)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,
}

impl StacItemCollection {
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A scene: acquisition properties plus the files (assets) it consists of
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// `[west, south, east, north]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// EPSG code from `proj:epsg`, or from `proj:code` (`"EPSG:32643"`).
    pub fn epsg(&self) -> Option<u32> {
        let props = &self.properties.extra;
        match props.get("proj:epsg").and_then(|v| v.as_u64()) {
            Some(code) => u32::try_from(code).ok(),
            None => props
                .get("proj:code")
                .and_then(|v| v.as_str())
                .and_then(|s| s.strip_prefix("EPSG:"))
                .and_then(|s| s.parse().ok()),
        }
    }

    /// `eo:cloud_cover` in percent
    /// Sentinel-2 `BOA_ADD_OFFSET` in DN carried by asset `key`.
    ///
    /// Taken from the asset's `raster:bands` offset when the catalog
    /// publishes one, then from `earthsearch:boa_offset_applied`, then from
    /// `s2:processing_baseline` (04.00 and later add the offset).
    pub fn boa_offset(&self, key: &str) -> f64 {
        let band = self.asset(key).and_then(|a| a.raster_bands.first());
        if let Some(RasterBand {
            offset: Some(offset),
            scale,
        }) = band
        {
            let scale = scale.filter(|s| *s > 0.0).unwrap_or(S2_QUANTIFICATION);
            return (-offset / scale).round().max(0.0);
        }

        let props = &self.properties.extra;
        if let Some(applied) = props
            .get("earthsearch:boa_offset_applied")
            .and_then(Value::as_bool)
        {
            return if applied { S2_BOA_ADD_OFFSET } else { 0.0 };
        }
        match props
            .get("s2:processing_baseline")
            .and_then(Value::as_str)
            .and_then(|b| b.trim().parse::<f64>().ok())
        {
            Some(baseline) if baseline >= 4.0 => S2_BOA_ADD_OFFSET,
            _ => 0.0,
        }
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.cloud_cover
    }

    /// UTC date of `datetime`
    pub fn acquisition_date(&self) -> Option<NaiveDate> {
        let dt = self.properties.datetime.as_deref()?;
        match DateTime::parse_from_rfc3339(dt) {
            Ok(d) => Some(d.naive_utc().date()),
            Err(_) => dt
                .get(..10)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    #[serde(default)]
    pub datetime: Option<String>,

    #[serde(rename = "eo:cloud_cover", default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,

    /// Everything else, e.g. `proj:epsg`
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A file of an item
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    /// Media type, e.g. `image/tiff; application=geotiff; profile=cloud-optimized`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// `raster:bands` extension, one entry per band of the file
    #[serde(rename = "raster:bands", default, skip_serializing_if = "Vec::is_empty")]
    pub raster_bands: Vec<RasterBand>,
}

/// Per-band value transform: `physical = dn * scale + offset`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RasterBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl StacAsset {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A link; `rel = "next"` drives pagination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,

    pub href: String,

    /// `GET` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Body for a `POST` link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Merge `body` into the previous request body instead of replacing it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const FIXTURE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "id": "S2B_43RFM_20231205_0_L2A",
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[76.94, 27.99], [78.05, 27.99], [78.05, 28.99], [76.94, 28.99], [76.94, 27.99]]]
      },
      "bbox": [76.94, 27.99, 78.05, 28.99],
      "properties": {
        "datetime": "2023-12-05T05:36:41.024000Z",
        "eo:cloud_cover": 0.41,
        "platform": "sentinel-2b",
        "gsd": 10.0,
        "proj:epsg": 32643,
        "s2:processing_baseline": "05.09"
      },
      "assets": {
        "red": {
          "href": "https://example.com/43/R/FM/2023/12/S2B_43RFM_20231205_0_L2A/B04.tif",
          "type": "image/tiff; application=geotiff; profile=cloud-optimized",
          "title": "Red (band 4) - 10m",
          "roles": ["data", "reflectance"],
          "raster:bands": [{"nodata": 0, "data_type": "uint16", "scale": 0.0001, "offset": -0.1}]
        },
        "nir": {
          "href": "https://example.com/43/R/FM/2023/12/S2B_43RFM_20231205_0_L2A/B08.tif",
          "type": "image/tiff; application=geotiff; profile=cloud-optimized",
          "title": "NIR 1 (band 8) - 10m",
          "roles": ["data", "reflectance"]
        },
        "thumbnail": {
          "href": "https://example.com/thumb.jpg",
          "type": "image/jpeg",
          "roles": ["thumbnail"]
        }
      },
      "collection": "sentinel-2-l2a",
      "links": []
    }
  ],
  "links": [
    {
      "rel": "next",
      "href": "https://earth-search.aws.element84.com/v1/search",
      "method": "POST",
      "body": {"next": "abc123"},
      "merge": true
    },
    {
      "rel": "self",
      "href": "https://earth-search.aws.element84.com/v1/search"
    }
  ],
  "numberMatched": 12,
  "numberReturned": 1
}"#;

    #[test]
    fn parse_item_collection() {
        let col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(col.len(), 1);
        assert_eq!(col.number_matched, Some(12));
    }

    #[test]
    fn parse_item() {
        let col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        let item = &col.features[0];
        assert_eq!(item.id, "S2B_43RFM_20231205_0_L2A");
        assert_eq!(item.collection.as_deref(), Some("sentinel-2-l2a"));
        assert_eq!(item.epsg(), Some(32643));
        assert!((item.cloud_cover().unwrap() - 0.41).abs() < f64::EPSILON);
        assert_eq!(
            item.acquisition_date(),
            NaiveDate::from_ymd_opt(2023, 12, 5)
        );
    }

    #[test]
    fn asset_lookup() {
        let col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        let item = &col.features[0];

        assert!(item.asset("nir").is_some());
        assert!(item.asset("swir16").is_none());
        let red = item.asset("red").unwrap();
        assert!(red.href.ends_with("B04.tif"));
        assert!(red.has_role("data"));
        assert!(!item.asset("thumbnail").unwrap().has_role("data"));
    }

    #[test]
    fn epsg_from_proj_code() {
        let mut col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        let item = &mut col.features[0];
        item.properties.extra.remove("proj:epsg");
        item.properties
            .extra
            .insert("proj:code".into(), json!("EPSG:32644"));
        assert_eq!(item.epsg(), Some(32644));
    }

    #[test]
    fn boa_offset_sources() {
        let mut col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        let item = &mut col.features[0];
        assert_eq!(
            item.asset("red").unwrap().raster_bands[0].offset,
            Some(-0.1)
        );
        // raster:bands on red, processing baseline 05.09 for nir
        assert_eq!(item.boa_offset("red"), S2_BOA_ADD_OFFSET);
        assert_eq!(item.boa_offset("nir"), S2_BOA_ADD_OFFSET);

        item.properties
            .extra
            .insert("s2:processing_baseline".into(), json!("03.01"));
        assert_eq!(item.boa_offset("nir"), 0.0);

        // The Earth Search flag wins over the baseline
        item.properties
            .extra
            .insert("earthsearch:boa_offset_applied".into(), json!(true));
        assert_eq!(item.boa_offset("nir"), S2_BOA_ADD_OFFSET);

        // A zero offset in raster:bands wins over both
        item.assets.get_mut("red").unwrap().raster_bands[0].offset = Some(0.0);
        assert_eq!(item.boa_offset("red"), 0.0);
        assert_eq!(item.boa_offset("missing"), S2_BOA_ADD_OFFSET);
    }

    #[test]
    fn pagination_links() {
        let col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        let next = col.next_link().unwrap();
        assert_eq!(next.method.as_deref(), Some("POST"));
        assert_eq!(next.merge, Some(true));
    }

    #[test]
    fn builder_serializes_extensions() {
        let params = StacSearchParams::new()
            .bbox([77.03, 28.46, 77.06, 28.48])
            .datetime("2023-12-01/2023-12-31")
            .collection("sentinel-2-l2a")
            .cloud_cover_below(30.0)
            .sort_by("properties.eo:cloud_cover", SortDirection::Asc)
            .limit(50);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["datetime"], "2023-12-01/2023-12-31");
        assert_eq!(json["query"]["eo:cloud_cover"]["lt"], 30.0);
        assert_eq!(json["sortby"][0]["field"], "properties.eo:cloud_cover");
        assert_eq!(json["sortby"][0]["direction"], "asc");
        assert_eq!(json["collections"], json!(["sentinel-2-l2a"]));
        assert_eq!(json["bbox"][2], 77.06);
        assert!(json.get("intersects").is_none());
        assert!(json.get("token").is_none());
    }

    #[test]
    fn empty_params_has_no_fields() {
        let json = serde_json::to_value(StacSearchParams::new()).unwrap();
        assert!(json.as_object().unwrap().is_empty());
    }
}
