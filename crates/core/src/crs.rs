//! Coordinate reference systems, by EPSG code

use serde::{Deserialize, Serialize};
use std::fmt;

const WGS84: u32 = 4326;
const GEOGRAPHIC: [u32; 3] = [WGS84, 4269, 4258];

/// The EPSG code stored in a GeoTIFF's GeoKey directory.
///
/// Everything this workspace writes is either WGS84 or a WGS84 UTM zone,
/// so the code alone identifies the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    pub fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84)
    }

    /// WGS84 / UTM zone `zone`, EPSG 326xx (north) or 327xx (south)
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(if north { 32600 } else { 32700 } + zone)
    }

    /// Always `Some`; kept optional so callers read it like a GeoKey.
    pub fn epsg(&self) -> Option<u32> {
        Some(self.epsg)
    }

    /// Longitude/latitude in degrees (WGS84, NAD83, ETRS89)
    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC.contains(&self.epsg)
    }

    /// `(zone, north)` for a UTM code
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg {
            32601..=32660 => Some((self.epsg - 32600, true)),
            32701..=32760 => Some((self.epsg - 32700, false)),
            _ => None,
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gurugram_is_utm_43n() {
        let crs = CRS::utm(43, true);
        assert_eq!(crs, CRS::from_epsg(32643));
        assert_eq!(crs.utm_zone(), Some((43, true)));
        assert_eq!(crs.to_string(), "EPSG:32643");
        assert!(!crs.is_geographic());
    }

    #[test]
    fn southern_and_geographic_codes() {
        assert_eq!(CRS::from_epsg(32719).utm_zone(), Some((19, false)));
        assert_eq!(CRS::wgs84().utm_zone(), None);
        assert!(CRS::wgs84().is_geographic());
        assert!(CRS::from_epsg(4258).is_geographic());
    }
}
