//! WGS84 <-> UTM transverse Mercator on the WGS84 ellipsoid.
//!
//! Sentinel-2 and Landsat assets are gridded in UTM (EPSG 326xx north,
//! 327xx south), so this is the only projected system the export path needs.
//! Series expansions follow Snyder, *Map Projections: A Working Manual*
//! (USGS PP 1395), chapter 8.

const SEMI_MAJOR: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const ECC2: f64 = FLATTENING * (2.0 - FLATTENING);
const ECC2_PRIME: f64 = ECC2 / (1.0 - ECC2);
const SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;

pub const WGS84_EPSG: u32 = 4326;

pub fn is_wgs84(epsg: u32) -> bool {
    epsg == WGS84_EPSG
}

/// One of the 120 UTM zones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub zone: u32,
    pub north: bool,
}

impl UtmZone {
    /// `32601..=32660` or `32701..=32760`
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let (base, north) = match epsg {
            32601..=32660 => (32600, true),
            32701..=32760 => (32700, false),
            _ => return None,
        };
        Some(Self { zone: epsg - base, north })
    }

    /// Zone whose 6-degree band holds `lon`; hemisphere from `lat`.
    pub fn containing(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32;
        Self { zone, north: lat >= 0.0 }
    }

    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.zone
        } else {
            32700 + self.zone
        }
    }

    fn central_meridian(&self) -> f64 {
        (self.zone as f64 * 6.0 - 183.0).to_radians()
    }

    /// Degrees `(lon, lat)` to metres `(easting, northing)`
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let (sin, cos) = phi.sin_cos();
        let tan = phi.tan();

        let nu = SEMI_MAJOR / (1.0 - ECC2 * sin * sin).sqrt();
        let t = tan * tan;
        let c = ECC2_PRIME * cos * cos;
        let a = cos * (lon.to_radians() - self.central_meridian());
        let (a2, a3) = (a * a, a * a * a);
        let (a4, a5, a6) = (a2 * a2, a2 * a3, a3 * a3);

        let easting = FALSE_EASTING
            + SCALE
                * nu
                * (a
                    + (1.0 - t + c) * a3 / 6.0
                    + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ECC2_PRIME) * a5 / 120.0);
        let northing = SCALE
            * (meridian_distance(phi)
                + nu * tan
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ECC2_PRIME) * a6 / 720.0));

        let false_northing = if self.north { 0.0 } else { SOUTH_FALSE_NORTHING };
        (easting, northing + false_northing)
    }

    /// Metres `(easting, northing)` back to degrees `(lon, lat)`
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let x = easting - FALSE_EASTING;
        let y = if self.north { northing } else { northing - SOUTH_FALSE_NORTHING };

        let mu = y / SCALE / (SEMI_MAJOR * meridian_coefficients()[0]);
        let root = (1.0 - ECC2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);
        let phi1 = mu
            + (1.5 * e1 - 27.0 / 32.0 * e1.powi(3)) * (2.0 * mu).sin()
            + (21.0 / 16.0 * e1.powi(2) - 55.0 / 32.0 * e1.powi(4)) * (4.0 * mu).sin()
            + 151.0 / 96.0 * e1.powi(3) * (6.0 * mu).sin()
            + 1097.0 / 512.0 * e1.powi(4) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = phi1.tan();
        let c1 = ECC2_PRIME * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = 1.0 - ECC2 * sin1 * sin1;
        let nu1 = SEMI_MAJOR / w.sqrt();
        let rho1 = SEMI_MAJOR * (1.0 - ECC2) / w.powf(1.5);
        let d = x / (nu1 * SCALE);
        let (d2, d3) = (d * d, d * d * d);
        let (d4, d5, d6) = (d2 * d2, d2 * d3, d3 * d3);

        let lat = phi1
            - nu1 * tan1 / rho1
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ECC2_PRIME) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ECC2_PRIME
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lon = self.central_meridian()
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ECC2_PRIME + 24.0 * t1 * t1)
                    * d5
                    / 120.0)
                / cos1;

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Coefficients of `phi`, `sin 2phi`, `sin 4phi`, `sin 6phi` in the
/// meridian arc series
fn meridian_coefficients() -> [f64; 4] {
    let (e2, e4, e6) = (ECC2, ECC2 * ECC2, ECC2 * ECC2 * ECC2);
    [
        1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0,
        3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0,
        15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0,
        35.0 * e6 / 3072.0,
    ]
}

/// Distance along the meridian from the equator to latitude `phi` (radians)
fn meridian_distance(phi: f64) -> f64 {
    let [m0, m2, m4, m6] = meridian_coefficients();
    SEMI_MAJOR
        * (m0 * phi - m2 * (2.0 * phi).sin() + m4 * (4.0 * phi).sin()
            - m6 * (6.0 * phi).sin())
}
