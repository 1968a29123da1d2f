//! What to export, from which scene, and where to.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use urbanlens_algorithms::imagery::SpectralIndex;

use crate::error::{CloudError, Result};
use crate::geometry::Aoi;
use crate::scene::{SceneInfo, LANDSAT_C2_L2, SENTINEL2_L2A};
use crate::stac_models::StacItem;

/// Landsat C2 L2 surface temperature (`ST_B10`) asset key
pub const LANDSAT_ST_ASSET: &str = "lwir11";

/// Product written for a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Red, green, blue reflectance scaled to 8 bits
    TrueColor,
    /// The two raw bands an index is computed from, in its file layout
    BandPair(SpectralIndex),
    /// Landsat surface temperature as tenths of a degree Celsius
    SurfaceTemperature,
}

impl ExportKind {
    /// STAC collection the scene is searched in
    pub fn collection(&self) -> &'static str {
        match self {
            ExportKind::TrueColor | ExportKind::BandPair(_) => SENTINEL2_L2A,
            ExportKind::SurfaceTemperature => LANDSAT_C2_L2,
        }
    }

    /// Asset keys read, in output band order
    pub fn asset_keys(&self) -> Vec<&'static str> {
        match self {
            ExportKind::TrueColor => vec!["red", "green", "blue"],
            ExportKind::BandPair(index) => {
                let (b1, b2) = index.band_layout();
                vec![b1.asset_key(), b2.asset_key()]
            }
            ExportKind::SurfaceTemperature => vec![LANDSAT_ST_ASSET],
        }
    }

    /// Output pixel size in metres
    pub fn default_scale(&self) -> f64 {
        match self {
            ExportKind::SurfaceTemperature => 30.0,
            _ => 10.0,
        }
    }

    /// File name prefix used when none is configured
    pub fn default_prefix(&self) -> &'static str {
        match self {
            ExportKind::TrueColor => "true_color",
            ExportKind::BandPair(index) => index.name(),
            ExportKind::SurfaceTemperature => "lst",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::TrueColor => f.write_str("true-color"),
            ExportKind::BandPair(index) => f.write_str(index.name()),
            ExportKind::SurfaceTemperature => f.write_str("lst"),
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true-color" | "truecolor" | "rgb" => Ok(ExportKind::TrueColor),
            "lst" | "temperature" => Ok(ExportKind::SurfaceTemperature),
            other => other
                .parse::<SpectralIndex>()
                .map(ExportKind::BandPair)
                .map_err(|_| format!("unknown export kind '{}'", s)),
        }
    }
}

/// Output folder and file name prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDestination {
    pub folder: PathBuf,
    pub prefix: String,
}

impl ExportDestination {
    pub fn new(folder: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            prefix: prefix.into(),
        }
    }

    /// `<folder>/<prefix>_<date>.tif`
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.folder.join(format!("{}_{}.tif", self.prefix, date))
    }
}

/// A fully resolved export: scene, asset hrefs and output location
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub scene: SceneInfo,
    /// Asset hrefs in [`ExportKind::asset_keys`] order
    pub assets: Vec<String>,
    /// DN subtracted from each asset before encoding, floored at 0; puts
    /// Sentinel-2 scenes from every processing baseline on one scale
    pub dn_offsets: Vec<f64>,
    pub kind: ExportKind,
    pub aoi: Aoi,
    pub scale_m: f64,
    pub destination: ExportDestination,
}

impl ExportRequest {
    /// Resolve the assets `kind` needs from a STAC item.
    pub fn from_item(
        item: &StacItem,
        kind: ExportKind,
        aoi: Aoi,
        scale_m: f64,
        destination: ExportDestination,
    ) -> Result<Self> {
        if !(scale_m.is_finite() && scale_m > 0.0) {
            return Err(urbanlens_core::Error::InvalidParameter {
                name: "scale",
                value: scale_m.to_string(),
                reason: "must be a positive number of metres".into(),
            }
            .into());
        }
        let keys = kind.asset_keys();
        let assets = keys
            .iter()
            .map(|&key| {
                item.asset(key)
                    .map(|a| a.href.clone())
                    .ok_or_else(|| CloudError::AssetMissing {
                        item: item.id.clone(),
                        asset: key.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let dn_offsets = match kind {
            ExportKind::SurfaceTemperature => vec![0.0; keys.len()],
            _ => keys.iter().map(|key| item.boa_offset(key)).collect(),
        };

        Ok(Self {
            scene: SceneInfo::from_item(item)?,
            assets,
            dn_offsets,
            kind,
            aoi,
            scale_m,
            destination,
        })
    }

    /// Where the GeoTIFF will be written
    pub fn output_path(&self) -> PathBuf {
        self.destination.path_for(&self.scene.date_string())
    }

    pub fn folder(&self) -> &Path {
        &self.destination.folder
    }
}
