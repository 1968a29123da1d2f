//! Study configuration file.
//!
//! ```toml
//! [area]
//! name = "sector14"
//! polygon = [[77.0439, 28.4684], [77.0458, 28.4697], ...]
//!
//! [catalog]
//! endpoint = "earth-search"
//! max_cloud = 30
//!
//! [export]
//! folder = "earth_engine"
//! poll_interval_secs = 5
//! ```
//!
//! Every section and key is optional. Command-line flags override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use urbanlens_cloud::{
    Aoi, ExportKind, FallbackPolicy, MonitorOptions, StacCatalog, LANDSAT_C2_L2, SENTINEL2_L2A,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub area: AreaConfig,
    pub catalog: CatalogConfig,
    pub export: ExportConfig,
}

/// Study area, as a lon/lat polygon or a `[west, south, east, north]` box
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AreaConfig {
    pub name: Option<String>,
    pub polygon: Option<Vec<[f64; 2]>>,
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// `earth-search`, `planetary-computer` or a STAC API URL
    pub endpoint: String,
    pub optical_collection: String,
    pub thermal_collection: String,
    /// Cloud cover ceiling in percent
    pub max_cloud: f64,
    /// Retry with a wider window when nothing matches
    pub fallback: bool,
    pub fallback_widen_days: i64,
    pub fallback_max_cloud: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub folder: PathBuf,
    pub prefix: Option<String>,
    /// Pixel size in metres; the product default when unset
    pub scale: Option<f64>,
    pub poll_interval_secs: u64,
    pub timeout_secs: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let fallback = FallbackPolicy::default();
        Self {
            endpoint: StacCatalog::default().to_string(),
            optical_collection: SENTINEL2_L2A.to_string(),
            thermal_collection: LANDSAT_C2_L2.to_string(),
            max_cloud: 30.0,
            fallback: true,
            fallback_widen_days: fallback.widen_days,
            fallback_max_cloud: fallback.max_cloud,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("earth_engine"),
            prefix: None,
            scale: None,
            poll_interval_secs: MonitorOptions::default().poll_interval.as_secs(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Read and validate a config file, or return the defaults when `path`
    /// is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.area.validate()?;
        self.catalog.validate()?;
        self.export.validate()
    }
}

impl AreaConfig {
    fn validate(&self) -> Result<()> {
        if self.polygon.is_some() && self.bbox.is_some() {
            bail!("[area] sets both polygon and bbox; keep one");
        }
        self.to_aoi().map(|_| ())
    }

    /// The configured area, if any
    pub fn to_aoi(&self) -> Result<Option<Aoi>> {
        let aoi = match (&self.polygon, &self.bbox) {
            (Some(vertices), _) => Some(Aoi::from_polygon(vertices)?),
            (None, Some([w, s, e, n])) => Some(Aoi::from_bbox(*w, *s, *e, *n)?),
            (None, None) => None,
        };
        Ok(aoi)
    }
}

impl CatalogConfig {
    fn validate(&self) -> Result<()> {
        check_percent("catalog.max_cloud", self.max_cloud)?;
        check_percent("catalog.fallback_max_cloud", self.fallback_max_cloud)?;
        if self.fallback_widen_days <= 0 {
            bail!(
                "catalog.fallback_widen_days must be positive, got {}",
                self.fallback_widen_days
            );
        }
        if self.endpoint.trim().is_empty() {
            bail!("catalog.endpoint is empty");
        }
        Ok(())
    }

    pub fn catalog(&self) -> StacCatalog {
        StacCatalog::from_str_or_url(self.endpoint.trim())
    }

    /// Collection searched for a product
    pub fn collection_for(&self, kind: ExportKind) -> &str {
        match kind {
            ExportKind::SurfaceTemperature => &self.thermal_collection,
            ExportKind::TrueColor | ExportKind::BandPair(_) => &self.optical_collection,
        }
    }

    pub fn fallback_policy(&self) -> Option<FallbackPolicy> {
        self.fallback.then_some(FallbackPolicy {
            widen_days: self.fallback_widen_days,
            max_cloud: self.fallback_max_cloud,
        })
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if let Some(scale) = self.scale {
            if !(scale.is_finite() && scale > 0.0) {
                bail!("export.scale must be a positive number of metres, got {}", scale);
            }
        }
        if self.poll_interval_secs == 0 {
            bail!("export.poll_interval_secs must be at least 1");
        }
        if self.timeout_secs == Some(0) {
            bail!("export.timeout_secs must be at least 1");
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() || prefix.contains(['/', '\\']) {
                bail!("export.prefix must be a plain file name prefix, got '{}'", prefix);
            }
        }
        Ok(())
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn check_percent(key: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 100.0) {
        bail!("{} must be in (0, 100], got {}", key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use urbanlens_algorithms::imagery::SpectralIndex;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.catalog.catalog(), StacCatalog::EarthSearch);
        assert_eq!(config.catalog.max_cloud, 30.0);
        assert_eq!(config.export.folder, PathBuf::from("earth_engine"));
        assert_eq!(config.export.monitor_options().poll_interval, Duration::from_secs(5));
        assert!(config.area.to_aoi().unwrap().is_none());
    }

    #[test]
    fn full_file() {
        let text = r#"
            [area]
            name = "sector14"
            bbox = [77.03, 28.46, 77.06, 28.49]

            [catalog]
            endpoint = "planetary-computer"
            max_cloud = 20
            fallback = false

            [export]
            folder = "exports"
            prefix = "s14"
            scale = 20.0
            poll_interval_secs = 2
            timeout_secs = 600
        "#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.catalog.catalog(), StacCatalog::PlanetaryComputer);
        assert!(config.catalog.fallback_policy().is_none());
        let aoi = config.area.to_aoi().unwrap().unwrap();
        assert!(aoi.contains(77.045, 28.47));
        let monitor = config.export.monitor_options();
        assert_eq!(monitor.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.export.prefix.as_deref(), Some("s14"));
    }

    #[test]
    fn collections_follow_the_product() {
        let catalog = CatalogConfig::default();
        assert_eq!(catalog.collection_for(ExportKind::SurfaceTemperature), LANDSAT_C2_L2);
        assert_eq!(
            catalog.collection_for(ExportKind::BandPair(SpectralIndex::Ndvi)),
            SENTINEL2_L2A
        );
        assert_eq!(catalog.fallback_policy(), Some(FallbackPolicy::default()));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_toml("[catalog]\nmax_cloud = 0").is_err());
        assert!(Config::from_toml("[catalog]\nmax_cloud = 120").is_err());
        assert!(Config::from_toml("[catalog]\nfallback_widen_days = 0").is_err());
        assert!(Config::from_toml("[export]\nscale = -10.0").is_err());
        assert!(Config::from_toml("[export]\npoll_interval_secs = 0").is_err());
        assert!(Config::from_toml("[export]\nprefix = \"a/b\"").is_err());
        assert!(Config::from_toml("[area]\nbbox = [10.0, 5.0, 9.0, 6.0]").is_err());
        assert!(Config::from_toml("[area]\npolygon = [[0.0, 0.0], [1.0, 1.0]]").is_err());
        assert!(Config::from_toml("[catalog]\nunknown = 1").is_err());
    }

    #[test]
    fn polygon_and_bbox_conflict() {
        let text =
            "[area]\nbbox = [0.0, 0.0, 1.0, 1.0]\npolygon = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]";
        assert!(Config::from_toml(text).is_err());
    }

    #[test]
    fn bundled_demo_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/sector14.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.area.name.as_deref(), Some("sector14"));
        let aoi = config.area.to_aoi().unwrap().unwrap();
        assert_eq!(aoi.utm_epsg(), 32643);
        assert!(aoi.contains(77.045, 28.472));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.toml");
        fs::write(&path, "[export]\nfolder = \"out\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.export.folder, PathBuf::from("out"));
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
