//! Pipeline configuration.
//!
//! Every field has a default matching the Jackson County / Ashland
//! deployment, so an empty or missing `parcelmap.toml` is valid. The data
//! directory can be moved with `PARCELMAP_HOME`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional config file looked up in the data directory.
pub const CONFIG_FILE: &str = "parcelmap.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub pdo: PdoConfig,
    #[serde(default)]
    pub gis: GisConfig,
    #[serde(default)]
    pub aggregate: AggregateConfig,
}

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("PARCELMAP_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl PathsConfig {
    pub fn parcels_json(&self) -> PathBuf {
        self.data_dir.join("parcels.json")
    }

    pub fn sales_dir(&self) -> PathBuf {
        self.data_dir.join("sales")
    }

    pub fn aggregates_dir(&self) -> PathBuf {
        self.data_dir.join("aggregates")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn fetch_ledger(&self) -> PathBuf {
        self.data_dir.join("fetch-ledger.jsonl")
    }
}

/// Shared HTTP behaviour for both the records site and GIS layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry wait; doubles on each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "parcelmap/{} (personal real estate research)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Property Data Online crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdoConfig {
    /// Base URL the three document endpoints hang off.
    #[serde(default = "default_pdo_base")]
    pub base_url: String,
    /// Minimum spacing between live requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Bodies shorter than this are logged as suspicious.
    #[serde(default = "default_min_body_len")]
    pub min_body_len: usize,
    /// Parcel index checkpoint interval during `harvest`.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
}

impl Default for PdoConfig {
    fn default() -> Self {
        Self {
            base_url: default_pdo_base(),
            request_delay_ms: default_request_delay_ms(),
            min_body_len: default_min_body_len(),
            checkpoint_interval: default_checkpoint_interval(),
        }
    }
}

fn default_pdo_base() -> String {
    "https://pdo.jacksoncountyor.gov/pdo/".to_string()
}

fn default_request_delay_ms() -> u64 {
    750
}

fn default_min_body_len() -> usize {
    200
}

fn default_checkpoint_interval() -> usize {
    50
}

/// Output format requested from an ArcGIS layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerFormat {
    /// Native feature-server JSON (`rings` geometry).
    Json,
    /// GeoJSON (`Polygon` / `MultiPolygon`).
    Geojson,
}

impl LayerFormat {
    pub fn as_param(&self) -> &'static str {
        match self {
            LayerFormat::Json => "json",
            LayerFormat::Geojson => "geojson",
        }
    }
}

/// One queryable parcel layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    /// Layer URL; `/query` is appended.
    pub url: String,
    /// Attribute holding the map/taxlot code, used for the prefix filter.
    pub taxlot_field: String,
    pub page_size: usize,
    #[serde(default = "default_format")]
    pub format: LayerFormat,
}

fn default_format() -> LayerFormat {
    LayerFormat::Json
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.ymin..=self.ymax).contains(&lat) && (self.xmin..=self.xmax).contains(&lng)
    }
}

/// GIS reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GisConfig {
    /// Seed layers in priority order.
    #[serde(default = "default_seed_layers")]
    pub seed_layers: Vec<LayerConfig>,
    /// Layer providing account numbers and attributes.
    #[serde(default = "default_enrichment_layer")]
    pub enrichment_layer: LayerConfig,
    /// Map/taxlot prefix of the target region.
    #[serde(default = "default_map_prefix")]
    pub map_prefix: String,
    /// Fallback region test for parcels without a map/taxlot.
    #[serde(default = "default_bbox")]
    pub bbox: BoundingBox,
    /// Also send `bbox` as a server-side envelope filter on seed queries.
    #[serde(default)]
    pub seed_envelope: bool,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

impl Default for GisConfig {
    fn default() -> Self {
        Self {
            seed_layers: default_seed_layers(),
            enrichment_layer: default_enrichment_layer(),
            map_prefix: default_map_prefix(),
            bbox: default_bbox(),
            seed_envelope: false,
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

const JCGIS_BASE: &str = "https://spatial.jacksoncountyor.gov/arcgis/rest/services";
const JCGIS_AGOL: &str =
    "https://services1.arcgis.com/DwYBkWQPdaJNWrPG/arcgis/rest/services/Taxlots/FeatureServer/0";
const ODOT_TAXLOTS: &str =
    "https://gis.odot.state.or.us/arcgis1006/rest/services/ames/ames/MapServer/34";

fn default_seed_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig {
            name: "jcgis-reference".into(),
            url: format!("{JCGIS_BASE}/OpenData/ReferenceData/MapServer/3"),
            taxlot_field: "MAPLOT".into(),
            page_size: 1000,
            format: LayerFormat::Json,
        },
        LayerConfig {
            name: "jcgis-survey".into(),
            url: format!("{JCGIS_BASE}/Survey/SurveyIndexingV2/MapServer/75"),
            taxlot_field: "MAPLOT".into(),
            page_size: 1000,
            format: LayerFormat::Json,
        },
        LayerConfig {
            name: "odot".into(),
            url: ODOT_TAXLOTS.into(),
            taxlot_field: "MapTaxlot".into(),
            page_size: 2000,
            format: LayerFormat::Json,
        },
        LayerConfig {
            name: "jcgis-agol".into(),
            url: JCGIS_AGOL.into(),
            taxlot_field: "MAPLOT".into(),
            page_size: 1000,
            format: LayerFormat::Json,
        },
    ]
}

fn default_enrichment_layer() -> LayerConfig {
    LayerConfig {
        name: "jcgis-agol".into(),
        url: JCGIS_AGOL.into(),
        taxlot_field: "MAPLOT".into(),
        page_size: 1000,
        format: LayerFormat::Json,
    }
}

fn default_map_prefix() -> String {
    "391E".to_string()
}

fn default_bbox() -> BoundingBox {
    BoundingBox {
        xmin: -122.78,
        ymin: 42.14,
        xmax: -122.64,
        ymax: 42.25,
    }
}

fn default_page_delay_ms() -> u64 {
    500
}

/// Spatial aggregation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Hex size in degrees (about 100 m at the reference latitude).
    #[serde(default = "default_cell_deg")]
    pub hex_size_deg: f64,
    #[serde(default = "default_cell_deg")]
    pub grid_size_deg: f64,
    /// Latitude used when projecting hex centers back to degrees.
    #[serde(default = "default_reference_lat")]
    pub reference_lat: f64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            hex_size_deg: default_cell_deg(),
            grid_size_deg: default_cell_deg(),
            reference_lat: default_reference_lat(),
        }
    }
}

fn default_cell_deg() -> f64 {
    0.001
}

fn default_reference_lat() -> f64 {
    42.1945
}

/// `<data_dir>/parcelmap.toml`, then `~/.config/parcelmap/parcelmap.toml`.
fn implicit_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![default_data_dir().join(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("parcelmap").join(CONFIG_FILE));
    }
    paths
}

impl PipelineConfig {
    /// Load from an explicit file, else the first `parcelmap.toml` found
    /// in the data directory or the user config directory, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => implicit_config_paths().into_iter().find(|p| p.exists()),
        };

        match candidate {
            Some(p) => {
                let content = std::fs::read_to_string(&p)
                    .with_context(|| format!("failed to read config {}", p.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("failed to parse config {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Config rooted at `dir`, everything else default. Used by tests and
    /// by `--data-dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.data_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg = PipelineConfig::from_toml("").unwrap();
        assert_eq!(cfg.http.max_attempts, 3);
        assert_eq!(cfg.http.backoff_ms, 2000);
        assert_eq!(cfg.pdo.request_delay_ms, 750);
        assert_eq!(cfg.gis.map_prefix, "391E");
        assert_eq!(cfg.gis.seed_layers.len(), 4);
        assert_eq!(cfg.gis.seed_layers[2].name, "odot");
        assert!(!cfg.gis.seed_envelope);
        assert_eq!(cfg.aggregate.hex_size_deg, 0.001);
    }

    #[test]
    fn test_partial_override() {
        let cfg = PipelineConfig::from_toml(
            r#"
[http]
max_attempts = 5

[pdo]
base_url = "http://localhost:9999/pdo/"
checkpoint_interval = 10

[gis]
map_prefix = "381E"
"#,
        )
        .unwrap();
        assert_eq!(cfg.http.max_attempts, 5);
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.pdo.base_url, "http://localhost:9999/pdo/");
        assert_eq!(cfg.pdo.checkpoint_interval, 10);
        assert_eq!(cfg.pdo.min_body_len, 200);
        assert_eq!(cfg.gis.map_prefix, "381E");
        assert!(!cfg.gis.seed_layers.is_empty());
    }

    #[test]
    fn test_paths_layout() {
        let cfg = PipelineConfig::default().with_data_dir("/srv/parcels");
        assert_eq!(
            cfg.paths.parcels_json(),
            PathBuf::from("/srv/parcels/parcels.json")
        );
        assert_eq!(cfg.paths.sales_dir(), PathBuf::from("/srv/parcels/sales"));
        assert_eq!(
            cfg.paths.cache_dir(),
            PathBuf::from("/srv/parcels/cache")
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[aggregate]\nhex_size_deg = 0.002\n").unwrap();
        let cfg = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.aggregate.hex_size_deg, 0.002);
        assert_eq!(cfg.aggregate.grid_size_deg, 0.001);

        std::fs::write(&path, "[aggregate\n").unwrap();
        assert!(PipelineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_bbox_contains() {
        let bbox = default_bbox();
        assert!(bbox.contains(42.1945, -122.7095));
        assert!(!bbox.contains(42.40, -122.7095));
        assert!(!bbox.contains(42.19, -122.90));
    }
}
