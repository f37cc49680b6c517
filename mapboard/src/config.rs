//! Application configuration.
//!
//! The configuration is a JSON document. Every section is optional, missing values are taken
//! from [`MapboardConfig::default()`], which describes the map of India with OpenStreetMap and
//! satellite base layers and four administrative boundary overlays.
//!
//! ```json
//! {
//!   "view": { "center": [20.5937, 78.9629], "zoom": 5 },
//!   "overlays": [
//!     {
//!       "name": "India State",
//!       "source": {
//!         "type": "wms",
//!         "url": "https://wms.qgiscloud.com/shubhamgeoinfo/Database_using_QGIS/",
//!         "layers": "India_State",
//!         "format": "image/png",
//!         "transparent": true
//!       },
//!       "visible": true
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{LayerConfig, TileSource};
use crate::drawing::DrawOptions;
use crate::error::MapboardError;
use crate::measure::MeasureOptions;
use crate::MapView;

const QGIS_CLOUD_WMS: &str = "https://wms.qgiscloud.com/shubhamgeoinfo/Database_using_QGIS/";

/// Complete configuration of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapboardConfig {
    /// Initial view.
    pub view: ViewConfig,
    /// Base layers, one of which is shown at a time.
    pub base_layers: Vec<LayerConfig>,
    /// Overlay layers, toggled independently.
    pub overlays: Vec<LayerConfig>,
    /// Drawing toolbar options.
    pub draw: DrawOptions,
    /// Measurement tool options.
    pub measure: MeasureOptions,
    /// Colors of the vector layers.
    pub style: StyleConfig,
    /// Folder for the on-disk tile cache. Ignored in browsers.
    pub tile_cache: Option<PathBuf>,
}

impl MapboardConfig {
    /// Parses the configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, MapboardError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MapboardError> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());

        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Initial map view.
    pub fn map_view(&self) -> MapView {
        let [lat, lon] = self.view.center;
        MapView::new(lat, lon, self.view.zoom, self.view.max_zoom)
    }
}

impl Default for MapboardConfig {
    fn default() -> Self {
        let osm = LayerConfig::new(
            "OpenStreetMap",
            TileSource::xyz("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"),
        )
        .with_attribution("© OpenStreetMap contributors")
        .with_attribution_url("https://www.openstreetmap.org/copyright")
        .visible();

        let satellite = LayerConfig::new(
            "Satellite",
            TileSource::Xyz {
                url: "https://{s}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}".into(),
                subdomains: ["mt0", "mt1", "mt2", "mt3"].map(String::from).to_vec(),
                max_zoom: 19,
            },
        )
        .with_attribution("© Google Satellite")
        .with_attribution_url("https://www.google.com/maps");

        let overlays = [
            ("India Country", "India_country"),
            ("India State", "India_State"),
            ("India District", "India_District"),
            ("India Block", "India_Block"),
        ]
        .into_iter()
        .map(|(name, layer)| {
            LayerConfig::new(name, TileSource::wms(QGIS_CLOUD_WMS, layer))
                .with_attribution("QGIS Cloud")
                .with_attribution_url("https://qgiscloud.com")
        })
        .collect();

        Self {
            view: ViewConfig::default(),
            base_layers: vec![osm, satellite],
            overlays,
            draw: DrawOptions::default(),
            measure: MeasureOptions::default(),
            style: StyleConfig::default(),
            tile_cache: None,
        }
    }
}

/// Initial position of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Center point as `[lat, lon]`.
    pub center: [f64; 2],
    /// Zoom level.
    pub zoom: u32,
    /// Maximum zoom level.
    pub max_zoom: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: [20.5937, 78.9629],
            zoom: 5,
            max_zoom: 19,
        }
    }
}

/// Colors used to draw vector layers, as `#RRGGBB` or `#RRGGBBAA` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Color of the features drawn by the user.
    pub drawn: String,
    /// Color of buffer polygons.
    pub buffer: String,
    /// Color of features imported from shapefiles.
    pub imported: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            drawn: "#3388ff".into(),
            buffer: "#3388ff".into(),
            imported: "#3388ff".into(),
        }
    }
}
