//! Layer catalog: the fixed set of base and overlay raster layers a user can switch between.
//!
//! Base layers have radio semantics, exactly one is active at any moment. Overlays are
//! toggled independently of each other and of the base layer. The catalog does not fetch
//! anything; it only describes where tiles come from (see [`TileSource::tile_url`]) and which
//! layers are currently shown.

use std::collections::{HashMap, HashSet};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::MapboardError;
use crate::tile::{TileIndex, TILE_SIZE};

const DEFAULT_MAX_ZOOM: u32 = 19;

/// Characters escaped in WMS query values, the same set as JavaScript's `encodeURIComponent`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Major and minor numbers of a WMS version string. Missing or malformed parts count as 0.
fn wms_version(version: &str) -> (u32, u32) {
    let mut parts = version
        .trim()
        .split('.')
        .map(|part| part.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

/// Source of raster tiles for a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileSource {
    /// Tiles requested by `{z}/{x}/{y}` url template. `{s}` is replaced with one of the
    /// subdomains.
    Xyz {
        /// Url template.
        url: String,
        /// Subdomains substituted for `{s}`.
        #[serde(default = "default_subdomains")]
        subdomains: Vec<String>,
        /// Maximum zoom level the source provides.
        #[serde(default = "default_max_zoom")]
        max_zoom: u32,
    },
    /// Tiles rendered by a WMS server with `GetMap` requests.
    Wms {
        /// Service endpoint.
        url: String,
        /// Comma separated list of layer names.
        layers: String,
        /// Image mime type.
        #[serde(default = "default_wms_format")]
        format: String,
        /// Whether the server should render transparent background.
        #[serde(default)]
        transparent: bool,
        /// WMS protocol version.
        #[serde(default = "default_wms_version")]
        version: String,
        /// Comma separated list of styles.
        #[serde(default)]
        styles: String,
    },
}

fn default_subdomains() -> Vec<String> {
    vec!["a".into(), "b".into(), "c".into()]
}

fn default_max_zoom() -> u32 {
    DEFAULT_MAX_ZOOM
}

fn default_wms_format() -> String {
    "image/jpeg".into()
}

fn default_wms_version() -> String {
    "1.1.1".into()
}

impl TileSource {
    /// Creates an xyz source with the default `a`, `b`, `c` subdomains.
    pub fn xyz(url: impl Into<String>) -> Self {
        Self::Xyz {
            url: url.into(),
            subdomains: default_subdomains(),
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    /// Creates a transparent WMS source rendering `layers` as png images.
    pub fn wms(url: impl Into<String>, layers: impl Into<String>) -> Self {
        Self::Wms {
            url: url.into(),
            layers: layers.into(),
            format: "image/png".into(),
            transparent: true,
            version: default_wms_version(),
            styles: String::new(),
        }
    }

    /// Maximum zoom level of the source. WMS servers render any zoom level.
    pub fn max_zoom(&self) -> u32 {
        match self {
            Self::Xyz { max_zoom, .. } => *max_zoom,
            Self::Wms { .. } => DEFAULT_MAX_ZOOM,
        }
    }

    /// Url of the image for the given tile.
    pub fn tile_url(&self, index: &TileIndex) -> Result<String, MapboardError> {
        match self {
            Self::Xyz {
                url, subdomains, ..
            } => {
                let mut vars = HashMap::new();
                vars.insert("x".to_string(), index.x.to_string());
                vars.insert("y".to_string(), index.y.to_string());
                vars.insert("z".to_string(), index.z.to_string());
                if !subdomains.is_empty() {
                    let subdomain = (index.x + index.y).unsigned_abs() as usize % subdomains.len();
                    vars.insert("s".to_string(), subdomains[subdomain].clone());
                }

                strfmt::strfmt(url, &vars).map_err(|err| MapboardError::UrlTemplate {
                    template: url.clone(),
                    reason: err.to_string(),
                })
            }
            Self::Wms {
                url,
                layers,
                format,
                transparent,
                version,
                styles,
            } => {
                let [min_x, min_y, max_x, max_y] = index.mercator_bbox();
                let crs_key = if wms_version(version) >= (1, 3) { "crs" } else { "srs" };
                let separator = if url.contains('?') { '&' } else { '?' };
                let layers = utf8_percent_encode(layers, QUERY_VALUE);
                let styles = utf8_percent_encode(styles, QUERY_VALUE);
                let format = utf8_percent_encode(format, QUERY_VALUE);
                let version = utf8_percent_encode(version, QUERY_VALUE);

                Ok(format!(
                    "{url}{separator}service=WMS&request=GetMap&layers={layers}&styles={styles}\
                     &format={format}&transparent={transparent}&version={version}\
                     &width={TILE_SIZE}&height={TILE_SIZE}&{crs_key}=EPSG:3857\
                     &bbox={min_x},{min_y},{max_x},{max_y}"
                ))
            }
        }
    }
}

/// Description of a single catalog layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Name shown in the layer switcher. Must be unique within the catalog.
    pub name: String,
    /// Where the tiles come from.
    pub source: TileSource,
    /// Attribution text of the data provider.
    #[serde(default)]
    pub attribution: Option<String>,
    /// Link shown with the attribution.
    #[serde(default)]
    pub attribution_url: Option<String>,
    /// Whether the layer is active at startup.
    #[serde(default)]
    pub visible: bool,
}

impl LayerConfig {
    /// Creates a layer that is hidden at startup.
    pub fn new(name: impl Into<String>, source: TileSource) -> Self {
        Self {
            name: name.into(),
            source,
            attribution: None,
            attribution_url: None,
            visible: false,
        }
    }

    /// Sets the attribution text.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    /// Sets the attribution link.
    pub fn with_attribution_url(mut self, url: impl Into<String>) -> Self {
        self.attribution_url = Some(url.into());
        self
    }

    /// Marks the layer as visible at startup.
    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }
}

/// Base and overlay layers registered in the layer switcher.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    base_layers: Vec<LayerConfig>,
    overlays: Vec<LayerConfig>,
    active_base: usize,
    overlay_visibility: Vec<bool>,
}

impl LayerCatalog {
    /// Creates a catalog.
    ///
    /// The first base layer marked `visible` is active, or the first base layer if none is.
    /// Overlays start with their configured visibility. Fails if there are no base layers, if
    /// names are not unique or if a url template cannot be expanded.
    pub fn new(
        base_layers: Vec<LayerConfig>,
        overlays: Vec<LayerConfig>,
    ) -> Result<Self, MapboardError> {
        if base_layers.is_empty() {
            return Err(MapboardError::InvalidCatalog(
                "at least one base layer is required".into(),
            ));
        }

        let mut names = HashSet::new();
        for layer in base_layers.iter().chain(&overlays) {
            if !names.insert(layer.name.as_str()) {
                return Err(MapboardError::InvalidCatalog(format!(
                    "duplicate layer name '{}'",
                    layer.name
                )));
            }

            layer.source.tile_url(&TileIndex::new(0, 0, 0))?;
        }

        let active_base = base_layers
            .iter()
            .position(|layer| layer.visible)
            .unwrap_or(0);
        let overlay_visibility = overlays.iter().map(|layer| layer.visible).collect();

        Ok(Self {
            base_layers,
            overlays,
            active_base,
            overlay_visibility,
        })
    }

    /// All base layers in the order of registration.
    pub fn base_layers(&self) -> &[LayerConfig] {
        &self.base_layers
    }

    /// All overlay layers in the order of registration.
    pub fn overlays(&self) -> &[LayerConfig] {
        &self.overlays
    }

    /// Index of the active base layer.
    pub fn active_base_index(&self) -> usize {
        self.active_base
    }

    /// The active base layer.
    pub fn active_base(&self) -> &LayerConfig {
        &self.base_layers[self.active_base]
    }

    /// Makes the base layer with the given name the only active one. Returns its index.
    pub fn select_base(&mut self, name: &str) -> Result<usize, MapboardError> {
        let index = self
            .base_layers
            .iter()
            .position(|layer| layer.name == name)
            .ok_or_else(|| MapboardError::UnknownLayer(name.to_string()))?;

        self.active_base = index;
        Ok(index)
    }

    /// Returns true if the overlay at `index` is shown.
    pub fn is_overlay_visible(&self, index: usize) -> bool {
        self.overlay_visibility.get(index).copied().unwrap_or(false)
    }

    /// Shows or hides the overlay with the given name. Returns its index.
    pub fn set_overlay_visible(&mut self, name: &str, visible: bool) -> Result<usize, MapboardError> {
        let index = self.overlay_index(name)?;
        self.overlay_visibility[index] = visible;
        Ok(index)
    }

    /// Iterates over the overlays currently shown.
    pub fn visible_overlays(&self) -> impl Iterator<Item = &LayerConfig> + '_ {
        self.overlays
            .iter()
            .zip(&self.overlay_visibility)
            .filter_map(|(layer, visible)| visible.then_some(layer))
    }

    fn overlay_index(&self, name: &str) -> Result<usize, MapboardError> {
        self.overlays
            .iter()
            .position(|layer| layer.name == name)
            .ok_or_else(|| MapboardError::UnknownLayer(name.to_string()))
    }
}
