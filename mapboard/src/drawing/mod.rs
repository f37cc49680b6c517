//! Drawing surface: features the user drew with the toolbar.
//!
//! Features are kept in the order they were created. The first feature in that order is the one
//! the [buffer workflow](crate::buffer) operates on.

use std::fmt::{Display, Formatter};

use geo_types::Geometry;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};

use crate::error::MapboardError;

mod sketch;

pub use sketch::{Sketch, SketchState};

/// Tool of the drawing toolbar.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawTool {
    /// Polygon from clicked vertices.
    Polygon,
    /// Line from clicked vertices.
    Polyline,
    /// Axis aligned rectangle from two opposite corners.
    Rectangle,
    /// Circle from the center and a point on the rim, stored as a polygon.
    Circle,
    /// Single point.
    Marker,
}

impl DrawTool {
    /// All tools in the toolbar order.
    pub const ALL: [DrawTool; 5] = [
        DrawTool::Polygon,
        DrawTool::Polyline,
        DrawTool::Rectangle,
        DrawTool::Circle,
        DrawTool::Marker,
    ];

    fn accepts(&self, geometry: &Geometry<f64>) -> bool {
        matches!(
            (self, geometry),
            (DrawTool::Marker, Geometry::Point(_))
                | (DrawTool::Polyline, Geometry::LineString(_))
                | (
                    DrawTool::Polygon | DrawTool::Rectangle | DrawTool::Circle,
                    Geometry::Polygon(_)
                )
        )
    }
}

impl Display for DrawTool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DrawTool::Polygon => "polygon",
            DrawTool::Polyline => "polyline",
            DrawTool::Rectangle => "rectangle",
            DrawTool::Circle => "circle",
            DrawTool::Marker => "marker",
        };
        f.write_str(name)
    }
}

/// Which tools the toolbar offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawOptions {
    /// Polygon tool.
    pub polygon: bool,
    /// Line tool.
    pub polyline: bool,
    /// Rectangle tool.
    pub rectangle: bool,
    /// Circle tool.
    pub circle: bool,
    /// Marker tool.
    pub marker: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            polygon: true,
            polyline: true,
            rectangle: true,
            circle: false,
            marker: true,
        }
    }
}

impl DrawOptions {
    /// Returns true if the tool is available in the toolbar.
    pub fn is_enabled(&self, tool: DrawTool) -> bool {
        match tool {
            DrawTool::Polygon => self.polygon,
            DrawTool::Polyline => self.polyline,
            DrawTool::Rectangle => self.rectangle,
            DrawTool::Circle => self.circle,
            DrawTool::Marker => self.marker,
        }
    }

    /// Enabled tools in the toolbar order.
    pub fn enabled_tools(&self) -> impl Iterator<Item = DrawTool> + '_ {
        DrawTool::ALL
            .into_iter()
            .filter(|tool| self.is_enabled(*tool))
    }
}

/// Identifier of a drawn feature. Ids are never reused within a drawing surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(u64);

impl FeatureId {
    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A feature drawn by the user. Coordinates are `x = longitude, y = latitude`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnFeature {
    id: FeatureId,
    tool: DrawTool,
    geometry: Geometry<f64>,
}

impl DrawnFeature {
    /// Id of the feature.
    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// Tool the feature was drawn with.
    pub fn tool(&self) -> DrawTool {
        self.tool
    }

    /// Geometry of the feature.
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Converts the feature into a GeoJSON feature.
    pub fn to_geojson(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("tool".into(), self.tool.to_string().into());

        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: Some(Id::Number(self.id.0.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Ordered collection of the features drawn by the user.
#[derive(Debug, Clone, Default)]
pub struct DrawingSurface {
    options: DrawOptions,
    features: Vec<DrawnFeature>,
    next_id: u64,
}

impl DrawingSurface {
    /// Creates an empty surface accepting the tools enabled in `options`.
    pub fn new(options: DrawOptions) -> Self {
        Self {
            options,
            features: Vec::new(),
            next_id: 0,
        }
    }

    /// Toolbar options.
    pub fn options(&self) -> &DrawOptions {
        &self.options
    }

    /// Appends a feature completed by the drawing toolbar.
    pub fn add(&mut self, tool: DrawTool, geometry: Geometry<f64>) -> Result<FeatureId, MapboardError> {
        if !self.options.is_enabled(tool) {
            return Err(MapboardError::ToolDisabled(tool));
        }
        check_geometry(tool, &geometry)?;

        let id = FeatureId(self.next_id);
        self.next_id += 1;

        log::debug!("Adding {tool} feature {id}");
        self.features.push(DrawnFeature { id, tool, geometry });

        Ok(id)
    }

    /// Replaces the geometry of an existing feature. The feature keeps its place in the order.
    pub fn edit(&mut self, id: FeatureId, geometry: Geometry<f64>) -> Result<(), MapboardError> {
        let feature = self
            .features
            .iter_mut()
            .find(|feature| feature.id == id)
            .ok_or(MapboardError::FeatureNotFound(id))?;

        check_geometry(feature.tool, &geometry)?;
        feature.geometry = geometry;

        Ok(())
    }

    /// Removes a feature and returns it.
    pub fn remove(&mut self, id: FeatureId) -> Result<DrawnFeature, MapboardError> {
        let index = self
            .features
            .iter()
            .position(|feature| feature.id == id)
            .ok_or(MapboardError::FeatureNotFound(id))?;

        Ok(self.features.remove(index))
    }

    /// The earliest drawn feature that is still on the surface.
    pub fn first(&self) -> Option<&DrawnFeature> {
        self.features.first()
    }

    /// Iterates over features in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &DrawnFeature> + '_ {
        self.features.iter()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// All features as a GeoJSON feature collection.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().map(DrawnFeature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

fn check_geometry(tool: DrawTool, geometry: &Geometry<f64>) -> Result<(), MapboardError> {
    if tool.accepts(geometry) {
        Ok(())
    } else {
        Err(MapboardError::GeometryMismatch {
            tool,
            geometry: geometry_name(geometry),
        })
    }
}

pub(crate) fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "line string",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multi point",
        Geometry::MultiLineString(_) => "multi line string",
        Geometry::MultiPolygon(_) => "multi polygon",
        Geometry::GeometryCollection(_) => "geometry collection",
        Geometry::Rect(_) => "rectangle",
        Geometry::Triangle(_) => "triangle",
    }
}
