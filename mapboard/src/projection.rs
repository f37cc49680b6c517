//! Coordinate systems of imported shapefiles.
//!
//! A shapefile states its coordinate system in the `.prj` member as ESRI WKT. Geographic
//! systems are used as is, Web Mercator is unprojected directly and other supported projections
//! are inverted with `geodesy`. Anything else is rejected, since drawing projected meters as
//! degrees gives a layer in the wrong place.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use geodesy::prelude::*;

use crate::error::MapboardError;
use crate::tile::mercator_to_lonlat;

const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// Coordinate system of a shapefile.
#[derive(Debug)]
pub(crate) enum SourceCrs {
    /// Longitude and latitude in degrees.
    Geographic,
    /// Spherical Web Mercator (EPSG:3857).
    WebMercator,
    /// Any other supported projection.
    Projected(ProjectedCrs),
}

impl SourceCrs {
    /// Reads the coordinate system from the contents of a `.prj` file. An empty file is
    /// taken as geographic coordinates.
    pub(crate) fn from_prj(prj: &str) -> Result<Self, MapboardError> {
        let prj = prj.trim();
        if prj.is_empty() {
            return Ok(Self::Geographic);
        }

        let root = WktParser::new(prj)
            .parse()
            .ok_or_else(|| unsupported("the .prj file is not valid WKT"))?;

        match root.keyword.to_ascii_uppercase().as_str() {
            "GEOGCS" | "GEOGCRS" | "GEODCRS" => Ok(Self::Geographic),
            "PROJCS" => Self::from_projcs(&root),
            other => Err(unsupported(format!("{other} definitions are not supported"))),
        }
    }

    fn from_projcs(root: &WktNode) -> Result<Self, MapboardError> {
        let method = root
            .child("PROJECTION")
            .and_then(WktNode::name)
            .map(normalize)
            .ok_or_else(|| unsupported("projection method is missing"))?;

        if is_web_mercator(root, &method) {
            return Ok(Self::WebMercator);
        }

        ProjectedCrs::new(root, &method).map(Self::Projected)
    }

    /// Converts a geometry in this coordinate system into longitude and latitude.
    pub(crate) fn to_lonlat(&self, geometry: Geometry<f64>) -> Result<Geometry<f64>, MapboardError> {
        match self {
            Self::Geographic => Ok(geometry),
            Self::WebMercator => Ok(geometry.map_coords(mercator_to_lonlat)),
            Self::Projected(crs) => geometry.try_map_coords(|coord| crs.unproject(coord)),
        }
    }
}

fn unsupported(reason: impl Into<String>) -> MapboardError {
    MapboardError::UnsupportedProjection(reason.into())
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

fn is_web_mercator(root: &WktNode, method: &str) -> bool {
    if matches!(
        method,
        "mercator_auxiliary_sphere" | "popular_visualisation_pseudo_mercator"
    ) {
        return true;
    }

    let name = root.name().map(normalize).unwrap_or_default();
    if name.contains("web_mercator") || name.contains("pseudo_mercator") {
        return true;
    }

    root.child("AUTHORITY")
        .and_then(|authority| authority.text(1))
        .is_some_and(|code| matches!(code, "3857" | "900913" | "102100"))
}

/// Inverse of a map projection, backed by a `geodesy` operator.
pub(crate) struct ProjectedCrs {
    context: Minimal,
    op: OpHandle,
    definition: String,
    to_meters: f64,
}

impl Debug for ProjectedCrs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectedCrs")
            .field("definition", &self.definition)
            .field("to_meters", &self.to_meters)
            .finish()
    }
}

impl ProjectedCrs {
    fn new(root: &WktNode, method: &str) -> Result<Self, MapboardError> {
        let operator = match method {
            "transverse_mercator" | "gauss_kruger" => "tmerc",
            "mercator" | "mercator_1sp" | "mercator_2sp" => "merc",
            "lambert_conformal_conic"
            | "lambert_conformal_conic_1sp"
            | "lambert_conformal_conic_2sp" => "lcc",
            "lambert_azimuthal_equal_area" => "laea",
            _ => return Err(unsupported(format!("projection method {method}"))),
        };

        let to_meters = root
            .child("UNIT")
            .and_then(|unit| unit.number(0))
            .filter(|factor| *factor > 0.0)
            .unwrap_or(1.0);

        let (semi_major_axis, inverse_flattening) = root
            .child("GEOGCS")
            .and_then(|geogcs| geogcs.child("DATUM"))
            .and_then(|datum| datum.child("SPHEROID"))
            .and_then(|spheroid| Some((spheroid.number(0)?, spheroid.number(1)?)))
            .unwrap_or((WGS84_SEMI_MAJOR_AXIS, WGS84_INVERSE_FLATTENING));
        if inverse_flattening <= 0.0 {
            return Err(unsupported("spherical datums are not supported"));
        }

        let parameters: BTreeMap<String, f64> = root
            .children("PARAMETER")
            .filter_map(|parameter| Some((normalize(parameter.name()?), parameter.number(0)?)))
            .collect();
        let parameter = |keys: &[&str]| keys.iter().find_map(|key| parameters.get(*key).copied());

        let latitude_of_origin = parameter(&["latitude_of_origin", "latitude_of_center"]);
        let mut values = vec![
            ("lon_0", parameter(&["central_meridian", "longitude_of_center", "longitude_of_origin"])),
            ("x_0", parameter(&["false_easting"]).map(|value| value * to_meters)),
            ("y_0", parameter(&["false_northing"]).map(|value| value * to_meters)),
        ];
        match operator {
            "tmerc" => {
                values.push(("lat_0", latitude_of_origin));
                values.push(("k_0", parameter(&["scale_factor"])));
            }
            "merc" => {
                values.push(("lat_ts", parameter(&["standard_parallel_1"])));
                values.push(("k_0", parameter(&["scale_factor"])));
            }
            "lcc" => {
                let first_parallel = parameter(&["standard_parallel_1"]).or(latitude_of_origin);
                values.push(("lat_0", latitude_of_origin.or(first_parallel)));
                values.push(("lat_1", first_parallel));
                values.push(("lat_2", parameter(&["standard_parallel_2"])));
                values.push(("k_0", parameter(&["scale_factor"])));
            }
            _ => values.push(("lat_0", latitude_of_origin)),
        }

        let mut definition = format!("{operator} ellps={semi_major_axis},{inverse_flattening}");
        for (key, value) in values {
            if let Some(value) = value {
                definition.push_str(&format!(" {key}={value}"));
            }
        }

        let mut context = Minimal::new();
        let op = context
            .op(&definition)
            .map_err(|err| unsupported(format!("{definition}: {err}")))?;
        log::debug!("Unprojecting shapefile coordinates with '{definition}'");

        Ok(Self {
            context,
            op,
            definition,
            to_meters,
        })
    }

    fn unproject(&self, coord: Coord<f64>) -> Result<Coord<f64>, MapboardError> {
        let mut data = [Coor2D::raw(coord.x * self.to_meters, coord.y * self.to_meters)];
        self.context
            .apply(self.op, Inv, &mut data)
            .map_err(|err| unsupported(format!("{}: {err}", self.definition)))?;

        let [lon, lat] = data[0].0;
        if !lon.is_finite() || !lat.is_finite() {
            return Err(unsupported(format!(
                "point ({}, {}) is outside of {}",
                coord.x, coord.y, self.definition
            )));
        }

        Ok(Coord {
            x: lon.to_degrees(),
            y: lat.to_degrees(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum WktValue {
    Text(String),
    Number(f64),
    Node(WktNode),
}

/// `KEYWORD[value, ...]` element of a WKT string.
#[derive(Debug, Clone, PartialEq)]
struct WktNode {
    keyword: String,
    values: Vec<WktValue>,
}

impl WktNode {
    fn children<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a WktNode> + 'a {
        self.values.iter().filter_map(move |value| match value {
            WktValue::Node(node) if node.keyword.eq_ignore_ascii_case(keyword) => Some(node),
            _ => None,
        })
    }

    fn child<'a>(&'a self, keyword: &'a str) -> Option<&'a WktNode> {
        self.children(keyword).next()
    }

    fn name(&self) -> Option<&str> {
        self.text(0)
    }

    fn text(&self, index: usize) -> Option<&str> {
        match self.values.get(index)? {
            WktValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The `index`-th number among the values of the node.
    fn number(&self, index: usize) -> Option<f64> {
        self.values
            .iter()
            .filter_map(|value| match value {
                WktValue::Number(number) => Some(*number),
                _ => None,
            })
            .nth(index)
    }
}

struct WktParser<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> WktParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    fn parse(mut self) -> Option<WktNode> {
        let node = self.node()?;
        self.skip_whitespace();
        self.rest().is_empty().then_some(node)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.position;
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
        &self.text[start..self.position]
    }

    fn node(&mut self) -> Option<WktNode> {
        self.skip_whitespace();
        let keyword = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if keyword.is_empty() {
            return None;
        }

        self.skip_whitespace();
        let close = match self.bump()? {
            '[' => ']',
            '(' => ')',
            _ => return None,
        };

        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            values.push(self.value()?);
            self.skip_whitespace();
            match self.bump()? {
                ',' => continue,
                c if c == close => break,
                _ => return None,
            }
        }

        Some(WktNode {
            keyword: keyword.to_string(),
            values,
        })
    }

    fn value(&mut self) -> Option<WktValue> {
        match self.peek()? {
            '"' => self.quoted().map(WktValue::Text),
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let number = self.take_while(|c| c.is_ascii_digit() || "+-.eE".contains(c));
                number.parse().ok().map(WktValue::Number)
            }
            _ => {
                let start = self.position;
                let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                self.skip_whitespace();
                if matches!(self.peek(), Some('[' | '(')) {
                    self.position = start;
                    self.node().map(WktValue::Node)
                } else {
                    (!word.is_empty()).then(|| WktValue::Text(word.to_string()))
                }
            }
        }
    }

    fn quoted(&mut self) -> Option<String> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump()? {
                '"' if self.peek() == Some('"') => {
                    self.bump();
                    text.push('"');
                }
                '"' => return Some(text),
                c => text.push(c),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use geo_types::{point, Point};

    use super::*;

    pub(crate) const WEB_MERCATOR_PRJ: &str = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#;
    pub(crate) const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
    pub(crate) const UTM_43N_PRJ: &str = r#"PROJCS["WGS_1984_UTM_Zone_43N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",75.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;
    const UTM_43N_FEET_PRJ: &str = r#"PROJCS["UTM_43N_Feet",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",1640416.6666666667],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",75.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Foot_US",0.3048006096012192]]"#;
    const ALBERS_PRJ: &str = r#"PROJCS["India_Albers",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Albers"],PARAMETER["Central_Meridian",80.0],UNIT["Meter",1.0]]"#;

    fn lonlat(crs: &SourceCrs, x: f64, y: f64) -> Coord<f64> {
        match crs.to_lonlat(point!(x: x, y: y).into()) {
            Ok(Geometry::Point(Point(coord))) => coord,
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn parses_wkt_tree() {
        let root = WktParser::new(r#"UNIT["Foot ""US""", 0.3048, AUTHORITY["EPSG", "9003"]]"#)
            .parse()
            .expect("valid wkt");

        assert_eq!(root.keyword, "UNIT");
        assert_eq!(root.name(), Some(r#"Foot "US""#));
        assert_eq!(root.number(0), Some(0.3048));
        assert_eq!(root.child("authority").and_then(|a| a.text(1)), Some("9003"));

        let axis = WktParser::new(r#"AXIS["Easting", EAST]"#).parse().expect("valid wkt");
        assert_eq!(axis.text(1), Some("EAST"));

        assert!(WktParser::new("UNIT[\"Meter\",1.0").parse().is_none());
        assert!(WktParser::new("UNIT[\"Meter\",1.0]]").parse().is_none());
        assert!(WktParser::new("not wkt").parse().is_none());
    }

    #[test]
    fn detects_coordinate_systems() {
        assert_matches!(SourceCrs::from_prj(""), Ok(SourceCrs::Geographic));
        assert_matches!(SourceCrs::from_prj(WGS84_PRJ), Ok(SourceCrs::Geographic));
        assert_matches!(SourceCrs::from_prj(WEB_MERCATOR_PRJ), Ok(SourceCrs::WebMercator));
        assert_matches!(SourceCrs::from_prj(UTM_43N_PRJ), Ok(SourceCrs::Projected(_)));
    }

    #[test]
    fn rejects_unsupported_definitions() {
        assert_matches!(
            SourceCrs::from_prj(ALBERS_PRJ),
            Err(MapboardError::UnsupportedProjection(reason)) if reason.contains("albers")
        );
        assert_matches!(
            SourceCrs::from_prj("garbage"),
            Err(MapboardError::UnsupportedProjection(_))
        );
        assert_matches!(
            SourceCrs::from_prj(r#"VERT_CS["height",VERT_DATUM["Ordnance",2005]]"#),
            Err(MapboardError::UnsupportedProjection(_))
        );
    }

    #[test]
    fn utm_false_origin_is_central_meridian() {
        let crs = SourceCrs::from_prj(UTM_43N_PRJ).expect("supported");
        let coord = lonlat(&crs, 500_000.0, 0.0);
        assert_relative_eq!(coord.x, 75.0, epsilon = 1e-9);
        assert_relative_eq!(coord.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn utm_matches_geodesy_zone_definition() {
        let mut context = Minimal::new();
        let op = context.op("utm zone=43").expect("valid operator");
        let mut data = [Coor2D::geo(28.6139, 77.209)];
        context.apply(op, Fwd, &mut data).expect("projected");
        let [x, y] = data[0].0;

        let crs = SourceCrs::from_prj(UTM_43N_PRJ).expect("supported");
        let coord = lonlat(&crs, x, y);
        assert_relative_eq!(coord.x, 77.209, epsilon = 1e-7);
        assert_relative_eq!(coord.y, 28.6139, epsilon = 1e-7);
    }

    #[test]
    fn linear_units_are_converted_to_meters() {
        let crs = SourceCrs::from_prj(UTM_43N_FEET_PRJ).expect("supported");
        let coord = lonlat(&crs, 1_640_416.666_666_666_7, 0.0);
        assert_relative_eq!(coord.x, 75.0, epsilon = 1e-7);
        assert_relative_eq!(coord.y, 0.0, epsilon = 1e-7);
    }

    #[test]
    fn web_mercator_is_unprojected() {
        let crs = SourceCrs::from_prj(WEB_MERCATOR_PRJ).expect("supported");
        let coord = lonlat(&crs, 0.0, 0.0);
        assert_relative_eq!(coord.x, 0.0);
        assert_relative_eq!(coord.y, 0.0);
    }
}
