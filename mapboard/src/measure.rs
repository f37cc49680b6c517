//! Measurement tool: length of a clicked path and area of the polygon it encloses.
//!
//! Distances are geodesic, so values do not depend on the map projection or zoom level.

use std::fmt::{Display, Formatter};

use geo::{Distance, GeodesicArea, Haversine};
use geo_types::{LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Unit for displaying lengths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    /// Meters.
    Meters,
    /// Kilometers.
    Kilometers,
    /// International feet.
    Feet,
    /// Statute miles.
    Miles,
}

impl LengthUnit {
    /// Converts meters into this unit.
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            Self::Meters => meters,
            Self::Kilometers => meters / 1000.0,
            Self::Feet => meters / 0.3048,
            Self::Miles => meters / 1609.344,
        }
    }

    /// Short unit label.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Feet => "ft",
            Self::Miles => "mi",
        }
    }
}

/// Unit for displaying areas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    /// Square meters.
    SquareMeters,
    /// Hectares.
    Hectares,
    /// Square kilometers.
    SquareKilometers,
    /// Acres.
    Acres,
}

impl AreaUnit {
    /// Converts square meters into this unit.
    pub fn from_square_meters(&self, square_meters: f64) -> f64 {
        match self {
            Self::SquareMeters => square_meters,
            Self::Hectares => square_meters / 10_000.0,
            Self::SquareKilometers => square_meters / 1_000_000.0,
            Self::Acres => square_meters / 4_046.856_422_4,
        }
    }

    /// Short unit label.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::SquareMeters => "sq m",
            Self::Hectares => "ha",
            Self::SquareKilometers => "sq km",
            Self::Acres => "ac",
        }
    }
}

/// Measurement tool options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureOptions {
    /// Unit lengths are reported in.
    pub primary_length_unit: LengthUnit,
    /// Unit areas are reported in.
    pub primary_area_unit: AreaUnit,
    /// Color of the measurement in progress.
    pub active_color: String,
    /// Color of a finished measurement.
    pub completed_color: String,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            primary_length_unit: LengthUnit::Kilometers,
            primary_area_unit: AreaUnit::SquareMeters,
            active_color: "#ff0000".into(),
            completed_color: "#ff0000".into(),
        }
    }
}

/// Points of a measurement. Coordinates are `x = longitude, y = latitude`.
#[derive(Debug, Clone, Default)]
pub struct Measurement {
    points: Vec<Point<f64>>,
    completed: bool,
}

impl Measurement {
    /// Adds a point. Adding a point to a completed measurement starts a new one.
    pub fn add_point(&mut self, point: Point<f64>) {
        if self.completed {
            self.clear();
        }
        self.points.push(point);
    }

    /// Stops adding points to the measurement.
    pub fn finish(&mut self) {
        self.completed = !self.points.is_empty();
    }

    /// Removes all points.
    pub fn clear(&mut self) {
        self.points.clear();
        self.completed = false;
    }

    /// Measured points.
    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    /// Returns true if the measurement was finished.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns true if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the path through all points in meters.
    pub fn length_meters(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| Haversine.distance(pair[0], pair[1]))
            .sum()
    }

    /// Area of the polygon formed by the points in square meters, `None` for less than three
    /// points.
    pub fn area_square_meters(&self) -> Option<f64> {
        if self.points.len() < 3 {
            return None;
        }

        let ring: LineString<f64> = self.points.iter().copied().collect();
        Some(Polygon::new(ring, vec![]).geodesic_area_unsigned())
    }

    /// Measured values in the configured units.
    pub fn summary(&self, options: &MeasureOptions) -> MeasureSummary {
        MeasureSummary {
            length: options
                .primary_length_unit
                .from_meters(self.length_meters()),
            length_unit: options.primary_length_unit,
            area: self
                .area_square_meters()
                .map(|area| options.primary_area_unit.from_square_meters(area)),
            area_unit: options.primary_area_unit,
        }
    }
}

/// Measured values converted into display units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeasureSummary {
    /// Path length.
    pub length: f64,
    /// Unit of the length.
    pub length_unit: LengthUnit,
    /// Enclosed area.
    pub area: Option<f64>,
    /// Unit of the area.
    pub area_unit: AreaUnit,
}

impl Display for MeasureSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {}", self.length, self.length_unit.symbol())?;
        if let Some(area) = self.area {
            write!(f, ", {:.2} {}", area, self.area_unit.symbol())?;
        }

        Ok(())
    }
}
