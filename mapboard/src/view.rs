use serde::{Deserialize, Serialize};

use crate::tile::zoom_resolution;

/// Currently displayed part of the map: center point and zoom level.
///
/// The view is set once at startup from the configuration and then follows user pan and zoom.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    lat: f64,
    lon: f64,
    zoom: u32,
    max_zoom: u32,
}

impl MapView {
    /// Creates a new view. Zoom is clamped to `0..=max_zoom`.
    pub fn new(lat: f64, lon: f64, zoom: u32, max_zoom: u32) -> Self {
        Self {
            lat,
            lon,
            zoom: zoom.min(max_zoom),
            max_zoom,
        }
    }

    /// Latitude of the center point.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude of the center point.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Zoom level.
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Maximum allowed zoom level.
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    /// Map resolution in meters per pixel corresponding to the zoom level.
    pub fn resolution(&self) -> f64 {
        zoom_resolution(self.zoom as f64)
    }

    /// Returns a copy of the view with the given center point.
    pub fn with_center(&self, lat: f64, lon: f64) -> Self {
        Self { lat, lon, ..*self }
    }

    /// Returns a copy of the view with the given zoom level, clamped to the maximum zoom.
    pub fn with_zoom(&self, zoom: u32) -> Self {
        Self {
            zoom: zoom.min(self.max_zoom),
            ..*self
        }
    }
}
