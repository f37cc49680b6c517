//! Tile addressing in the standard Web Mercator tile schema and the conversions between
//! geographic coordinates and Web Mercator meters.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// Semi-major axis of the WGS84 ellipsoid used by the Web Mercator projection.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude at which the Web Mercator square is cut off.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Width of the tiles in pixels.
pub const TILE_SIZE: u32 = 256;

/// Half of the Web Mercator world width in meters.
const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Tile index.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    /// X index.
    pub x: i32,
    /// Y index, `0` at the top of the map.
    pub y: i32,
    /// Z index.
    pub z: u32,
}

impl TileIndex {
    /// Create a new index instance.
    pub fn new(x: i32, y: i32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Bounding box of the tile in EPSG:3857 meters as `[min_x, min_y, max_x, max_y]`.
    pub fn mercator_bbox(&self) -> [f64; 4] {
        let size = 2.0 * HALF_WORLD / 2f64.powi(self.z as i32);
        let min_x = -HALF_WORLD + self.x as f64 * size;
        let max_y = HALF_WORLD - self.y as f64 * size;

        [min_x, max_y - size, min_x + size, max_y]
    }
}

/// Projects a coordinate given as `x = longitude, y = latitude` in degrees into Web Mercator
/// meters. Latitude is clamped to the Web Mercator limits.
pub fn lonlat_to_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    Coord {
        x: EARTH_RADIUS * coord.x.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Converts Web Mercator meters back into `x = longitude, y = latitude` degrees.
pub fn mercator_to_lonlat(coord: Coord<f64>) -> Coord<f64> {
    let lat = FRAC_PI_2 - 2.0 * (-coord.y / EARTH_RADIUS).exp().atan();
    Coord {
        x: (coord.x / EARTH_RADIUS).to_degrees(),
        y: lat.to_degrees(),
    }
}

/// Scale factor of the Web Mercator projection at the given latitude in degrees: one meter on
/// the ground is this many meters on the projected plane.
pub fn mercator_scale(lat: f64) -> f64 {
    1.0 / lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians().cos()
}

/// Resolution (meters per pixel at the equator) of the given zoom level.
pub fn zoom_resolution(zoom: f64) -> f64 {
    2.0 * HALF_WORLD / TILE_SIZE as f64 / 2f64.powf(zoom)
}
