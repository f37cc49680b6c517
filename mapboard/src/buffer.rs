//! Buffer workflow: polygon of all points within a distance of a drawn feature.
//!
//! The user enters the distance in meters. It is validated with [`parse_buffer_distance`],
//! converted to kilometers with [`meters_to_kilometers`] and handed to a [`BufferOperation`]
//! together with the GeoJSON representation of the first drawn feature.

use geo::{Buffer, Centroid, MapCoords};
use geo_types::{Geometry, MultiPolygon};
use geojson::Feature;

use crate::drawing::FeatureId;
use crate::error::MapboardError;
use crate::tile::{lonlat_to_mercator, mercator_scale, mercator_to_lonlat};

/// Parses a buffer distance typed by the user. Only finite numbers are accepted.
pub fn parse_buffer_distance(input: &str) -> Result<f64, MapboardError> {
    match input.trim().parse::<f64>() {
        Ok(distance) if distance.is_finite() => Ok(distance),
        _ => Err(MapboardError::InvalidBufferDistance),
    }
}

/// Converts the distance entered in meters into kilometers expected by [`BufferOperation`].
pub fn meters_to_kilometers(distance_m: f64) -> f64 {
    distance_m / 1000.0
}

/// Routine computing a buffer polygon around a GeoJSON feature.
pub trait BufferOperation {
    /// Returns a feature with the buffer of `feature` at `distance_km` kilometers.
    fn buffer(&self, feature: &Feature, distance_km: f64) -> Result<Feature, MapboardError>;
}

/// Buffer computed on the Web Mercator plane.
///
/// The distance is scaled by the Mercator scale factor at the centroid of the geometry, so the
/// result is accurate in meters for features that are small compared to their distance from the
/// poles.
#[derive(Debug, Default, Copy, Clone)]
pub struct MercatorBuffer;

impl BufferOperation for MercatorBuffer {
    fn buffer(&self, feature: &Feature, distance_km: f64) -> Result<Feature, MapboardError> {
        let geometry = feature
            .geometry
            .clone()
            .ok_or_else(|| MapboardError::Buffer("feature has no geometry".into()))?;
        let geometry = Geometry::<f64>::try_from(geometry)?;

        let centroid = geometry
            .centroid()
            .ok_or_else(|| MapboardError::Buffer("geometry is empty".into()))?;
        let distance = distance_km * 1000.0 * mercator_scale(centroid.y());

        let projected = geometry.map_coords(lonlat_to_mercator);
        let buffered = projected.buffer(distance);
        if buffered.0.is_empty() {
            return Err(MapboardError::EmptyBuffer);
        }

        let buffered = buffered.map_coords(mercator_to_lonlat);

        Ok(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&buffered))),
            id: None,
            properties: None,
            foreign_members: None,
        })
    }
}

/// Result of a buffer request, shown as its own layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLayer {
    /// Feature the buffer was computed for.
    pub source: FeatureId,
    /// Distance in meters as entered by the user.
    pub distance_m: f64,
    /// Buffer polygons, `x = longitude, y = latitude`.
    pub geometry: MultiPolygon<f64>,
}

impl BufferLayer {
    /// Takes the polygons out of the feature returned by a [`BufferOperation`].
    pub fn from_feature(
        source: FeatureId,
        distance_m: f64,
        feature: Feature,
    ) -> Result<Self, MapboardError> {
        let geometry = feature.geometry.ok_or(MapboardError::EmptyBuffer)?;
        let geometry = match Geometry::<f64>::try_from(geometry)? {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            Geometry::MultiPolygon(multi_polygon) => multi_polygon,
            other => {
                return Err(MapboardError::Buffer(format!(
                    "expected polygons, got {}",
                    crate::drawing::geometry_name(&other)
                )))
            }
        };

        if geometry.0.is_empty() {
            return Err(MapboardError::EmptyBuffer);
        }

        Ok(Self {
            source,
            distance_m,
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use geo::{BoundingRect, Contains};
    use geo_types::{point, polygon};

    use super::*;

    fn feature(geometry: Geometry<f64>) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&geometry))),
            id: None,
            properties: None,
            foreign_members: None,
        }
    }

    fn buffer_polygons(feature: Feature) -> MultiPolygon<f64> {
        match Geometry::<f64>::try_from(feature.geometry.expect("has geometry")) {
            Ok(Geometry::MultiPolygon(polygons)) => polygons,
            other => panic!("unexpected buffer geometry: {other:?}"),
        }
    }

    #[test]
    fn parses_numbers() {
        assert_relative_eq!(parse_buffer_distance("500").expect("valid"), 500.0);
        assert_relative_eq!(parse_buffer_distance(" 12.5 ").expect("valid"), 12.5);
        assert_relative_eq!(parse_buffer_distance("-20").expect("valid"), -20.0);
        assert_relative_eq!(parse_buffer_distance("1e3").expect("valid"), 1000.0);
    }

    #[test]
    fn rejects_invalid_distances() {
        for input in ["", "   ", "abc", "12abc", "NaN", "inf", "-infinity"] {
            assert_matches!(
                parse_buffer_distance(input),
                Err(MapboardError::InvalidBufferDistance),
                "{input}"
            );
        }
    }

    #[test]
    fn meters_are_divided_by_thousand() {
        assert_relative_eq!(meters_to_kilometers(500.0), 0.5);
        assert_relative_eq!(meters_to_kilometers(1.0), 0.001);
        assert_relative_eq!(meters_to_kilometers(0.0), 0.0);
    }

    #[test]
    fn point_buffer_has_requested_radius() {
        let center = point!(x: 78.9629, y: 20.5937);
        let buffered = MercatorBuffer
            .buffer(&feature(center.into()), 0.5)
            .expect("valid buffer");
        let polygons = buffer_polygons(buffered);

        assert_eq!(polygons.0.len(), 1);
        assert!(polygons.contains(&center));

        // 500 m north of the center is ~0.0045 degrees of latitude
        let rect = polygons.bounding_rect().expect("not empty");
        assert_relative_eq!(rect.max().y - center.y(), 0.004_49, epsilon = 1e-4);
        assert_relative_eq!(center.y() - rect.min().y, 0.004_49, epsilon = 1e-4);
    }

    #[test]
    fn polygon_buffer_contains_source() {
        let source = polygon![
            (x: 78.0, y: 20.0),
            (x: 78.1, y: 20.0),
            (x: 78.1, y: 20.1),
            (x: 78.0, y: 20.1),
        ];
        let polygons = buffer_polygons(
            MercatorBuffer
                .buffer(&feature(source.clone().into()), 1.0)
                .expect("valid buffer"),
        );

        assert!(polygons.contains(&source));
        assert!(polygons.contains(&point!(x: 78.05, y: 20.105)));
        assert!(!polygons.contains(&point!(x: 78.05, y: 20.12)));
    }

    #[test]
    fn negative_point_buffer_is_empty() {
        let result = MercatorBuffer.buffer(&feature(point!(x: 0.0, y: 0.0).into()), -0.1);
        assert_matches!(result, Err(MapboardError::EmptyBuffer));
    }

    #[test]
    fn feature_without_geometry() {
        let mut empty = feature(point!(x: 0.0, y: 0.0).into());
        empty.geometry = None;
        assert_matches!(MercatorBuffer.buffer(&empty, 1.0), Err(MapboardError::Buffer(_)));
    }

    #[test]
    fn buffer_layer_accepts_polygon_features() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let layer = BufferLayer::from_feature(
            crate::tests::feature_id(0),
            10.0,
            feature(square.clone().into()),
        )
        .expect("polygon feature");
        assert_eq!(layer.geometry.0, vec![square]);

        assert_matches!(
            BufferLayer::from_feature(
                crate::tests::feature_id(0),
                10.0,
                feature(point!(x: 0.0, y: 0.0).into())
            ),
            Err(MapboardError::Buffer(_))
        );
    }
}
