//! Conversion of the map surface state into Galileo layers.

use std::path::Path;

use galileo::error::GalileoError;
use galileo::layer::raster_tile_layer::RasterTileLayerBuilder;
use galileo::layer::{FeatureLayer, Layer, RasterTileLayer};
use galileo::symbol::{
    ArbitraryGeometrySymbol, CirclePointSymbol, SimpleContourSymbol, SimplePolygonSymbol,
};
use galileo::tile_schema::{TileIndex, TileSchema};
use galileo::Color;
use galileo_types::geo::Crs;
use mapboard::catalog::LayerConfig;
use mapboard::drawing::Sketch;
use mapboard::geo_types::{Geometry, LineString, MultiPoint, Point};
use mapboard::geojson::Feature;
use mapboard::measure::Measurement;
use mapboard::MapLayer;

const FILL_ALPHA: u8 = 80;

/// Creates a raster tile layer for a catalog entry.
pub(crate) fn tile_layer(
    config: &LayerConfig,
    cache: Option<&Path>,
) -> Result<RasterTileLayer, GalileoError> {
    let source = config.source.clone();
    let name = config.name.clone();
    let mut builder = RasterTileLayerBuilder::new_rest(move |index: &TileIndex| {
        let index = mapboard::tile::TileIndex::new(index.x, index.y, index.z);
        source.tile_url(&index).unwrap_or_else(|err| {
            log::warn!("Cannot build tile url of {name}: {err}");
            String::new()
        })
    })
    .with_tile_schema(TileSchema::web(config.source.max_zoom() + 1));

    if let Some(text) = &config.attribution {
        builder = builder.with_attribution(
            text.clone(),
            config.attribution_url.clone().unwrap_or_default(),
        );
    }

    if let Some(cache) = cache {
        builder = builder.with_file_cache_checked(cache.join(cache_folder(&config.name)));
    }

    builder.build()
}

fn cache_folder(layer_name: &str) -> String {
    layer_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Parses a `#RRGGBB` or `#RRGGBBAA` color, falling back to blue.
pub(crate) fn parse_color(hex: &str) -> Color {
    Color::try_from_hex(hex).unwrap_or_else(|| {
        log::warn!("Invalid color '{hex}', using blue");
        Color::BLUE
    })
}

fn symbol(color: Color) -> ArbitraryGeometrySymbol {
    ArbitraryGeometrySymbol::new(
        CirclePointSymbol::new(color, 8.0),
        SimpleContourSymbol::new(color, 3.0),
        SimplePolygonSymbol::new(color.with_alpha(FILL_ALPHA))
            .with_stroke_color(color)
            .with_stroke_width(2.0),
    )
}

/// Vector layer with the given GeoJSON features in WGS84.
pub(crate) fn feature_layer(features: Vec<Feature>, color: Color) -> impl Layer + 'static {
    FeatureLayer::new(features, symbol(color), Crs::WGS84)
}

fn geometry_feature(geometry: Geometry<f64>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(mapboard::geojson::Geometry::new(
            mapboard::geojson::Value::from(&geometry),
        )),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

/// Features of a runtime layer.
pub(crate) fn runtime_features(layer: &MapLayer) -> Vec<Feature> {
    match layer {
        MapLayer::Buffer(buffer) => vec![geometry_feature(buffer.geometry.clone().into())],
        MapLayer::Imported(set) => set.to_feature_collection().features,
    }
}

/// Vertices and outline of the sketch in progress.
pub(crate) fn sketch_features(sketch: Option<&Sketch>) -> Vec<Feature> {
    let Some(sketch) = sketch else {
        return vec![];
    };

    vertex_features(sketch.vertices().iter().map(|&coord| Point(coord)).collect())
}

/// Points and path of the measurement.
pub(crate) fn measurement_features(measurement: &Measurement) -> Vec<Feature> {
    vertex_features(measurement.points().to_vec())
}

fn vertex_features(points: Vec<Point<f64>>) -> Vec<Feature> {
    let mut features = Vec::new();
    if points.len() > 1 {
        let line: LineString<f64> = points.iter().copied().collect();
        features.push(geometry_feature(line.into()));
    }
    if !points.is_empty() {
        features.push(geometry_feature(MultiPoint::new(points).into()));
    }

    features
}
