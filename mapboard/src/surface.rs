use std::fmt::{Display, Formatter};

use crate::buffer::{
    meters_to_kilometers, parse_buffer_distance, BufferLayer, BufferOperation, MercatorBuffer,
};
use crate::catalog::LayerCatalog;
use crate::config::{MapboardConfig, StyleConfig};
use crate::drawing::DrawingSurface;
use crate::error::MapboardError;
use crate::import::ImportedFeatureSet;
use crate::measure::{MeasureOptions, MeasureSummary, Measurement};
use crate::{MapEvent, MapView, SurfaceChange};

/// Identifier of a layer added at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl Display for LayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer #{}", self.0)
    }
}

/// Layer added at runtime on top of the catalog layers.
#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    /// Result of the buffer workflow.
    Buffer(BufferLayer),
    /// Features imported from a shapefile archive.
    Imported(ImportedFeatureSet),
}

impl MapLayer {
    /// Label of the layer in the UI.
    pub fn name(&self) -> String {
        match self {
            Self::Buffer(layer) => format!("Buffer {} m", layer.distance_m),
            Self::Imported(set) => set.name.clone(),
        }
    }
}

/// The whole state of the map.
///
/// UI code never changes the state directly. It forwards user actions as [`MapEvent`]s to
/// [`MapSurface::dispatch`] and redraws according to the returned [`SurfaceChange`].
pub struct MapSurface {
    view: MapView,
    catalog: LayerCatalog,
    drawing: DrawingSurface,
    measurement: Measurement,
    measure_options: MeasureOptions,
    style: StyleConfig,
    buffer_operation: Box<dyn BufferOperation + Send + Sync>,
    layers: Vec<(LayerId, MapLayer)>,
    next_layer_id: u64,
}

impl std::fmt::Debug for MapSurface {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSurface")
            .field("view", &self.view)
            .field("catalog", &self.catalog)
            .field("drawing", &self.drawing)
            .field("measurement", &self.measurement)
            .field("layers", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl MapSurface {
    /// Creates the surface from the configuration.
    pub fn new(config: MapboardConfig) -> Result<Self, MapboardError> {
        let view = config.map_view();
        let catalog = LayerCatalog::new(config.base_layers, config.overlays)?;

        log::info!(
            "Map surface created with base layer '{}' at {:.4}, {:.4} zoom {}",
            catalog.active_base().name,
            view.lat(),
            view.lon(),
            view.zoom()
        );

        Ok(Self {
            view,
            catalog,
            drawing: DrawingSurface::new(config.draw),
            measurement: Measurement::default(),
            measure_options: config.measure,
            style: config.style,
            buffer_operation: Box::new(MercatorBuffer),
            layers: Vec::new(),
            next_layer_id: 0,
        })
    }

    /// Replaces the routine used by the buffer workflow.
    pub fn with_buffer_operation(
        mut self,
        operation: impl BufferOperation + Send + Sync + 'static,
    ) -> Self {
        self.buffer_operation = Box::new(operation);
        self
    }

    /// Current view.
    pub fn view(&self) -> MapView {
        self.view
    }

    /// Base and overlay layers.
    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    /// Drawn features.
    pub fn drawing(&self) -> &DrawingSurface {
        &self.drawing
    }

    /// Measurement in progress or finished.
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Measured values in the configured units.
    pub fn measure_summary(&self) -> MeasureSummary {
        self.measurement.summary(&self.measure_options)
    }

    /// Measurement tool options.
    pub fn measure_options(&self) -> &MeasureOptions {
        &self.measure_options
    }

    /// Colors of the vector layers.
    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    /// Runtime layers in the order they were added.
    pub fn layers(&self) -> &[(LayerId, MapLayer)] {
        &self.layers
    }

    /// Runtime layer with the given id.
    pub fn layer(&self, id: LayerId) -> Option<&MapLayer> {
        self.layers
            .iter()
            .find(|(layer_id, _)| *layer_id == id)
            .map(|(_, layer)| layer)
    }

    /// Applies an event.
    ///
    /// On error the state is left as it was before the event.
    pub fn dispatch(&mut self, event: MapEvent) -> Result<SurfaceChange, MapboardError> {
        log::trace!("Dispatching {event:?}");

        let change = match event {
            MapEvent::SelectBaseLayer(name) => {
                SurfaceChange::BaseLayerSelected(self.catalog.select_base(&name)?)
            }
            MapEvent::SetOverlayVisible { name, visible } => SurfaceChange::OverlayVisibility {
                index: self.catalog.set_overlay_visible(&name, visible)?,
                visible,
            },
            MapEvent::FeatureCreated { tool, geometry } => {
                self.drawing.add(tool, geometry)?;
                SurfaceChange::DrawingChanged
            }
            MapEvent::FeatureEdited { id, geometry } => {
                self.drawing.edit(id, geometry)?;
                SurfaceChange::DrawingChanged
            }
            MapEvent::FeatureDeleted(id) => {
                self.drawing.remove(id)?;
                SurfaceChange::DrawingChanged
            }
            MapEvent::CreateBuffer { distance } => {
                SurfaceChange::LayerAdded(self.create_buffer(&distance)?)
            }
            MapEvent::ShapefileLoaded(result) => {
                let set = result.inspect_err(|err| {
                    log::error!("Failed to import shapefile: {err}");
                })?;
                log::info!("Adding {} features from {}", set.len(), set.name);
                SurfaceChange::LayerAdded(self.push_layer(MapLayer::Imported(set)))
            }
            MapEvent::MeasurePoint(point) => {
                self.measurement.add_point(point);
                SurfaceChange::MeasurementChanged
            }
            MapEvent::FinishMeasurement => {
                self.measurement.finish();
                log::debug!("Measurement finished: {}", self.measure_summary());
                SurfaceChange::MeasurementChanged
            }
            MapEvent::ClearMeasurement => {
                self.measurement.clear();
                SurfaceChange::MeasurementChanged
            }
            MapEvent::SetView(view) => {
                let view = MapView::new(view.lat(), view.lon(), view.zoom(), self.view.max_zoom());
                if view == self.view {
                    SurfaceChange::None
                } else {
                    self.view = view;
                    SurfaceChange::ViewChanged
                }
            }
        };

        Ok(change)
    }

    /// Buffers the first drawn feature by the distance in meters typed by the user and adds the
    /// result as a new layer.
    pub fn create_buffer(&mut self, distance_input: &str) -> Result<LayerId, MapboardError> {
        let distance_m = parse_buffer_distance(distance_input)?;
        let feature = self.drawing.first().ok_or(MapboardError::NoDrawnFeature)?;

        let distance_km = meters_to_kilometers(distance_m);
        log::debug!("Buffering feature {} by {distance_km} km", feature.id());

        let buffered = self
            .buffer_operation
            .buffer(&feature.to_geojson(), distance_km)
            .and_then(|buffered| BufferLayer::from_feature(feature.id(), distance_m, buffered))
            .inspect_err(|err| log::error!("Failed to buffer feature {}: {err}", feature.id()))?;

        Ok(self.push_layer(MapLayer::Buffer(buffered)))
    }

    fn push_layer(&mut self, layer: MapLayer) -> LayerId {
        let id = LayerId(self.next_layer_id);
        self.next_layer_id += 1;

        log::debug!("Adding {id}: {}", layer.name());
        self.layers.push((id, layer));

        id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use geo_types::{point, polygon, Geometry};
    use geojson::Feature;

    use super::*;
    use crate::drawing::DrawTool;
    use crate::import::decode_shapefile_archive;
    use crate::tests::{point_record, shp_file, zip_archive};

    type Calls = Arc<Mutex<Vec<(Feature, f64)>>>;

    /// Returns a fixed square and records every call.
    struct RecordingBuffer(Calls);

    impl BufferOperation for RecordingBuffer {
        fn buffer(&self, feature: &Feature, distance_km: f64) -> Result<Feature, MapboardError> {
            self.0
                .lock()
                .expect("not poisoned")
                .push((feature.clone(), distance_km));

            let square: Geometry<f64> =
                polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]
                    .into();
            Ok(Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&square))),
                id: None,
                properties: None,
                foreign_members: None,
            })
        }
    }

    fn recording_surface() -> (MapSurface, Calls) {
        let calls = Calls::default();
        let surface = MapSurface::new(MapboardConfig::default())
            .expect("default config is valid")
            .with_buffer_operation(RecordingBuffer(calls.clone()));
        (surface, calls)
    }

    fn triangle() -> Geometry<f64> {
        polygon![(x: 78.0, y: 20.0), (x: 78.1, y: 20.0), (x: 78.1, y: 20.1)].into()
    }

    #[test]
    fn invalid_distance_does_not_add_layers() {
        let (mut surface, calls) = recording_surface();
        surface
            .dispatch(MapEvent::FeatureCreated {
                tool: DrawTool::Polygon,
                geometry: triangle(),
            })
            .expect("polygon is enabled");

        let err = surface
            .dispatch(MapEvent::CreateBuffer {
                distance: "abc".into(),
            })
            .expect_err("not a number");
        assert_matches!(err, MapboardError::InvalidBufferDistance);
        assert_eq!(err.to_string(), "Please enter a valid buffer distance.");
        assert!(err.is_validation());

        assert!(surface.layers().is_empty());
        assert!(calls.lock().expect("not poisoned").is_empty());
    }

    #[test]
    fn buffer_requires_drawn_feature() {
        let (mut surface, calls) = recording_surface();
        let err = surface
            .dispatch(MapEvent::CreateBuffer {
                distance: "500".into(),
            })
            .expect_err("nothing drawn");
        assert_matches!(err, MapboardError::NoDrawnFeature);
        assert_eq!(err.to_string(), "Please draw a feature first.");

        assert!(surface.layers().is_empty());
        assert!(calls.lock().expect("not poisoned").is_empty());
    }

    #[test]
    fn buffer_uses_first_feature_in_kilometers() {
        let (mut surface, calls) = recording_surface();
        for geometry in [triangle(), Geometry::Point(point!(x: 1.0, y: 1.0))] {
            let tool = match geometry {
                Geometry::Point(_) => DrawTool::Marker,
                _ => DrawTool::Polygon,
            };
            surface
                .dispatch(MapEvent::FeatureCreated { tool, geometry })
                .expect("tool is enabled");
        }

        let change = surface
            .dispatch(MapEvent::CreateBuffer {
                distance: "500".into(),
            })
            .expect("valid buffer");

        let calls = calls.lock().expect("not poisoned");
        assert_eq!(calls.len(), 1);
        let (feature, distance_km) = &calls[0];
        assert_relative_eq!(*distance_km, 0.5);
        assert_eq!(
            feature.property("tool").and_then(|v| v.as_str()),
            Some("polygon")
        );

        assert_eq!(surface.layers().len(), 1);
        let (id, layer) = &surface.layers()[0];
        assert_eq!(change, SurfaceChange::LayerAdded(*id));
        assert_matches!(
            layer,
            MapLayer::Buffer(buffer) if buffer.distance_m == 500.0 && buffer.geometry.0.len() == 1
        );
    }

    #[test]
    fn buffers_accumulate() {
        let (mut surface, calls) = recording_surface();
        surface
            .dispatch(MapEvent::FeatureCreated {
                tool: DrawTool::Polygon,
                geometry: triangle(),
            })
            .expect("polygon is enabled");

        let first = surface.create_buffer("500").expect("valid buffer");
        let second = surface.create_buffer("1500").expect("valid buffer");
        assert_ne!(first, second);
        assert_eq!(surface.layers().len(), 2);

        let distances: Vec<_> = calls
            .lock()
            .expect("not poisoned")
            .iter()
            .map(|(_, km)| *km)
            .collect();
        assert_eq!(distances, [0.5, 1.5]);
    }

    #[test]
    fn buffer_follows_feature_deletion() {
        let (mut surface, calls) = recording_surface();
        surface
            .dispatch(MapEvent::FeatureCreated {
                tool: DrawTool::Polygon,
                geometry: triangle(),
            })
            .expect("polygon is enabled");
        surface
            .dispatch(MapEvent::FeatureCreated {
                tool: DrawTool::Marker,
                geometry: point!(x: 1.0, y: 1.0).into(),
            })
            .expect("marker is enabled");

        let first = surface.drawing().first().map(|f| f.id()).expect("not empty");
        assert_eq!(
            surface.dispatch(MapEvent::FeatureDeleted(first)).expect("exists"),
            SurfaceChange::DrawingChanged
        );

        surface.create_buffer("10").expect("valid buffer");
        let calls = calls.lock().expect("not poisoned");
        assert_eq!(
            calls[0].0.property("tool").and_then(|v| v.as_str()),
            Some("marker")
        );
    }

    #[test]
    fn default_buffer_operation() {
        let mut surface = MapSurface::new(MapboardConfig::default()).expect("valid config");
        surface
            .dispatch(MapEvent::FeatureCreated {
                tool: DrawTool::Polygon,
                geometry: triangle(),
            })
            .expect("polygon is enabled");

        surface.create_buffer("500").expect("valid buffer");
        assert_matches!(&surface.layers()[0].1, MapLayer::Buffer(buffer) if !buffer.geometry.0.is_empty());

        assert_matches!(surface.create_buffer("-100000"), Err(MapboardError::EmptyBuffer));
        assert_eq!(surface.layers().len(), 1);
    }

    #[test]
    fn shapefile_adds_one_layer() {
        let (mut surface, _) = recording_surface();
        let archive = zip_archive(&[(
            "cities.shp",
            shp_file(1, &[point_record(78.0, 20.0), point_record(77.0, 28.0)]).as_slice(),
        )]);
        let set = decode_shapefile_archive("cities.zip", &archive);

        let change = surface
            .dispatch(MapEvent::ShapefileLoaded(set))
            .expect("valid archive");
        assert_matches!(change, SurfaceChange::LayerAdded(_));
        assert_eq!(surface.layers().len(), 1);
        assert_matches!(&surface.layers()[0].1, MapLayer::Imported(set) if set.len() == 2);
        assert_eq!(surface.layers()[0].1.name(), "cities.zip");
    }

    #[test]
    fn failed_import_adds_nothing() {
        let (mut surface, _) = recording_surface();
        let result = surface.dispatch(MapEvent::ShapefileLoaded(Err(
            MapboardError::NoShapefile("empty.zip".into()),
        )));
        assert_matches!(result, Err(MapboardError::NoShapefile(_)));
        assert!(surface.layers().is_empty());

        let prj = r#"PROJCS["India_Albers",GEOGCS["GCS_WGS_1984"],PROJECTION["Albers"]]"#;
        let archive = zip_archive(&[
            ("cities.shp", shp_file(1, &[point_record(1e6, 2e6)]).as_slice()),
            ("cities.prj", prj.as_bytes()),
        ]);
        let result = surface.dispatch(MapEvent::ShapefileLoaded(decode_shapefile_archive(
            "cities.zip",
            &archive,
        )));
        let err = result.expect_err("projection is not supported");
        assert!(err.to_string().starts_with("unsupported coordinate system"), "{err}");
        assert!(surface.layers().is_empty());
    }

    #[test]
    fn layer_switching() {
        let (mut surface, _) = recording_surface();
        assert_eq!(surface.catalog().active_base().name, "OpenStreetMap");

        assert_eq!(
            surface
                .dispatch(MapEvent::SelectBaseLayer("Satellite".into()))
                .expect("known layer"),
            SurfaceChange::BaseLayerSelected(1)
        );
        assert_matches!(
            surface.dispatch(MapEvent::SelectBaseLayer("Terrain".into())),
            Err(MapboardError::UnknownLayer(_))
        );
        assert_eq!(surface.catalog().active_base_index(), 1);

        assert_eq!(
            surface
                .dispatch(MapEvent::SetOverlayVisible {
                    name: "India District".into(),
                    visible: true,
                })
                .expect("known layer"),
            SurfaceChange::OverlayVisibility {
                index: 2,
                visible: true
            }
        );
        let visible: Vec<_> = surface
            .catalog()
            .visible_overlays()
            .map(|layer| layer.name.as_str())
            .collect();
        assert_eq!(visible, ["India District"]);
    }

    #[test]
    fn measurement_events() {
        let (mut surface, _) = recording_surface();
        surface
            .dispatch(MapEvent::MeasurePoint(point!(x: 0.0, y: 0.0)))
            .expect("infallible");
        surface
            .dispatch(MapEvent::MeasurePoint(point!(x: 1.0, y: 0.0)))
            .expect("infallible");
        surface.dispatch(MapEvent::FinishMeasurement).expect("infallible");

        assert!(surface.measurement().is_completed());
        assert_relative_eq!(surface.measure_summary().length, 111.195, epsilon = 1e-3);

        surface.dispatch(MapEvent::ClearMeasurement).expect("infallible");
        assert!(surface.measurement().is_empty());
    }

    #[test]
    fn view_zoom_is_clamped() {
        let (mut surface, _) = recording_surface();
        let change = surface
            .dispatch(MapEvent::SetView(MapView::new(28.6, 77.2, 25, 25)))
            .expect("infallible");
        assert_eq!(change, SurfaceChange::ViewChanged);
        assert_eq!(surface.view().zoom(), 19);

        let same = surface
            .dispatch(MapEvent::SetView(surface.view()))
            .expect("infallible");
        assert_eq!(same, SurfaceChange::None);
    }
}
