use galileo::layer::Layer;
use galileo_egui::{EguiMap, EguiMapState};
use galileo_types::geo::impls::GeoPoint2d;
use galileo_types::geo::GeoPoint;
use mapboard::catalog::LayerCatalog;
use mapboard::drawing::{DrawTool, FeatureId, Sketch, SketchState};
use mapboard::error::MapboardError;
use mapboard::geo_types::Point;
use mapboard::import::{import_shapefile, ImportSource, ImportedFeatureSet};
use mapboard::tile::zoom_resolution;
use mapboard::{MapEvent, MapLayer, MapSurface, SurfaceChange};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::interaction::{ClickCollector, ClickMode};
use crate::layers;

type ImportResult = Result<ImportedFeatureSet, MapboardError>;

/// Positions of the layers in the Galileo layer collection.
///
/// Catalog base layers come first, then overlays, then drawn features, the sketch in progress
/// and the measurement. Runtime layers are appended after them in the order they were added.
#[derive(Debug, Copy, Clone)]
pub(crate) struct StackLayout {
    base_count: usize,
    overlay_count: usize,
}

impl StackLayout {
    pub(crate) fn new(catalog: &LayerCatalog) -> Self {
        Self {
            base_count: catalog.base_layers().len(),
            overlay_count: catalog.overlays().len(),
        }
    }

    pub(crate) fn base(&self, index: usize) -> usize {
        index
    }

    pub(crate) fn overlay(&self, index: usize) -> usize {
        self.base_count + index
    }

    fn drawn(&self) -> usize {
        self.base_count + self.overlay_count
    }

    fn sketch(&self) -> usize {
        self.drawn() + 1
    }

    fn measurement(&self) -> usize {
        self.drawn() + 2
    }
}

pub(crate) struct MapboardApp {
    map: EguiMapState,
    surface: MapSurface,
    stack: StackLayout,
    clicks: ClickCollector,
    sketch: Option<Sketch>,
    editing: Option<FeatureId>,
    buffer_input: String,
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    import_path: String,
    import_sender: UnboundedSender<ImportResult>,
    import_receiver: UnboundedReceiver<ImportResult>,
    alert: Option<String>,
    position: GeoPoint2d,
    resolution: f64,
}

impl MapboardApp {
    pub(crate) fn new(map: EguiMapState, surface: MapSurface, clicks: ClickCollector) -> Self {
        let position = map.map().view().position().unwrap_or_default();
        let resolution = surface.view().resolution();
        let stack = StackLayout::new(surface.catalog());
        let (import_sender, import_receiver) = unbounded_channel();

        Self {
            map,
            surface,
            stack,
            clicks,
            sketch: None,
            editing: None,
            buffer_input: String::new(),
            import_path: String::new(),
            import_sender,
            import_receiver,
            alert: None,
            position,
            resolution,
        }
    }

    fn dispatch(&mut self, event: MapEvent) {
        match self.surface.dispatch(event) {
            Ok(change) => self.apply_change(change),
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: MapboardError) {
        let message = match std::error::Error::source(&err) {
            Some(source) if !err.is_validation() => format!("{err}: {source}"),
            _ => err.to_string(),
        };

        if err.is_validation() {
            log::debug!("Rejected user input: {message}");
        } else {
            log::warn!("{message}");
        }

        self.alert = Some(message);
    }

    fn apply_change(&mut self, change: SurfaceChange) {
        match change {
            SurfaceChange::None | SurfaceChange::ViewChanged => return,
            SurfaceChange::BaseLayerSelected(active) => {
                let layers = self.map.map_mut().layers_mut();
                for index in 0..self.stack.base_count {
                    if index == active {
                        layers.show(self.stack.base(index));
                    } else {
                        layers.hide(self.stack.base(index));
                    }
                }
            }
            SurfaceChange::OverlayVisibility { index, visible } => {
                let layers = self.map.map_mut().layers_mut();
                if visible {
                    layers.show(self.stack.overlay(index));
                } else {
                    layers.hide(self.stack.overlay(index));
                }
            }
            SurfaceChange::DrawingChanged => {
                let features = self.surface.drawing().to_feature_collection().features;
                let color = layers::parse_color(&self.surface.style().drawn);
                self.replace_layer(self.stack.drawn(), layers::feature_layer(features, color));
            }
            SurfaceChange::LayerAdded(id) => {
                let Some(layer) = self.surface.layer(id) else {
                    return;
                };
                let color = match layer {
                    MapLayer::Buffer(_) => &self.surface.style().buffer,
                    MapLayer::Imported(_) => &self.surface.style().imported,
                };
                let layer = layers::feature_layer(
                    layers::runtime_features(layer),
                    layers::parse_color(color),
                );
                self.map.map_mut().layers_mut().push(layer);
            }
            SurfaceChange::MeasurementChanged => self.update_measurement_layer(),
        }

        self.map.request_redraw();
    }

    fn replace_layer(&mut self, index: usize, layer: impl Layer + 'static) {
        let layers = self.map.map_mut().layers_mut();
        layers.remove(index);
        layers.insert(index, layer);
    }

    fn update_sketch_layer(&mut self) {
        let features = layers::sketch_features(self.sketch.as_ref());
        let color = layers::parse_color(&self.surface.style().drawn);
        self.replace_layer(self.stack.sketch(), layers::feature_layer(features, color));
        self.map.request_redraw();
    }

    fn update_measurement_layer(&mut self) {
        let options = self.surface.measure_options();
        let color = if self.surface.measurement().is_completed() {
            &options.completed_color
        } else {
            &options.active_color
        };
        let color = layers::parse_color(color);
        let features = layers::measurement_features(self.surface.measurement());
        self.replace_layer(self.stack.measurement(), layers::feature_layer(features, color));
    }

    fn start_sketch(&mut self, tool: DrawTool, editing: Option<FeatureId>) {
        log::debug!("Starting {tool} sketch");
        self.sketch = Some(Sketch::new(tool));
        self.editing = editing;
        self.clicks.set_mode(ClickMode::Sketch);
        self.update_sketch_layer();
    }

    fn cancel_sketch(&mut self) {
        self.sketch = None;
        self.editing = None;
        self.clicks.set_mode(ClickMode::Pan);
        self.update_sketch_layer();
    }

    fn finish_sketch(&mut self) {
        let Some(sketch) = self.sketch.take() else {
            return;
        };
        let tool = sketch.tool();
        let editing = self.editing.take();
        self.clicks.set_mode(ClickMode::Pan);
        self.update_sketch_layer();

        match sketch.finish() {
            Ok(geometry) => {
                let event = match editing {
                    Some(id) => MapEvent::FeatureEdited { id, geometry },
                    None => MapEvent::FeatureCreated { tool, geometry },
                };
                self.dispatch(event);
            }
            Err(err) => self.report(err),
        }
    }

    fn apply_clicks(&mut self) {
        let clicks = self.clicks.take_clicks();
        if clicks.is_empty() {
            return;
        }

        match self.clicks.mode() {
            ClickMode::Pan => {}
            ClickMode::Sketch => {
                for click in clicks {
                    let Some(sketch) = &mut self.sketch else {
                        break;
                    };
                    if sketch.add_vertex(click) == SketchState::Complete {
                        self.finish_sketch();
                    }
                }
                self.update_sketch_layer();
            }
            ClickMode::Measure => {
                for click in clicks {
                    self.dispatch(MapEvent::MeasurePoint(Point(click)));
                }
            }
        }
    }

    fn start_import(&self, source: ImportSource, ctx: &egui::Context) {
        log::info!("Importing {}", source.name());

        let sender = self.import_sender.clone();
        let ctx = ctx.clone();
        let task = async move {
            let result = import_shapefile(source).await;
            if sender.send(result).is_err() {
                log::warn!("Import finished after the application was closed");
            }
            ctx.request_repaint();
        };

        #[cfg(not(target_arch = "wasm32"))]
        tokio::spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }

    fn poll_imports(&mut self) {
        while let Ok(result) = self.import_receiver.try_recv() {
            self.dispatch(MapEvent::ShapefileLoaded(result));
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|input| input.raw.dropped_files.clone());
        for file in dropped {
            if let Some(bytes) = file.bytes {
                self.start_import(
                    ImportSource::Bytes {
                        name: file.name,
                        bytes: bytes.to_vec(),
                    },
                    ctx,
                );
                continue;
            }

            #[cfg(not(target_arch = "wasm32"))]
            if let Some(path) = file.path {
                self.start_import(ImportSource::Path(path), ctx);
            }
        }
    }

    fn sync_view(&mut self) {
        let zoom = (zoom_resolution(0.0) / self.resolution).log2().round().max(0.0) as u32;
        let view = self
            .surface
            .view()
            .with_center(self.position.lat(), self.position.lon())
            .with_zoom(zoom);
        self.dispatch(MapEvent::SetView(view));
    }

    fn layer_switcher(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");

        let catalog = self.surface.catalog();
        let active = catalog.active_base_index();
        let mut events = Vec::new();

        for (index, layer) in catalog.base_layers().iter().enumerate() {
            if ui.radio(index == active, layer.name.as_str()).clicked() && index != active {
                events.push(MapEvent::SelectBaseLayer(layer.name.clone()));
            }
        }

        ui.separator();
        for (index, layer) in catalog.overlays().iter().enumerate() {
            let mut visible = catalog.is_overlay_visible(index);
            if ui.checkbox(&mut visible, layer.name.as_str()).changed() {
                events.push(MapEvent::SetOverlayVisible {
                    name: layer.name.clone(),
                    visible,
                });
            }
        }

        if !self.surface.layers().is_empty() {
            ui.separator();
            for (_, layer) in self.surface.layers() {
                ui.label(layer.name());
            }
        }

        for event in events {
            self.dispatch(event);
        }
    }

    fn drawing_tools(&mut self, ui: &mut egui::Ui) {
        ui.heading("Draw");

        let tools: Vec<_> = self.surface.drawing().options().enabled_tools().collect();
        ui.horizontal_wrapped(|ui| {
            for tool in tools {
                let active = self.sketch.as_ref().is_some_and(|s| s.tool() == tool);
                if ui.selectable_label(active, tool_label(tool)).clicked() {
                    self.start_sketch(tool, None);
                }
            }
        });

        if let Some(sketch) = &self.sketch {
            let can_finish = sketch.can_finish();
            ui.label(format!(
                "{} {}: {} points",
                if self.editing.is_some() { "Redrawing" } else { "Drawing" },
                sketch.tool(),
                sketch.vertices().len()
            ));

            ui.horizontal(|ui| {
                if ui.add_enabled(can_finish, egui::Button::new("Finish")).clicked() {
                    self.finish_sketch();
                }
                if ui.button("Undo").clicked() {
                    if let Some(sketch) = &mut self.sketch {
                        sketch.undo();
                    }
                    self.update_sketch_layer();
                }
                if ui.button("Cancel").clicked() {
                    self.cancel_sketch();
                }
            });
        }

        let features: Vec<_> = self
            .surface
            .drawing()
            .iter()
            .map(|feature| (feature.id(), feature.tool()))
            .collect();
        for (id, tool) in features {
            ui.horizontal(|ui| {
                ui.label(format!("{} {id}", tool_label(tool)));
                if ui.small_button("Edit").clicked() {
                    self.start_sketch(tool, Some(id));
                }
                if ui.small_button("Delete").clicked() {
                    self.dispatch(MapEvent::FeatureDeleted(id));
                }
            });
        }

        if !self.surface.drawing().is_empty() && ui.button("Copy GeoJSON").clicked() {
            let geojson = self.surface.drawing().to_feature_collection().to_string();
            ui.ctx().copy_text(geojson);
        }
    }

    fn buffer_tools(&mut self, ui: &mut egui::Ui) {
        ui.heading("Buffer");
        ui.horizontal(|ui| {
            ui.label("Distance (m)");
            ui.text_edit_singleline(&mut self.buffer_input);
        });

        if ui.button("Create Buffer").clicked() {
            self.dispatch(MapEvent::CreateBuffer {
                distance: self.buffer_input.clone(),
            });
        }
    }

    fn measure_tools(&mut self, ui: &mut egui::Ui) {
        ui.heading("Measure");

        let measuring = self.clicks.mode() == ClickMode::Measure;
        ui.horizontal(|ui| {
            if ui.selectable_label(measuring, "Measure").clicked() {
                if measuring {
                    self.clicks.set_mode(ClickMode::Pan);
                } else {
                    self.sketch = None;
                    self.editing = None;
                    self.update_sketch_layer();
                    self.clicks.set_mode(ClickMode::Measure);
                }
            }
            if ui.button("Finish").clicked() {
                self.clicks.set_mode(ClickMode::Pan);
                self.dispatch(MapEvent::FinishMeasurement);
            }
            if ui.button("Clear").clicked() {
                self.dispatch(MapEvent::ClearMeasurement);
            }
        });

        if !self.surface.measurement().is_empty() {
            ui.label(self.surface.measure_summary().to_string());
        }
    }

    fn import_tools(&mut self, ui: &mut egui::Ui) {
        ui.heading("Shapefile");

        #[cfg(not(target_arch = "wasm32"))]
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.import_path);
            if ui.button("Import").clicked() && !self.import_path.is_empty() {
                let path = std::path::PathBuf::from(self.import_path.trim());
                self.start_import(ImportSource::Path(path), ui.ctx());
            }
        });

        ui.label("Drop a .zip archive on the window to import it.");
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alert.clone() else {
            return;
        };

        egui::Window::new("Alert")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.alert = None;
                }
            });
    }
}

impl eframe::App for MapboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_clicks();
        self.poll_imports();
        self.handle_dropped_files(ctx);

        egui::SidePanel::left("tools")
            .resizable(false)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.layer_switcher(ui);
                    ui.separator();
                    self.drawing_tools(ui);
                    ui.separator();
                    self.buffer_tools(ui);
                    ui.separator();
                    self.measure_tools(ui);
                    ui.separator();
                    self.import_tools(ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            EguiMap::new(&mut self.map)
                .with_position(&mut self.position)
                .with_resolution(&mut self.resolution)
                .show_ui(ui);
        });

        self.sync_view();
        self.show_alert(ctx);
    }
}

fn tool_label(tool: DrawTool) -> &'static str {
    match tool {
        DrawTool::Polygon => "Polygon",
        DrawTool::Polyline => "Line",
        DrawTool::Rectangle => "Rectangle",
        DrawTool::Circle => "Circle",
        DrawTool::Marker => "Marker",
    }
}
