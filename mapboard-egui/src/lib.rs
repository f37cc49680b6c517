//! Interactive map application: layer switcher, drawing toolbar, buffer tool, measurement tool and
//! shapefile import on top of a Galileo map.
//!
//! All map state lives in [`mapboard::MapSurface`]. This crate only renders it and turns user
//! input into [`mapboard::MapEvent`]s.

use std::path::Path;

use galileo::control::UserEventHandler;
use galileo::error::GalileoError;
use galileo::{Map, MapBuilder};
use galileo_egui::EguiMapState;
use mapboard::error::MapboardError;
use mapboard::{MapSurface, MapboardConfig};
use thiserror::Error;

mod app;
mod interaction;
mod layers;

use app::{MapboardApp, StackLayout};
use interaction::ClickCollector;

/// Failure to start the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] MapboardError),
    /// A map layer cannot be created.
    #[error("failed to create map layer")]
    Layer(#[from] GalileoError),
    /// The window or the rendering context cannot be created.
    #[error("failed to start the UI")]
    Ui(#[from] eframe::Error),
}

/// Starts the application with the given configuration.
pub fn run(config: MapboardConfig) -> Result<(), AppError> {
    let cache = config.tile_cache.clone();
    let surface = MapSurface::new(config)?;
    let map = create_map(&surface, cache.as_deref())?;

    let clicks = ClickCollector::default();
    let builder = galileo_egui::InitBuilder::new(map)
        .with_handlers([Box::new(clicks.handler()) as Box<dyn UserEventHandler>])
        .with_app_builder(app_builder(surface, clicks));

    #[cfg(not(target_arch = "wasm32"))]
    let builder = builder.with_native_options(eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Mapboard")
            .with_drag_and_drop(true),
        ..Default::default()
    });

    builder.init()?;
    Ok(())
}

fn app_builder(
    surface: MapSurface,
    clicks: ClickCollector,
) -> impl FnOnce(EguiMapState) -> Box<dyn eframe::App> + 'static {
    move |egui_map_state| Box::new(MapboardApp::new(egui_map_state, surface, clicks))
}

fn create_map(surface: &MapSurface, cache: Option<&Path>) -> Result<Map, AppError> {
    let view = surface.view();
    let catalog = surface.catalog();
    let style = surface.style();
    let measure = surface.measure_options();

    let mut builder = MapBuilder::default()
        .with_latlon(view.lat(), view.lon())
        .with_z_level(view.zoom());

    for config in catalog.base_layers().iter().chain(catalog.overlays()) {
        builder = builder.with_layer(layers::tile_layer(config, cache)?);
    }

    let mut map = builder
        .with_layer(layers::feature_layer(
            vec![],
            layers::parse_color(&style.drawn),
        ))
        .with_layer(layers::feature_layer(
            vec![],
            layers::parse_color(&style.drawn),
        ))
        .with_layer(layers::feature_layer(
            vec![],
            layers::parse_color(&measure.active_color),
        ))
        .build();

    let stack = StackLayout::new(catalog);
    for index in 0..catalog.base_layers().len() {
        if index != catalog.active_base_index() {
            map.layers_mut().hide(stack.base(index));
        }
    }
    for index in 0..catalog.overlays().len() {
        if !catalog.is_overlay_visible(index) {
            map.layers_mut().hide(stack.overlay(index));
        }
    }

    Ok(map)
}


#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;

    /// Browser entry point.
    #[wasm_bindgen]
    pub fn main() {
        console_error_panic_hook::set_once();

        if let Err(err) = super::run(mapboard::MapboardConfig::default()) {
            log::error!("Failed to start the application: {err}");
        }
    }
}
