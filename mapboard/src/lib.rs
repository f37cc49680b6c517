//! Mapboard is the headless part of an interactive map application. It keeps everything the
//! map shows and everything the user can do with it as plain owned state, so that a UI shell
//! only has to render it and forward user input.
//!
//! # Quick start
//!
//! ```
//! use mapboard::{MapEvent, MapSurface, MapboardConfig, SurfaceChange};
//! use mapboard::drawing::DrawTool;
//! use geo_types::{polygon, Geometry};
//!
//! let mut surface = MapSurface::new(MapboardConfig::default())?;
//!
//! surface.dispatch(MapEvent::FeatureCreated {
//!     tool: DrawTool::Polygon,
//!     geometry: Geometry::Polygon(polygon![
//!         (x: 78.0, y: 20.0),
//!         (x: 78.1, y: 20.0),
//!         (x: 78.1, y: 20.1),
//!     ]),
//! })?;
//!
//! let change = surface.dispatch(MapEvent::CreateBuffer { distance: "500".into() })?;
//! assert!(matches!(change, SurfaceChange::LayerAdded(_)));
//! assert_eq!(surface.layers().len(), 1);
//! # Ok::<(), mapboard::error::MapboardError>(())
//! ```
//!
//! # Main components
//!
//! * [`MapSurface`] owns the [`MapView`], the [`LayerCatalog`](catalog::LayerCatalog), the
//!   [`DrawingSurface`](drawing::DrawingSurface), the [`Measurement`](measure::Measurement) and
//!   every layer added at runtime (buffers and imported shapefiles).
//! * [`MapEvent`] is the only way to change that state. Each UI action becomes one event, and
//!   [`MapSurface::dispatch`] answers with a [`SurfaceChange`] telling the renderer what to
//!   update.
//! * Heavy lifting is done by the geo ecosystem: [`buffer`] uses `geo` to compute buffers, and
//!   [`import`] uses `zip` and `shapefile` to read uploaded archives.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod buffer;
pub mod catalog;
pub mod config;
pub mod drawing;
pub mod error;
mod event;
pub mod import;
pub mod measure;
mod projection;
mod surface;
pub mod tile;
mod view;

#[cfg(test)]
mod tests;

pub use config::MapboardConfig;
pub use event::{MapEvent, SurfaceChange};
pub use surface::{LayerId, MapLayer, MapSurface};
pub use view::MapView;

// Reexport the geometry crates used in the public API.
pub use geo_types;
pub use geojson;
