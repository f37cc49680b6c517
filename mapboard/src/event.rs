use geo_types::{Geometry, Point};

use crate::drawing::{DrawTool, FeatureId};
use crate::error::MapboardError;
use crate::import::ImportedFeatureSet;
use crate::surface::LayerId;
use crate::MapView;

/// User action or completed background task, applied with
/// [`MapSurface::dispatch`](crate::MapSurface::dispatch).
#[derive(Debug)]
pub enum MapEvent {
    /// Base layer radio button selected.
    SelectBaseLayer(String),
    /// Overlay checkbox changed.
    SetOverlayVisible {
        /// Overlay name.
        name: String,
        /// New state of the checkbox.
        visible: bool,
    },
    /// Drawing toolbar finished a feature.
    FeatureCreated {
        /// Tool the feature was drawn with.
        tool: DrawTool,
        /// Geometry, `x = longitude, y = latitude`.
        geometry: Geometry<f64>,
    },
    /// A drawn feature was edited.
    FeatureEdited {
        /// Edited feature.
        id: FeatureId,
        /// New geometry.
        geometry: Geometry<f64>,
    },
    /// A drawn feature was deleted.
    FeatureDeleted(FeatureId),
    /// Buffer button pressed.
    CreateBuffer {
        /// Contents of the distance input, in meters.
        distance: String,
    },
    /// Shapefile import task finished.
    ShapefileLoaded(Result<ImportedFeatureSet, MapboardError>),
    /// Point added to the measurement.
    MeasurePoint(Point<f64>),
    /// Measurement finished.
    FinishMeasurement,
    /// Measurement cleared.
    ClearMeasurement,
    /// Map panned or zoomed.
    SetView(MapView),
}

/// What changed after an event was applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SurfaceChange {
    /// Nothing to redraw.
    None,
    /// Base layer at the index became the active one.
    BaseLayerSelected(usize),
    /// Overlay at the index was shown or hidden.
    OverlayVisibility {
        /// Overlay index in the catalog.
        index: usize,
        /// New visibility.
        visible: bool,
    },
    /// Drawn features changed.
    DrawingChanged,
    /// A runtime layer was added.
    LayerAdded(LayerId),
    /// Measurement changed.
    MeasurementChanged,
    /// View changed.
    ViewChanged,
}
