use std::sync::Arc;

use galileo::control::{EventPropagation, MouseButton, UserEvent, UserEventHandler};
use galileo::Map;
use galileo_types::cartesian::CartesianPoint2d;
use mapboard::geo_types::Coord;
use mapboard::tile::mercator_to_lonlat;
use parking_lot::Mutex;

/// What a left click on the map does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum ClickMode {
    /// Clicks are left to the map controller.
    #[default]
    Pan,
    /// Clicks add vertices to the active sketch.
    Sketch,
    /// Clicks add measurement points.
    Measure,
}

#[derive(Debug, Default)]
struct ClickState {
    mode: ClickMode,
    clicks: Vec<Coord<f64>>,
}

/// Collects map clicks in the event handler so that the app can apply them on the next frame.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClickCollector(Arc<Mutex<ClickState>>);

impl ClickCollector {
    pub(crate) fn mode(&self) -> ClickMode {
        self.0.lock().mode
    }

    pub(crate) fn set_mode(&self, mode: ClickMode) {
        let mut state = self.0.lock();
        state.mode = mode;
        state.clicks.clear();
    }

    /// Clicked positions since the last call, `x = longitude, y = latitude`.
    pub(crate) fn take_clicks(&self) -> Vec<Coord<f64>> {
        std::mem::take(&mut self.0.lock().clicks)
    }

    pub(crate) fn handler(&self) -> impl UserEventHandler {
        let state = self.0.clone();
        move |ev: &UserEvent, map: &mut Map| {
            let UserEvent::Click(MouseButton::Left, event) = ev else {
                return EventPropagation::Propagate;
            };

            let mut state = state.lock();
            if state.mode == ClickMode::Pan {
                return EventPropagation::Propagate;
            }

            let Some(position) = map.view().screen_to_map(event.screen_pointer_position) else {
                return EventPropagation::Stop;
            };

            state.clicks.push(mercator_to_lonlat(Coord {
                x: position.x(),
                y: position.y(),
            }));
            map.redraw();

            EventPropagation::Stop
        }
    }
}
