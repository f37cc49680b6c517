use std::f64::consts::TAU;

use geo_types::{Coord, Geometry, LineString, Point, Polygon};

use super::DrawTool;
use crate::error::MapboardError;
use crate::tile::{lonlat_to_mercator, mercator_to_lonlat};

const CIRCLE_SEGMENTS: usize = 64;

/// Result of adding a vertex to a [`Sketch`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SketchState {
    /// More vertices can be added, the sketch may or may not be finishable yet.
    Drawing,
    /// The tool got all the vertices it needs, the sketch should be finished.
    Complete,
}

/// Geometry being drawn with one of the toolbar tools.
///
/// A marker is complete after one click, rectangle and circle after two. Polylines and polygons
/// take any number of vertices and are finished explicitly.
#[derive(Debug, Clone)]
pub struct Sketch {
    tool: DrawTool,
    vertices: Vec<Coord<f64>>,
}

impl Sketch {
    /// Starts an empty sketch.
    pub fn new(tool: DrawTool) -> Self {
        Self {
            tool,
            vertices: Vec::new(),
        }
    }

    /// Tool of the sketch.
    pub fn tool(&self) -> DrawTool {
        self.tool
    }

    /// Vertices added so far, `x = longitude, y = latitude`.
    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    /// Adds a clicked point. Vertices past the ones a fixed-size tool needs are ignored.
    pub fn add_vertex(&mut self, vertex: Coord<f64>) -> SketchState {
        match self.fixed_size() {
            Some(size) if self.vertices.len() >= size => {}
            _ => self.vertices.push(vertex),
        }

        match self.fixed_size() {
            Some(size) if self.vertices.len() >= size => SketchState::Complete,
            _ => SketchState::Drawing,
        }
    }

    /// Removes the last vertex.
    pub fn undo(&mut self) -> Option<Coord<f64>> {
        self.vertices.pop()
    }

    /// Returns true if [`Sketch::finish`] would produce a geometry.
    pub fn can_finish(&self) -> bool {
        self.vertices.len() >= self.min_vertices()
    }

    /// Converts the sketch into the geometry of the tool.
    pub fn finish(self) -> Result<Geometry<f64>, MapboardError> {
        let required = self.min_vertices();
        if self.vertices.len() < required {
            return Err(MapboardError::IncompleteSketch {
                tool: self.tool,
                required,
                actual: self.vertices.len(),
            });
        }

        let geometry = match self.tool {
            DrawTool::Marker => Point(self.vertices[0]).into(),
            DrawTool::Polyline => LineString::new(self.vertices).into(),
            DrawTool::Polygon => Polygon::new(LineString::new(self.vertices), vec![]).into(),
            DrawTool::Rectangle => rectangle(self.vertices[0], self.vertices[1])
                .ok_or(MapboardError::DegenerateSketch(self.tool))?
                .into(),
            DrawTool::Circle => circle(self.vertices[0], self.vertices[1])
                .ok_or(MapboardError::DegenerateSketch(self.tool))?
                .into(),
        };

        Ok(geometry)
    }

    fn fixed_size(&self) -> Option<usize> {
        match self.tool {
            DrawTool::Marker => Some(1),
            DrawTool::Rectangle | DrawTool::Circle => Some(2),
            DrawTool::Polyline | DrawTool::Polygon => None,
        }
    }

    fn min_vertices(&self) -> usize {
        match self.tool {
            DrawTool::Marker => 1,
            DrawTool::Polyline | DrawTool::Rectangle | DrawTool::Circle => 2,
            DrawTool::Polygon => 3,
        }
    }
}

fn rectangle(a: Coord<f64>, b: Coord<f64>) -> Option<Polygon<f64>> {
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    if min_x == max_x || min_y == max_y {
        return None;
    }

    let ring = vec![
        Coord { x: min_x, y: min_y },
        Coord { x: min_x, y: max_y },
        Coord { x: max_x, y: max_y },
        Coord { x: max_x, y: min_y },
    ];
    Some(Polygon::new(LineString::new(ring), vec![]))
}

// The circle is round on the Web Mercator plane the map is displayed in.
fn circle(center: Coord<f64>, rim: Coord<f64>) -> Option<Polygon<f64>> {
    let projected_center = lonlat_to_mercator(center);
    let projected_rim = lonlat_to_mercator(rim);
    let radius = (projected_rim.x - projected_center.x).hypot(projected_rim.y - projected_center.y);
    if radius == 0.0 {
        return None;
    }

    let ring = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            mercator_to_lonlat(Coord {
                x: projected_center.x + radius * angle.cos(),
                y: projected_center.y + radius * angle.sin(),
            })
        })
        .collect();

    Some(Polygon::new(LineString::new(ring), vec![]))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use geo_types::coord;

    use super::*;

    #[test]
    fn marker_completes_on_first_click() {
        let mut sketch = Sketch::new(DrawTool::Marker);
        assert_eq!(sketch.add_vertex(coord! { x: 1.0, y: 2.0 }), SketchState::Complete);
        assert_eq!(sketch.add_vertex(coord! { x: 3.0, y: 4.0 }), SketchState::Complete);
        assert_eq!(sketch.vertices().len(), 1);

        assert_matches!(sketch.finish(), Ok(Geometry::Point(p)) if p.x() == 1.0 && p.y() == 2.0);
    }

    #[test]
    fn polygon_needs_three_vertices() {
        let mut sketch = Sketch::new(DrawTool::Polygon);
        assert_eq!(sketch.add_vertex(coord! { x: 0.0, y: 0.0 }), SketchState::Drawing);
        assert_eq!(sketch.add_vertex(coord! { x: 1.0, y: 0.0 }), SketchState::Drawing);
        assert!(!sketch.can_finish());
        assert_matches!(
            sketch.clone().finish(),
            Err(MapboardError::IncompleteSketch { required: 3, actual: 2, .. })
        );

        sketch.add_vertex(coord! { x: 1.0, y: 1.0 });
        assert!(sketch.can_finish());
        let Ok(Geometry::Polygon(polygon)) = sketch.finish() else {
            panic!("expected a polygon");
        };
        // the ring is closed
        assert_eq!(polygon.exterior().0.len(), 4);
    }

    #[test]
    fn polyline_undo() {
        let mut sketch = Sketch::new(DrawTool::Polyline);
        sketch.add_vertex(coord! { x: 0.0, y: 0.0 });
        sketch.add_vertex(coord! { x: 1.0, y: 0.0 });
        sketch.add_vertex(coord! { x: 2.0, y: 0.0 });
        assert_eq!(sketch.undo(), Some(coord! { x: 2.0, y: 0.0 }));

        assert_matches!(sketch.finish(), Ok(Geometry::LineString(line)) if line.0.len() == 2);
    }

    #[test]
    fn rectangle_from_opposite_corners() {
        let mut sketch = Sketch::new(DrawTool::Rectangle);
        sketch.add_vertex(coord! { x: 2.0, y: 3.0 });
        assert_eq!(sketch.add_vertex(coord! { x: 0.0, y: 1.0 }), SketchState::Complete);

        let Ok(Geometry::Polygon(polygon)) = sketch.finish() else {
            panic!("expected a polygon");
        };
        let ring = &polygon.exterior().0;
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], coord! { x: 0.0, y: 1.0 });
        assert_eq!(ring[2], coord! { x: 2.0, y: 3.0 });
    }

    #[test]
    fn zero_size_rectangle_is_rejected() {
        let mut sketch = Sketch::new(DrawTool::Rectangle);
        sketch.add_vertex(coord! { x: 2.0, y: 3.0 });
        sketch.add_vertex(coord! { x: 2.0, y: 5.0 });
        assert_matches!(
            sketch.finish(),
            Err(MapboardError::DegenerateSketch(DrawTool::Rectangle))
        );
    }

    #[test]
    fn circle_is_approximated_with_polygon() {
        let mut sketch = Sketch::new(DrawTool::Circle);
        sketch.add_vertex(coord! { x: 0.0, y: 0.0 });
        sketch.add_vertex(coord! { x: 1.0, y: 0.0 });

        let Ok(Geometry::Polygon(polygon)) = sketch.finish() else {
            panic!("expected a polygon");
        };
        let ring = &polygon.exterior().0;
        assert_eq!(ring.len(), CIRCLE_SEGMENTS + 1);
        assert_relative_eq!(ring[0].x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(ring[0].y, 0.0, epsilon = 1e-9);
    }
}
