// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for floor plan classification and 3D reconstruction

use nalgebra::Point2;
use plan3d_geometry::polygon::{dedup_consecutive, polyline_length, EPSILON_2D};
use plan3d_geometry::Profile2D;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D point (simplified for serialization)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_nalgebra(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn from_nalgebra(p: &Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Drawing primitive emitted by the CAD reader
///
/// JSON form: `{"type": "line", "layer": "A-WALL", "start": {..}, "end": {..}}`.
/// `lwpolyline` is accepted as an alias for `polyline`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Primitive {
    Line {
        layer: String,
        start: Point2D,
        end: Point2D,
    },
    #[serde(alias = "lwpolyline")]
    Polyline {
        layer: String,
        points: Vec<Point2D>,
        #[serde(default)]
        closed: bool,
    },
    Spline {
        layer: String,
        control_points: Vec<Point2D>,
    },
}

impl Primitive {
    pub fn line(layer: impl Into<String>, start: (f64, f64), end: (f64, f64)) -> Self {
        Primitive::Line {
            layer: layer.into(),
            start: Point2D::new(start.0, start.1),
            end: Point2D::new(end.0, end.1),
        }
    }

    pub fn polyline(layer: impl Into<String>, points: &[(f64, f64)], closed: bool) -> Self {
        Primitive::Polyline {
            layer: layer.into(),
            points: points.iter().map(|&(x, y)| Point2D::new(x, y)).collect(),
            closed,
        }
    }

    pub fn layer(&self) -> &str {
        match self {
            Primitive::Line { layer, .. }
            | Primitive::Polyline { layer, .. }
            | Primitive::Spline { layer, .. } => layer,
        }
    }

    /// Only polylines can be explicitly closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Primitive::Polyline { closed: true, .. })
    }

    /// Raw point sequence, without any validity filtering
    pub fn raw_points(&self) -> Vec<Point2D> {
        match self {
            Primitive::Line { start, end, .. } => vec![*start, *end],
            Primitive::Polyline { points, .. } => points.clone(),
            Primitive::Spline { control_points, .. } => control_points.clone(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Primitive::Line { .. } => "line",
            Primitive::Polyline { .. } => "polyline",
            Primitive::Spline { .. } => "spline",
        }
    }
}

/// Semantic category derived from a layer name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wall,
    Floor,
    Door,
    Window,
    Ignore,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Wall => "wall",
            Category::Floor => "floor",
            Category::Door => "door",
            Category::Window => "window",
            Category::Ignore => "ignore",
        };
        f.write_str(name)
    }
}

/// Wall centreline: at least two distinct points plus its layer
#[derive(Debug, Clone, PartialEq)]
pub struct WallSegment {
    points: Vec<Point2<f64>>,
    pub layer: String,
}

impl WallSegment {
    /// Build a segment, collapsing consecutive duplicates.
    ///
    /// Returns `None` when fewer than two distinct points remain.
    pub fn new(points: Vec<Point2<f64>>, layer: impl Into<String>) -> Option<Self> {
        let points = dedup_consecutive(&points, EPSILON_2D);
        if points.len() < 2 {
            return None;
        }
        Some(Self {
            points,
            layer: layer.into(),
        })
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn start(&self) -> Point2<f64> {
        self.points[0]
    }

    pub fn end(&self) -> Point2<f64> {
        self.points[self.points.len() - 1]
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// Point halfway along the polyline
    pub fn midpoint(&self) -> Point2<f64> {
        let half = self.length() / 2.0;
        let mut walked = 0.0;
        for w in self.points.windows(2) {
            let step = (w[1] - w[0]).norm();
            if walked + step >= half && step > 0.0 {
                return w[0] + (w[1] - w[0]) * ((half - walked) / step);
            }
            walked += step;
        }
        self.end()
    }

    /// Direction of the chord from first to last point, in radians
    pub fn angle(&self) -> f64 {
        let d = self.end() - self.start();
        d.y.atan2(d.x)
    }
}

/// Door or window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OpeningKind {
    Door,
    Window,
}

/// Opening: a short wall-like segment used for subtractive geometry only
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
    pub kind: OpeningKind,
    pub segment: WallSegment,
}

/// Explicitly tagged closed floor polygon
#[derive(Debug, Clone, PartialEq)]
pub struct FloorPolygon {
    /// Counter-clockwise ring without a closing duplicate
    pub ring: Vec<Point2<f64>>,
    pub area: f64,
    pub layer: String,
}

impl FloorPolygon {
    pub fn to_profile(&self) -> Profile2D {
        Profile2D::new(self.ring.clone())
    }
}

/// Room use, as far as it affects material rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Bathroom,
    Kitchen,
    #[default]
    Other,
}

impl RoomKind {
    pub fn is_wet(&self) -> bool {
        matches!(self, RoomKind::Bathroom | RoomKind::Kitchen)
    }
}

/// Where a room came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomSource {
    /// Enclosed face of the wall network
    Inferred,
    /// Closed floor-layer polygon no inferred room accounts for
    Tagged,
}

/// Room polygon
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPolygon {
    pub profile: Profile2D,
    pub area: f64,
    pub kind: RoomKind,
    pub source: RoomSource,
}

/// Kind of element a solid or feature vector describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Wall,
    Door,
    Window,
    Floor,
    Room,
}

impl From<OpeningKind> for ElementKind {
    fn from(kind: OpeningKind) -> Self {
        match kind {
            OpeningKind::Door => ElementKind::Door,
            OpeningKind::Window => ElementKind::Window,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Wall => "wall",
            ElementKind::Door => "door",
            ElementKind::Window => "window",
            ElementKind::Floor => "floor",
            ElementKind::Room => "room",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_json_tagging() {
        let json = r#"[
            {"type": "line", "layer": "A-WALL", "start": {"x": 0, "y": 0}, "end": {"x": 5, "y": 0}},
            {"type": "lwpolyline", "layer": "A-FLOR", "points": [{"x": 0, "y": 0}, {"x": 1, "y": 0}, {"x": 1, "y": 1}], "closed": true},
            {"type": "spline", "layer": "A-WALL", "control_points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}]},
            {"type": "polyline", "layer": "0", "points": []}
        ]"#;
        let primitives: Vec<Primitive> = serde_json::from_str(json).unwrap();

        assert_eq!(primitives.len(), 4);
        assert_eq!(primitives[0].layer(), "A-WALL");
        assert!(primitives[1].is_closed());
        assert_eq!(primitives[2].kind_name(), "spline");
        assert!(!primitives[3].is_closed());
    }

    #[test]
    fn test_wall_segment_requires_two_distinct_points() {
        let p = Point2::new(1.0, 1.0);
        assert!(WallSegment::new(vec![p, p], "A-WALL").is_none());
        assert!(WallSegment::new(vec![p], "A-WALL").is_none());

        let wall = WallSegment::new(vec![p, p, Point2::new(4.0, 1.0)], "A-WALL").unwrap();
        assert_eq!(wall.points().len(), 2);
        assert!((wall.length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_wall_midpoint_follows_polyline() {
        let wall = WallSegment::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 4.0),
            ],
            "A-WALL",
        )
        .unwrap();
        let mid = wall.midpoint();
        assert!((mid.x - 4.0).abs() < 1e-12);
        assert!(mid.y.abs() < 1e-12);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Wall.to_string(), "wall");
        assert_eq!(Category::Ignore.to_string(), "ignore");
    }
}
