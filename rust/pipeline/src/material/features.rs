// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-element feature vectors

use super::model::{LabelEncoder, FEATURE_COUNT};
use crate::config::PipelineConfig;
use crate::layers::has_marker;
use crate::types::{ElementKind, Opening, OpeningKind, RoomKind, RoomPolygon, WallSegment};
use crate::wall_network::WallShell;
use plan3d_geometry::polygon::point_ring_distance;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};

/// Walls within this angle of an axis count as axis-aligned
const AXIS_TOLERANCE_DEG: f64 = 10.0;

/// Centreline direction class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Diagonal,
}

impl Orientation {
    /// Classify a direction given in radians
    pub fn from_angle(angle: f64) -> Self {
        let tolerance = AXIS_TOLERANCE_DEG.to_radians();
        let a = angle.rem_euclid(PI);
        if a <= tolerance || PI - a <= tolerance {
            Orientation::Horizontal
        } else if (a - FRAC_PI_2).abs() <= tolerance {
            Orientation::Vertical
        } else {
            Orientation::Diagonal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
            Orientation::Diagonal => "diagonal",
        }
    }
}

/// Wet rooms an element borders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Adjacency {
    pub bathroom: bool,
    pub kitchen: bool,
}

impl Adjacency {
    pub fn is_wet(&self) -> bool {
        self.bathroom || self.kitchen
    }
}

/// Classification input for one wall or opening.
///
/// `length`, `thickness`, `height`, `orientation` and `is_exterior` form the
/// model input block, in that order. The remaining fields are read by rules
/// only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub length: f64,
    pub thickness: f64,
    pub height: f64,
    pub orientation: Orientation,
    pub is_exterior: bool,
    pub adjacency: Adjacency,
    pub layer: String,
    pub element: ElementKind,
}

impl FeatureVector {
    /// A wall with neutral defaults, for callers building vectors by hand
    pub fn wall(layer: impl Into<String>, thickness: f64, height: f64) -> Self {
        Self {
            length: 1.0,
            thickness,
            height,
            orientation: Orientation::Horizontal,
            is_exterior: false,
            adjacency: Adjacency::default(),
            layer: layer.into(),
            element: ElementKind::Wall,
        }
    }

    /// Numeric model input; the orientation goes through the artifact's encoder
    pub fn to_model_input(&self, orientation: &LabelEncoder) -> [f64; FEATURE_COUNT] {
        [
            self.length,
            self.thickness,
            self.height,
            orientation.transform(self.orientation.as_str()) as f64,
            if self.is_exterior { 1.0 } else { 0.0 },
        ]
    }
}

/// Derives feature vectors from the built wall shell and detected rooms
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor<'a> {
    shell: &'a WallShell,
    rooms: &'a [RoomPolygon],
    config: &'a PipelineConfig,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(shell: &'a WallShell, rooms: &'a [RoomPolygon], config: &'a PipelineConfig) -> Self {
        Self {
            shell,
            rooms,
            config,
        }
    }

    /// Features of the wall at `index` in the shell's input order
    pub fn wall(&self, index: usize, wall: &WallSegment) -> FeatureVector {
        let thickness = self
            .shell
            .thicknesses
            .get(index)
            .copied()
            .unwrap_or(self.config.thickness.default);

        FeatureVector {
            length: wall.length(),
            thickness,
            height: self.config.heights.resolve(&wall.layer),
            orientation: Orientation::from_angle(wall.angle()),
            is_exterior: self.is_exterior(wall, thickness),
            adjacency: self.adjacency(wall, thickness),
            layer: wall.layer.clone(),
            element: ElementKind::Wall,
        }
    }

    /// Features of a door or window panel.
    ///
    /// Openings sit in walls, so exterior and adjacency tests use the host
    /// wall thickness rather than the panel's.
    pub fn opening(&self, opening: &Opening) -> FeatureVector {
        let openings = &self.config.openings;
        let host = self.config.thickness.max();
        let height = match opening.kind {
            OpeningKind::Door => openings.door_height,
            OpeningKind::Window => openings.window_height,
        };

        FeatureVector {
            length: opening.segment.length(),
            thickness: openings.panel_thickness,
            height,
            orientation: Orientation::from_angle(opening.segment.angle()),
            is_exterior: self.is_exterior(&opening.segment, host),
            adjacency: self.adjacency(&opening.segment, host),
            layer: opening.segment.layer.clone(),
            element: opening.kind.into(),
        }
    }

    fn is_exterior(&self, segment: &WallSegment, thickness: f64) -> bool {
        has_marker(&segment.layer, &self.config.markers.exterior)
            || self
                .shell
                .is_on_outline(segment, thickness, self.config.snap_tolerance)
    }

    /// Wet rooms whose boundary passes within one wall thickness of the
    /// centreline midpoint
    fn adjacency(&self, segment: &WallSegment, thickness: f64) -> Adjacency {
        let mid = segment.midpoint();
        let reach = thickness + self.config.snap_tolerance;
        let mut adjacency = Adjacency::default();

        for room in self.rooms.iter().filter(|r| r.kind.is_wet()) {
            let touches = std::iter::once(&room.profile.outer)
                .chain(room.profile.holes.iter())
                .any(|ring| point_ring_distance(&mid, ring) <= reach);
            if touches {
                match room.kind {
                    RoomKind::Bathroom => adjacency.bathroom = true,
                    RoomKind::Kitchen => adjacency.kitchen = true,
                    RoomKind::Other => {}
                }
            }
        }
        adjacency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomSource;
    use crate::wall_network::build_wall_shell_with;
    use nalgebra::Point2;
    use plan3d_geometry::Profile2D;

    fn wall(points: &[(f64, f64)], layer: &str) -> WallSegment {
        WallSegment::new(
            points.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
            layer,
        )
        .unwrap()
    }

    fn rect_room(x0: f64, y0: f64, x1: f64, y1: f64, kind: RoomKind) -> RoomPolygon {
        let profile = Profile2D::new(vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]);
        RoomPolygon {
            area: profile.area(),
            profile,
            kind,
            source: RoomSource::Inferred,
        }
    }

    #[test]
    fn test_orientation_classes() {
        assert_eq!(Orientation::from_angle(0.0), Orientation::Horizontal);
        assert_eq!(Orientation::from_angle(PI), Orientation::Horizontal);
        assert_eq!(Orientation::from_angle(-0.1), Orientation::Horizontal);
        assert_eq!(Orientation::from_angle(FRAC_PI_2), Orientation::Vertical);
        assert_eq!(Orientation::from_angle(-FRAC_PI_2 + 0.1), Orientation::Vertical);
        assert_eq!(Orientation::from_angle(PI / 4.0), Orientation::Diagonal);
    }

    #[test]
    fn test_model_input_order() {
        let mut f = FeatureVector::wall("A-WALL", 0.25, 3.0);
        f.length = 7.0;
        f.orientation = Orientation::Vertical;
        f.is_exterior = true;

        let enc = LabelEncoder::new(["diagonal", "horizontal", "vertical"]);
        assert_eq!(f.to_model_input(&enc), [7.0, 0.25, 3.0, 2.0, 1.0]);
        // Unseen orientation degrades to code 0
        let enc = LabelEncoder::new(["north", "south"]);
        assert_eq!(f.to_model_input(&enc)[3], 0.0);
    }

    #[test]
    fn test_wall_features_from_plan() {
        let config = PipelineConfig::default();
        let walls = vec![
            wall(&[(0.0, 0.0), (10.0, 0.0)], "A-WALL"),
            wall(&[(10.0, 0.0), (10.0, 6.0)], "A-WALL"),
            wall(&[(10.0, 6.0), (0.0, 6.0)], "A-WALL"),
            wall(&[(0.0, 6.0), (0.0, 0.0)], "A-WALL"),
            wall(&[(4.0, 0.0), (4.0, 6.0)], "A-PART-HALF"),
        ];
        let shell = build_wall_shell_with(
            &walls,
            &[],
            |w| config.thickness.resolve(&w.layer, &config.markers),
            config.door_clearance,
        )
        .unwrap();
        let rooms = vec![
            rect_room(0.0, 0.0, 4.0, 6.0, RoomKind::Bathroom),
            rect_room(4.0, 0.0, 10.0, 6.0, RoomKind::Other),
        ];
        let extractor = FeatureExtractor::new(&shell, &rooms, &config);

        let outer = extractor.wall(1, &walls[1]);
        assert!(outer.is_exterior);
        assert_eq!(outer.orientation, Orientation::Vertical);
        assert_eq!(outer.length, 6.0);
        assert_eq!(outer.thickness, 0.25);
        assert!(!outer.adjacency.is_wet());

        let partition = extractor.wall(4, &walls[4]);
        assert!(!partition.is_exterior);
        assert_eq!(partition.thickness, 0.10);
        assert_eq!(partition.height, 1.2);
        assert!(partition.adjacency.bathroom);
        assert!(!partition.adjacency.kitchen);
    }

    #[test]
    fn test_exterior_marker_overrides_geometry() {
        let config = PipelineConfig::default();
        let walls = vec![
            wall(&[(0.0, 0.0), (10.0, 0.0), (10.0, 6.0), (0.0, 6.0), (0.0, 0.0)], "A-WALL"),
            wall(&[(4.0, 0.0), (4.0, 6.0)], "A-WALL"),
            wall(&[(7.0, 0.0), (7.0, 6.0)], "A-WALL-EXT"),
        ];
        let shell = build_wall_shell_with(&walls, &[], |_| 0.25, 1.2).unwrap();
        let extractor = FeatureExtractor::new(&shell, &[], &config);

        assert!(extractor.wall(0, &walls[0]).is_exterior);
        assert!(!extractor.wall(1, &walls[1]).is_exterior);
        assert!(extractor.wall(2, &walls[2]).is_exterior);
    }

    #[test]
    fn test_opening_features() {
        let config = PipelineConfig::default();
        let walls = vec![wall(&[(0.0, 0.0), (10.0, 0.0)], "A-WALL")];
        let shell = build_wall_shell_with(&walls, &[], |_| 0.25, 1.2).unwrap();
        let extractor = FeatureExtractor::new(&shell, &[], &config);

        let window = Opening {
            kind: OpeningKind::Window,
            segment: wall(&[(2.0, 0.0), (3.5, 0.0)], "A-WIN"),
        };
        let f = extractor.opening(&window);
        assert_eq!(f.element, ElementKind::Window);
        assert_eq!(f.height, 1.2);
        assert_eq!(f.thickness, 0.05);
        assert!((f.length - 1.5).abs() < 1e-12);
        assert!(f.is_exterior);
    }
}
