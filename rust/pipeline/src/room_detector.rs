// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room detection from wall topology
//!
//! Rooms are never tagged in the drawing: they are the enclosed faces of the
//! wall centreline network. Tagged floor-layer polygons only contribute a
//! room kind (bathroom, kitchen) and stand in for rooms when the wall
//! network does not enclose them.

use crate::config::{MarkerConfig, PipelineConfig};
use crate::layers::has_marker;
use crate::types::{FloorPolygon, RoomKind, RoomPolygon, RoomSource, WallSegment};
use plan3d_geometry::polygonize;
use serde::Serialize;

/// Counters describing one detection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    /// Bounded faces of the wall network
    pub faces: usize,
    /// Faces not strictly above the minimum room area
    pub below_min_area: usize,
    pub dangles_removed: usize,
    pub bridges_removed: usize,
    /// Tagged candidates added because no inferred room covers them
    pub tagged_added: usize,
}

/// Detected rooms with their statistics
#[derive(Debug, Clone, Default)]
pub struct RoomDetection {
    pub rooms: Vec<RoomPolygon>,
    pub stats: RoomStats,
}

/// Infers rooms from wall centrelines
#[derive(Debug, Clone)]
pub struct RoomDetector {
    snap_tolerance: f64,
    min_room_area: f64,
    markers: MarkerConfig,
}

impl Default for RoomDetector {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl RoomDetector {
    pub fn new(snap_tolerance: f64, min_room_area: f64, markers: MarkerConfig) -> Self {
        Self {
            snap_tolerance,
            min_room_area,
            markers,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.snap_tolerance,
            config.min_room_area,
            config.markers.clone(),
        )
    }

    /// Room kind implied by a layer name
    pub fn kind_of(&self, layer: &str) -> RoomKind {
        if has_marker(layer, &self.markers.bathroom) {
            RoomKind::Bathroom
        } else if has_marker(layer, &self.markers.kitchen) {
            RoomKind::Kitchen
        } else {
            RoomKind::Other
        }
    }

    /// Polygonize the wall network and reconcile it with tagged candidates
    pub fn detect(&self, walls: &[WallSegment], candidates: &[FloorPolygon]) -> RoomDetection {
        let lines: Vec<_> = walls.iter().map(|w| w.points().to_vec()).collect();
        let network = polygonize(&lines, self.snap_tolerance);

        let mut stats = RoomStats {
            faces: network.faces.len(),
            dangles_removed: network.dangles_removed,
            bridges_removed: network.bridges_removed,
            ..RoomStats::default()
        };

        let mut rooms: Vec<RoomPolygon> = Vec::with_capacity(network.faces.len());
        for face in network.faces {
            let area = face.area();
            if area > self.min_room_area {
                rooms.push(RoomPolygon {
                    profile: face,
                    area,
                    kind: RoomKind::Other,
                    source: RoomSource::Inferred,
                });
            } else {
                stats.below_min_area += 1;
            }
        }

        for candidate in candidates {
            let kind = self.kind_of(&candidate.layer);
            let profile = candidate.to_profile();
            let probe = profile.interior_point();

            let mut covered = false;
            for room in rooms
                .iter_mut()
                .filter(|r| r.source == RoomSource::Inferred)
            {
                let overlaps = probe.is_some_and(|p| room.profile.contains(&p))
                    || room
                        .profile
                        .interior_point()
                        .is_some_and(|p| profile.contains(&p));
                if overlaps {
                    covered = true;
                    if room.kind == RoomKind::Other {
                        room.kind = kind;
                    }
                }
            }

            if !covered {
                stats.tagged_added += 1;
                rooms.push(RoomPolygon {
                    area: candidate.area,
                    profile,
                    kind,
                    source: RoomSource::Tagged,
                });
            }
        }

        RoomDetection { rooms, stats }
    }
}

/// Rooms enclosed by the wall network, with default tolerance and minimum area
pub fn detect_rooms(walls: &[WallSegment]) -> Vec<RoomPolygon> {
    RoomDetector::default().detect(walls, &[]).rooms
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn wall(points: &[(f64, f64)]) -> WallSegment {
        WallSegment::new(
            points.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
            "A-WALL",
        )
        .unwrap()
    }

    fn candidate(layer: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> FloorPolygon {
        FloorPolygon {
            ring: vec![
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
            area: (x1 - x0) * (y1 - y0),
            layer: layer.to_string(),
        }
    }

    fn two_room_plan() -> Vec<WallSegment> {
        vec![
            wall(&[(0.0, 0.0), (10.0, 0.0)]),
            wall(&[(10.0, 0.0), (10.0, 6.0)]),
            wall(&[(10.0, 6.0), (0.0, 6.0)]),
            wall(&[(0.0, 6.0), (0.0, 0.0)]),
            // Partition ending on the outer walls (T-junctions)
            wall(&[(4.0, 0.0), (4.0, 6.0)]),
        ]
    }

    #[test]
    fn test_rooms_from_wall_topology() {
        let mut rooms = detect_rooms(&two_room_plan());
        assert_eq!(rooms.len(), 2);
        rooms.sort_by(|a, b| a.area.total_cmp(&b.area));
        assert!((rooms[0].area - 24.0).abs() < 1e-9);
        assert!((rooms[1].area - 36.0).abs() < 1e-9);
        assert!(rooms.iter().all(|r| r.source == RoomSource::Inferred));
    }

    #[test]
    fn test_open_network_yields_no_rooms() {
        let walls = vec![
            wall(&[(0.0, 0.0), (10.0, 0.0)]),
            wall(&[(10.0, 0.0), (10.0, 6.0)]),
        ];
        assert!(detect_rooms(&walls).is_empty());
    }

    #[test]
    fn test_gap_larger_than_tolerance_breaks_enclosure() {
        let walls = vec![
            wall(&[(0.0, 0.0), (10.0, 0.0), (10.0, 6.0), (0.0, 6.0)]),
            wall(&[(0.0, 5.0), (0.0, 0.0)]),
        ];
        assert!(detect_rooms(&walls).is_empty());

        // The same one-unit gap closes with a coarser snap tolerance
        let detector = RoomDetector::new(1.5, 5.0, MarkerConfig::default());
        assert_eq!(detector.detect(&walls, &[]).rooms.len(), 1);
    }

    #[test]
    fn test_small_faces_filtered() {
        let walls = vec![
            wall(&[(0.0, 0.0), (10.0, 0.0), (10.0, 6.0), (0.0, 6.0), (0.0, 0.0)]),
            // Duct shaft of 1x1
            wall(&[(9.0, 0.0), (9.0, 1.0), (10.0, 1.0)]),
        ];
        let detection = RoomDetector::default().detect(&walls, &[]);
        assert_eq!(detection.rooms.len(), 1);
        assert_eq!(detection.stats.below_min_area, 1);
        assert_eq!(detection.stats.faces, 2);
    }

    #[test]
    fn test_wet_room_kind_from_tagged_candidate() {
        let candidates = vec![candidate("A-FLOR-BATH", 0.5, 0.5, 3.5, 5.5)];
        let detection = RoomDetector::default().detect(&two_room_plan(), &candidates);

        assert_eq!(detection.rooms.len(), 2);
        let bath = detection
            .rooms
            .iter()
            .find(|r| r.kind == RoomKind::Bathroom)
            .unwrap();
        assert!((bath.area - 24.0).abs() < 1e-9);
        assert_eq!(detection.stats.tagged_added, 0);
    }

    #[test]
    fn test_uncovered_candidate_kept_as_room() {
        let candidates = vec![candidate("A-FLOR-KITCHEN", 20.0, 0.0, 24.0, 3.0)];
        let detection = RoomDetector::default().detect(&two_room_plan(), &candidates);

        assert_eq!(detection.rooms.len(), 3);
        let tagged = detection
            .rooms
            .iter()
            .find(|r| r.source == RoomSource::Tagged)
            .unwrap();
        assert_eq!(tagged.kind, RoomKind::Kitchen);
        assert_eq!(detection.stats.tagged_added, 1);
    }
}
