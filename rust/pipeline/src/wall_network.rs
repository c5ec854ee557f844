// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall network: centrelines to a merged, door-cut footprint
//!
//! 1. Each centreline segment is buffered by half its wall thickness with
//!    square end caps, so walls meeting at a corner join flush
//! 2. All buffers are unioned in one pass into the wall shell
//! 3. Door segments are buffered slightly wider than the thickest wall and
//!    their union is subtracted from the shell, after the wall union

use crate::error::{Error, Result};
use crate::types::{Opening, WallSegment};
use nalgebra::Point2;
use plan3d_geometry::polygon::{point_in_ring, point_ring_distance};
use plan3d_geometry::{
    buffer_polyline_segments, difference, intersection, total_area, union, union_contours,
    Profile2D,
};
use serde::Serialize;

/// Counters describing one shell build
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShellReport {
    pub walls: usize,
    pub degenerate_walls: usize,
    pub doors: usize,
    pub degenerate_doors: usize,
    /// Disconnected footprint pieces after door cutting
    pub pieces: usize,
    pub merged_area: f64,
    pub footprint_area: f64,
}

/// The built wall network
#[derive(Debug, Clone)]
pub struct WallShell {
    /// Union of all wall buffers, before openings are cut
    pub merged: Vec<Profile2D>,
    /// Merged shell with door cutters subtracted
    pub footprint: Vec<Profile2D>,
    /// Buffer rectangles per input wall, empty for degenerate walls
    pub wall_buffers: Vec<Vec<Vec<Point2<f64>>>>,
    /// Thickness each wall was buffered with
    pub thicknesses: Vec<f64>,
    /// Union of door buffers
    pub door_cutters: Vec<Profile2D>,
    /// Outer rings of the merged pieces not enclosed by another piece
    pub envelope: Vec<Profile2D>,
    pub report: ShellReport,
}

impl WallShell {
    /// Split the footprint into non-overlapping regions, one per group of
    /// wall indices.
    ///
    /// Each group receives the part of the footprint covered by its walls'
    /// buffers that no earlier group has claimed, so overlapping joints end
    /// up in exactly one region.
    pub fn partition(&self, groups: &[Vec<usize>]) -> Vec<Vec<Profile2D>> {
        let mut claimed: Vec<Profile2D> = Vec::new();
        let mut regions = Vec::with_capacity(groups.len());

        for group in groups {
            let rects: Vec<Vec<Point2<f64>>> = group
                .iter()
                .filter_map(|&i| self.wall_buffers.get(i))
                .flatten()
                .cloned()
                .collect();
            let coverage = union_contours(&rects);
            let region = difference(&intersection(&self.footprint, &coverage), &claimed);
            claimed = union(&claimed, &region);
            regions.push(region);
        }

        regions
    }

    /// Whether a wall's centreline runs along the outside of the building.
    ///
    /// Only the envelope counts: pieces standing inside another piece's
    /// outline (detached partitions, free-standing cores) are interior.
    pub fn is_on_outline(&self, wall: &WallSegment, thickness: f64, tolerance: f64) -> bool {
        let mid = wall.midpoint();
        self.envelope
            .iter()
            .any(|p| point_ring_distance(&mid, &p.outer) <= thickness / 2.0 + tolerance)
    }
}

/// Hole-free outlines of the pieces that no other piece encloses
fn envelope_of(merged: &[Profile2D]) -> Vec<Profile2D> {
    merged
        .iter()
        .enumerate()
        .filter(|(i, piece)| {
            // Pieces are disjoint, so one vertex decides containment
            let Some(vertex) = piece.outer.first() else {
                return false;
            };
            !merged
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && point_in_ring(vertex, &other.outer))
        })
        .map(|(_, piece)| Profile2D::new(piece.outer.clone()))
        .collect()
}

/// Build a wall shell with one uniform thickness.
///
/// Door cutters are `1.2 × thickness` wide.
pub fn build_wall_shell(
    walls: &[WallSegment],
    doors: &[Opening],
    thickness: f64,
) -> Result<WallShell> {
    build_wall_shell_with(walls, doors, |_| thickness, 1.2)
}

/// Build a wall shell with a thickness per wall.
///
/// Door cutters are `door_clearance` times the thickest wall wide.
pub fn build_wall_shell_with(
    walls: &[WallSegment],
    doors: &[Opening],
    thickness_of: impl Fn(&WallSegment) -> f64,
    door_clearance: f64,
) -> Result<WallShell> {
    let thicknesses: Vec<f64> = walls.iter().map(&thickness_of).collect();

    let mut report = ShellReport {
        walls: walls.len(),
        doors: doors.len(),
        ..ShellReport::default()
    };

    let wall_buffers: Vec<Vec<Vec<Point2<f64>>>> = walls
        .iter()
        .zip(&thicknesses)
        .map(|(wall, &t)| match buffer_polyline_segments(wall.points(), t / 2.0) {
            Ok(rects) => rects,
            Err(_) => {
                report.degenerate_walls += 1;
                Vec::new()
            }
        })
        .collect();

    let all_rects: Vec<Vec<Point2<f64>>> = wall_buffers.iter().flatten().cloned().collect();
    let merged = union_contours(&all_rects);
    if merged.is_empty() {
        return Err(Error::EmptyWallShell {
            total: walls.len(),
            degenerate: report.degenerate_walls,
        });
    }

    let max_thickness = thicknesses
        .iter()
        .zip(&wall_buffers)
        .filter(|(_, b)| !b.is_empty())
        .map(|(t, _)| *t)
        .fold(0.0, f64::max);
    let door_half_width = door_clearance * max_thickness / 2.0;

    let mut door_rects = Vec::new();
    for door in doors {
        match buffer_polyline_segments(door.segment.points(), door_half_width) {
            Ok(rects) => door_rects.extend(rects),
            Err(_) => report.degenerate_doors += 1,
        }
    }
    let door_cutters = union_contours(&door_rects);

    let footprint = difference(&merged, &door_cutters);
    if footprint.is_empty() {
        return Err(Error::EmptyWallShell {
            total: walls.len(),
            degenerate: report.degenerate_walls,
        });
    }

    let envelope = envelope_of(&merged);
    report.pieces = footprint.len();
    report.merged_area = total_area(&merged);
    report.footprint_area = total_area(&footprint);

    Ok(WallShell {
        merged,
        footprint,
        wall_buffers,
        thicknesses,
        door_cutters,
        envelope,
        report,
    })
}
