// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Boolean Operations on footprints
//!
//! Thin wrappers around the i_overlay crate. Every operand is normalised to
//! counter-clockwise outers and clockwise holes so the non-zero fill rule
//! treats overlapping input rectangles as one filled region.

use crate::polygon::{ensure_ccw, ensure_cw, signed_area, simplify_ring, EPSILON_2D};
use crate::profile::Profile2D;
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

/// Minimum area threshold - polygons smaller than this are considered degenerate
pub const MIN_AREA_THRESHOLD: f64 = 1e-10;

type Path = Vec<[f64; 2]>;

/// Union a set of simple contours into disjoint profiles.
///
/// Overlapping and touching contours merge; contours fully enclosed by others
/// are absorbed, and enclosed empty regions come back as holes.
pub fn union_contours(contours: &[Vec<Point2<f64>>]) -> Vec<Profile2D> {
    let mut paths: Vec<Path> = contours
        .iter()
        .filter(|c| c.len() >= 3 && signed_area(c).abs() > MIN_AREA_THRESHOLD)
        .map(|c| contour_to_path(&ensure_ccw(c)))
        .collect();

    if paths.is_empty() {
        return Vec::new();
    }

    // First contour as subject, everything else as clip
    let subject = vec![paths.remove(0)];
    if paths.is_empty() {
        return shapes_to_profiles(&[subject]);
    }

    let result = subject.overlay(&paths, OverlayRule::Union, FillRule::NonZero);
    shapes_to_profiles(&result)
}

/// Union two sets of profiles; each set must already be internally disjoint
pub fn union(a: &[Profile2D], b: &[Profile2D]) -> Vec<Profile2D> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Vec::new(),
        (false, true) => normalized(a),
        (true, false) => normalized(b),
        (false, false) => overlay(a, b, OverlayRule::Union),
    }
}

/// Boolean difference `a - b`
pub fn difference(a: &[Profile2D], b: &[Profile2D]) -> Vec<Profile2D> {
    if a.is_empty() {
        return Vec::new();
    }
    if b.is_empty() {
        return normalized(a);
    }
    overlay(a, b, OverlayRule::Difference)
}

/// Boolean intersection `a ∩ b`
pub fn intersection(a: &[Profile2D], b: &[Profile2D]) -> Vec<Profile2D> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    overlay(a, b, OverlayRule::Intersect)
}

/// Sum of net areas
pub fn total_area(profiles: &[Profile2D]) -> f64 {
    profiles.iter().map(Profile2D::area).sum()
}

/// Check if a contour is valid (has area, not degenerate)
pub fn is_valid_contour(contour: &[Point2<f64>]) -> bool {
    contour.len() >= 3 && signed_area(contour).abs() > MIN_AREA_THRESHOLD
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

fn overlay(a: &[Profile2D], b: &[Profile2D], rule: OverlayRule) -> Vec<Profile2D> {
    let subject: Vec<Path> = a.iter().flat_map(profile_to_paths).collect();
    let clip: Vec<Path> = b.iter().flat_map(profile_to_paths).collect();
    if subject.is_empty() {
        return Vec::new();
    }
    if clip.is_empty() {
        return normalized(a);
    }
    let result = subject.overlay(&clip, rule, FillRule::NonZero);
    shapes_to_profiles(&result)
}

/// Round-trip through the overlay representation to clean up winding and
/// drop degenerate pieces
fn normalized(profiles: &[Profile2D]) -> Vec<Profile2D> {
    profiles
        .iter()
        .filter(|p| is_valid_contour(&p.outer))
        .map(|p| Profile2D {
            outer: ensure_ccw(&p.outer),
            holes: p
                .holes
                .iter()
                .filter(|h| is_valid_contour(h))
                .map(|h| ensure_cw(h))
                .collect(),
        })
        .collect()
}

/// Convert Profile2D to i_overlay path format
fn profile_to_paths(profile: &Profile2D) -> Vec<Path> {
    if !is_valid_contour(&profile.outer) {
        return Vec::new();
    }
    let mut paths = Vec::with_capacity(1 + profile.holes.len());
    paths.push(contour_to_path(&ensure_ccw(&profile.outer)));
    for hole in profile.holes.iter().filter(|h| is_valid_contour(h)) {
        paths.push(contour_to_path(&ensure_cw(hole)));
    }
    paths
}

/// Convert a Point2 contour to i_overlay path format
fn contour_to_path(contour: &[Point2<f64>]) -> Path {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

fn path_to_contour(path: &[[f64; 2]]) -> Vec<Point2<f64>> {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

/// Convert i_overlay result shapes back to profiles
///
/// i_overlay returns Vec<Vec<Vec<[f64; 2]>>> where:
/// - Outer Vec: list of shapes
/// - Middle Vec: list of contours per shape (first is outer, rest are holes)
/// - Inner Vec: list of points per contour
fn shapes_to_profiles(shapes: &[Vec<Path>]) -> Vec<Profile2D> {
    let mut profiles = Vec::with_capacity(shapes.len());

    for shape in shapes {
        let Some(first) = shape.first() else {
            continue;
        };
        let outer = simplify_ring(&path_to_contour(first), EPSILON_2D);
        if !is_valid_contour(&outer) {
            continue;
        }

        let holes = shape
            .iter()
            .skip(1)
            .map(|c| simplify_ring(&path_to_contour(c), EPSILON_2D))
            .filter(|h| is_valid_contour(h))
            .map(|h| ensure_cw(&h))
            .collect();

        profiles.push(Profile2D {
            outer: ensure_ccw(&outer),
            holes,
        });
    }

    profiles
}
