// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Centreline buffering with squared end caps
//!
//! A centreline is grown sideways by `half_width` and lengthwise by the same
//! amount at both free ends, so two walls meeting at a right angle overlap
//! exactly in a `width × width` corner square and union into a flush corner.
//! Vertices inside one polyline are mitred instead, which keeps the outline of
//! a densely sampled curve smooth.

use crate::bool2d::union_contours;
use crate::error::{Error, Result};
use crate::polygon::{dedup_consecutive, EPSILON_2D};
use crate::profile::Profile2D;
use nalgebra::{Point2, Vector2};

/// Mitres longer than this many half widths fall back to square caps
const MITRE_LIMIT: f64 = 4.0;

fn check_half_width(half_width: f64) -> Result<()> {
    if !(half_width > 0.0) || !half_width.is_finite() {
        return Err(Error::DegenerateGeometry(format!(
            "buffer distance must be positive, got {half_width}"
        )));
    }
    Ok(())
}

/// Unit normal pointing left of the travel direction
fn left_normal(dir: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-dir.y, dir.x)
}

/// Buffer a single segment into a counter-clockwise rectangle with square caps
pub fn buffer_segment(
    start: &Point2<f64>,
    end: &Point2<f64>,
    half_width: f64,
) -> Result<Vec<Point2<f64>>> {
    check_half_width(half_width)?;

    let delta = end - start;
    let length = delta.norm();
    if length < EPSILON_2D {
        return Err(Error::DegenerateGeometry(
            "cannot buffer a zero-length segment".to_string(),
        ));
    }

    let dir: Vector2<f64> = delta / length * half_width;
    let perp = left_normal(&dir);

    let a = start - dir;
    let b = end + dir;

    Ok(vec![a - perp, b - perp, b + perp, a + perp])
}

/// Buffer every non-degenerate segment of a polyline.
///
/// Returns one quad per segment; callers union them together with the rest
/// of the network so that joints are merged in a single boolean pass.
/// Neighbouring quads share a mitre edge at interior vertices and get square
/// caps at the free ends. A closed polyline (last point on the first) is
/// mitred at its closing vertex too. A joint that is too sharp, or whose
/// mitre would reach past half of either segment, gets square caps instead.
pub fn buffer_polyline_segments(
    points: &[Point2<f64>],
    half_width: f64,
) -> Result<Vec<Vec<Point2<f64>>>> {
    check_half_width(half_width)?;

    let points = dedup_consecutive(points, EPSILON_2D);
    if points.len() < 2 {
        return Err(Error::DegenerateGeometry(format!(
            "polyline with {} distinct points has no segment to buffer",
            points.len()
        )));
    }

    let lengths: Vec<f64> = points.windows(2).map(|w| (w[1] - w[0]).norm()).collect();
    let dirs: Vec<Vector2<f64>> = points
        .windows(2)
        .zip(&lengths)
        .map(|(w, len)| (w[1] - w[0]) / *len)
        .collect();
    let n = dirs.len();
    let closed = n > 2 && (points[n] - points[0]).norm() <= EPSILON_2D;

    // Left-side offset of the joint between segments `prev` and `next`
    let mitre = |prev: usize, next: usize| -> Option<Vector2<f64>> {
        let n0 = left_normal(&dirs[prev]);
        let sum = n0 + left_normal(&dirs[next]);
        let norm = sum.norm();
        if norm < EPSILON_2D {
            return None;
        }
        let bisector = sum / norm;
        let cos = bisector.dot(&n0);
        if cos * MITRE_LIMIT < 1.0 {
            return None;
        }
        let offset = bisector * (half_width / cos);
        let along = offset.dot(&dirs[prev]).abs();
        if along > lengths[prev] / 2.0 || along > lengths[next] / 2.0 {
            return None;
        }
        Some(offset)
    };

    let joints: Vec<Option<Vector2<f64>>> = (0..=n)
        .map(|k| {
            if k > 0 && k < n {
                mitre(k - 1, k)
            } else if closed {
                mitre(n - 1, 0)
            } else {
                None
            }
        })
        .collect();

    let quads = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[i + 1]);
            let dir = dirs[i] * half_width;
            let perp = left_normal(&dir);

            let (start_left, start_right) = match joints[i] {
                Some(m) => (a + m, a - m),
                None => (a - dir + perp, a - dir - perp),
            };
            let (end_left, end_right) = match joints[i + 1] {
                Some(m) => (b + m, b - m),
                None => (b + dir + perp, b + dir - perp),
            };
            vec![start_right, end_right, end_left, start_left]
        })
        .collect();

    Ok(quads)
}

/// Buffer a polyline into its merged footprint
pub fn buffer_polyline(points: &[Point2<f64>], half_width: f64) -> Result<Vec<Profile2D>> {
    let rects = buffer_polyline_segments(points, half_width)?;
    Ok(union_contours(&rects))
}
