// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring and segment predicates
//!
//! Plain-slice helpers used by the extractor (validity), the room detector
//! (noding) and the boolean layer (winding normalisation).

use nalgebra::Point2;

/// Epsilon for floating point comparisons in 2D predicates
pub const EPSILON_2D: f64 = 1e-9;

/// Compute the signed area of a ring
/// Positive = counter-clockwise, Negative = clockwise
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }

    area * 0.5
}

/// Ensure ring has counter-clockwise winding (positive area)
pub fn ensure_ccw(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(ring) < 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Ensure ring has clockwise winding (for holes)
pub fn ensure_cw(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(ring) > 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Total length of an open polyline
pub fn polyline_length(points: &[Point2<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Collapse consecutive duplicate vertices and drop an explicit closing vertex.
pub fn normalize_ring(points: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    let mut ring = dedup_consecutive(points, tolerance);
    while ring.len() > 1 {
        let (first, last) = (ring[0], ring[ring.len() - 1]);
        if (last - first).norm() <= tolerance {
            ring.pop();
        } else {
            break;
        }
    }
    ring
}

/// Collapse consecutive duplicate vertices of a polyline
pub fn dedup_consecutive(points: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        match out.last() {
            Some(last) if (p - last).norm() <= tolerance => {}
            _ => out.push(*p),
        }
    }
    out
}

/// Remove vertices that are collinear with their neighbours
pub fn simplify_ring(ring: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    if ring.len() <= 3 {
        return ring.to_vec();
    }

    let mut result: Vec<Point2<f64>> = ring.to_vec();
    // Removing one vertex can make its neighbour collinear, so iterate to a fixpoint
    loop {
        let n = result.len();
        if n <= 3 {
            break;
        }
        let mut kept = Vec::with_capacity(n);
        for i in 0..n {
            let prev = &result[(i + n - 1) % n];
            let curr = &result[i];
            let next = &result[(i + 1) % n];
            let cross =
                (curr.x - prev.x) * (next.y - prev.y) - (curr.y - prev.y) * (next.x - prev.x);
            if cross.abs() > epsilon {
                kept.push(*curr);
            }
        }
        if kept.len() < 3 || kept.len() == n {
            if kept.len() >= 3 {
                result = kept;
            }
            break;
        }
        result = kept;
    }

    result
}

/// Check if a point is inside a ring using ray casting
pub fn point_in_ring(point: &Point2<f64>, ring: &[Point2<f64>]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = ring.len();

    let mut j = n - 1;
    for i in 0..n {
        let pi = &ring[i];
        let pj = &ring[j];

        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Distance from a point to a segment
pub fn point_segment_distance(point: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let (_, proj) = project_onto_segment(point, a, b);
    (point - proj).norm()
}

/// Project a point onto a segment; returns the clamped parameter and the projected point
pub fn project_onto_segment(
    point: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> (f64, Point2<f64>) {
    let ab = b - a;
    let length_sq = ab.norm_squared();
    if length_sq < EPSILON_2D * EPSILON_2D {
        return (0.0, *a);
    }
    let t = ((point - a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    (t, a + ab * t)
}

/// Distance from a point to the closest edge of a closed ring
pub fn point_ring_distance(point: &Point2<f64>, ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| point_segment_distance(point, &ring[i], &ring[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Proper intersection of two segments.
///
/// Returns the parameters `(t, u)` along `a0→a1` and `b0→b1` when the segments
/// cross or touch; parallel (including collinear) segments return `None`.
pub fn segment_intersection(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> Option<(f64, f64)> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < EPSILON_2D * r.norm().max(1.0) * s.norm().max(1.0) {
        return None;
    }
    let qp = b0 - a0;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;
    let within = -EPSILON_2D..=1.0 + EPSILON_2D;
    if within.contains(&t) && within.contains(&u) {
        Some((t.clamp(0.0, 1.0), u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Whether two segments overlap along a common line
fn collinear_overlap(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> bool {
    let r = a1 - a0;
    let len = r.norm();
    if len < EPSILON_2D {
        return false;
    }
    let cross = |p: &Point2<f64>| (r.x * (p.y - a0.y) - r.y * (p.x - a0.x)) / len;
    if cross(b0).abs() > EPSILON_2D || cross(b1).abs() > EPSILON_2D {
        return false;
    }
    let proj = |p: &Point2<f64>| (p - a0).dot(&r) / (len * len);
    let (t0, t1) = (proj(b0), proj(b1));
    let (lo, hi) = (t0.min(t1), t0.max(t1));
    hi > EPSILON_2D && lo < 1.0 - EPSILON_2D
}

/// Check that a closed ring is simple: at least three distinct vertices, non-zero
/// area, and no two non-adjacent edges touching or crossing.
pub fn is_simple_ring(ring: &[Point2<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    if signed_area(ring).abs() <= EPSILON_2D {
        return false;
    }

    for i in 0..n {
        let (a0, a1) = (&ring[i], &ring[(i + 1) % n]);
        if (a1 - a0).norm() <= EPSILON_2D {
            return false;
        }
        for j in (i + 1)..n {
            let (b0, b1) = (&ring[j], &ring[(j + 1) % n]);
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                // Neighbouring edges share a vertex; they must not fold back onto each other
                if collinear_overlap(a0, a1, b0, b1) {
                    return false;
                }
                continue;
            }
            if segment_intersection(a0, a1, b0, b1).is_some() || collinear_overlap(a0, a1, b0, b1)
            {
                return false;
            }
        }
    }

    true
}

/// Compute bounding box of a ring
pub fn ring_bounds(ring: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    let first = ring.first()?;
    let mut min = *first;
    let mut max = *first;

    for p in ring.iter().skip(1) {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }

    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = square(1.0);
        assert!((signed_area(&ccw) - 1.0).abs() < EPSILON_2D);

        let cw: Vec<_> = ccw.iter().rev().cloned().collect();
        assert!((signed_area(&cw) + 1.0).abs() < EPSILON_2D);
        assert!(signed_area(&ensure_ccw(&cw)) > 0.0);
        assert!(signed_area(&ensure_cw(&ccw)) < 0.0);
    }

    #[test]
    fn test_simple_ring_accepts_square() {
        assert!(is_simple_ring(&square(2.0)));
    }

    #[test]
    fn test_bowtie_is_not_simple() {
        let bowtie = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(!is_simple_ring(&bowtie));
    }

    #[test]
    fn test_collinear_ring_is_not_simple() {
        let flat = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(!is_simple_ring(&flat));
    }

    #[test]
    fn test_normalize_ring_drops_closing_vertex() {
        let mut ring = square(1.0);
        ring.push(Point2::new(0.0, 0.0));
        ring.insert(1, Point2::new(0.0, 0.0));
        let normalized = normalize_ring(&ring, 1e-9);
        assert_eq!(normalized.len(), 4);
    }

    #[test]
    fn test_simplify_ring_removes_collinear() {
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(0.0, 5.0),
        ];
        assert_eq!(simplify_ring(&ring, 1e-6).len(), 4);
    }

    #[test]
    fn test_segment_intersection() {
        let hit = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 0.0),
            &Point2::new(1.0, -1.0),
            &Point2::new(1.0, 1.0),
        )
        .unwrap();
        assert!((hit.0 - 0.5).abs() < 1e-12);
        assert!((hit.1 - 0.5).abs() < 1e-12);

        assert!(segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Point2::new(2.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_point_in_ring_and_distance() {
        let ring = square(10.0);
        assert!(point_in_ring(&Point2::new(5.0, 5.0), &ring));
        assert!(!point_in_ring(&Point2::new(15.0, 5.0), &ring));
        assert!((point_ring_distance(&Point2::new(5.0, 3.0), &ring) - 3.0).abs() < 1e-12);
    }
}
