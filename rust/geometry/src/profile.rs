// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D footprint profiles and their triangulation

use crate::error::{Error, Result};
use crate::polygon::{point_in_ring, signed_area};
use nalgebra::Point2;

/// 2D profile with optional holes
///
/// This is the footprint representation shared by every stage: wall shell
/// pieces, floor slabs, rooms and opening panels are all `Profile2D`s before
/// they are extruded.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile2D {
    /// Outer boundary (counter-clockwise)
    pub outer: Vec<Point2<f64>>,
    /// Holes (clockwise)
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Profile2D {
    /// Create a new profile
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Create a profile with holes
    pub fn with_holes(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self { outer, holes }
    }

    /// Add a hole to the profile
    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        self.holes.push(hole);
    }

    /// Net area: outer area minus the area of all holes
    pub fn area(&self) -> f64 {
        let outer = signed_area(&self.outer).abs();
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        (outer - holes).max(0.0)
    }

    /// Whether a point lies inside the outer boundary and outside every hole
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        point_in_ring(point, &self.outer) && !self.holes.iter().any(|h| point_in_ring(point, h))
    }

    /// Triangulate the profile using earcutr
    /// Returns triangle indices into the flattened vertex array
    pub fn triangulate(&self) -> Result<Triangulation> {
        if self.outer.len() < 3 {
            return Err(Error::InvalidProfile(
                "Profile must have at least 3 vertices".to_string(),
            ));
        }

        // Flatten vertices for earcutr
        let mut vertices = Vec::with_capacity(
            (self.outer.len() + self.holes.iter().map(|h| h.len()).sum::<usize>()) * 2,
        );

        for p in &self.outer {
            vertices.push(p.x);
            vertices.push(p.y);
        }

        let mut hole_indices = Vec::with_capacity(self.holes.len());
        for hole in self.holes.iter().filter(|h| h.len() >= 3) {
            hole_indices.push(vertices.len() / 2);
            for p in hole {
                vertices.push(p.x);
                vertices.push(p.y);
            }
        }

        let indices = earcutr::earcut(&vertices, &hole_indices, 2)
            .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

        if indices.is_empty() {
            return Err(Error::TriangulationError(
                "earcut produced no triangles".to_string(),
            ));
        }

        let points = vertices
            .chunks_exact(2)
            .map(|c| Point2::new(c[0], c[1]))
            .collect();

        Ok(Triangulation { points, indices })
    }

    /// A point guaranteed to be inside the profile (when it has area).
    ///
    /// Uses the centroid when it falls inside, otherwise the centroid of the
    /// largest triangle of the triangulation, which handles concave L/U shapes.
    pub fn interior_point(&self) -> Option<Point2<f64>> {
        if self.outer.len() < 3 {
            return None;
        }
        let n = self.outer.len() as f64;
        let centroid = Point2::new(
            self.outer.iter().map(|p| p.x).sum::<f64>() / n,
            self.outer.iter().map(|p| p.y).sum::<f64>() / n,
        );
        if self.contains(&centroid) {
            return Some(centroid);
        }

        let tri = self.triangulate().ok()?;
        tri.indices
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (tri.points[t[0]], tri.points[t[1]], tri.points[t[2]]);
                let area = ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs();
                let center = Point2::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
                (area, center)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, center)| center)
    }
}

/// Triangulated profile result
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// All vertices (outer + holes)
    pub points: Vec<Point2<f64>>,
    /// Triangle indices
    pub indices: Vec<usize>,
}

/// Create an axis-aligned rectangular profile centred on the origin
#[inline]
pub fn create_rectangle(width: f64, height: f64) -> Profile2D {
    let half_w = width / 2.0;
    let half_h = height / 2.0;

    Profile2D::new(vec![
        Point2::new(-half_w, -half_h),
        Point2::new(half_w, -half_h),
        Point2::new(half_w, half_h),
        Point2::new(-half_w, half_h),
    ])
}
