// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Point3, Vector3};
use std::ops::Add;

/// Offset subtracted from every coordinate before f32 conversion
///
/// CAD drawings are often placed far from the origin; subtracting a local
/// origin in f64 keeps sub-millimetre detail once positions are stored as f32.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateShift {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CoordinateShift {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn from_point(point: Point3<f64>) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Add for CoordinateShift {
    type Output = CoordinateShift;

    fn add(self, rhs: CoordinateShift) -> CoordinateShift {
        CoordinateShift::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2), counter-clockwise seen from outside
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex with normal
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.add_vertex_with_shift(position, normal, &CoordinateShift::default());
    }

    /// Add a vertex, subtracting `shift` in f64 before narrowing to f32
    #[inline]
    pub fn add_vertex_with_shift(
        &mut self,
        position: Point3<f64>,
        normal: Vector3<f64>,
        shift: &CoordinateShift,
    ) {
        self.positions.push((position.x - shift.x) as f32);
        self.positions.push((position.y - shift.y) as f32);
        self.positions.push((position.z - shift.z) as f32);

        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);
    }

    /// Apply coordinate shift to existing positions in-place
    #[inline]
    pub fn apply_shift(&mut self, shift: &CoordinateShift) {
        if shift.is_zero() {
            return;
        }
        for chunk in self.positions.chunks_exact_mut(3) {
            chunk[0] = (chunk[0] as f64 - shift.x) as f32;
            chunk[1] = (chunk[1] as f64 - shift.y) as f32;
            chunk[2] = (chunk[2] as f64 - shift.z) as f32;
        }
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = self.vertex_count() as u32;

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Axis-aligned bounds (min, max)
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            for axis in 0..3 {
                min[axis] = min[axis].min(chunk[axis]);
                max[axis] = max[axis].max(chunk[axis]);
            }
        });

        (min, max)
    }

    /// Mean of all vertex positions, accumulated in f64
    pub fn centroid_f64(&self) -> Point3<f64> {
        if self.is_empty() {
            return Point3::origin();
        }

        let mut sum = Vector3::new(0.0f64, 0.0, 0.0);
        for chunk in self.positions.chunks_exact(3) {
            sum.x += chunk[0] as f64;
            sum.y += chunk[1] as f64;
            sum.z += chunk[2] as f64;
        }

        Point3::from(sum / self.vertex_count() as f64)
    }

    /// Signed volume of a closed mesh via the divergence theorem.
    ///
    /// Positive when triangles wind counter-clockwise seen from outside.
    pub fn signed_volume(&self) -> f64 {
        let vertex = |i: u32| {
            let i = i as usize * 3;
            Vector3::new(
                self.positions[i] as f64,
                self.positions[i + 1] as f64,
                self.positions[i + 2] as f64,
            )
        };
        self.indices
            .chunks_exact(3)
            .map(|t| vertex(t[0]).dot(&vertex(t[1]).cross(&vertex(t[2]))) / 6.0)
            .sum()
    }

    /// Whether every index refers to an existing vertex
    pub fn indices_in_range(&self) -> bool {
        let count = self.vertex_count() as u32;
        self.indices.iter().all(|&i| i < count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle(z: f64) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::new(0.0, 0.0, z), Vector3::z());
        mesh.add_vertex(Point3::new(1.0, 0.0, z), Vector3::z());
        mesh.add_vertex(Point3::new(0.0, 1.0, z), Vector3::z());
        mesh.add_triangle(0, 1, 2);
        mesh
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = triangle(0.0);
        a.merge(&triangle(1.0));

        assert_eq!(a.vertex_count(), 6);
        assert_eq!(a.triangle_count(), 2);
        assert_eq!(&a.indices[3..], &[3, 4, 5]);
        assert!(a.indices_in_range());
    }

    #[test]
    fn test_merge_empty_is_noop() {
        let mut a = triangle(0.0);
        a.merge(&Mesh::new());
        assert_eq!(a, triangle(0.0));
    }

    #[test]
    fn test_shift_before_narrowing_keeps_precision() {
        // A drawing placed 2.6 km east in millimetre-accurate coordinates
        let shift = CoordinateShift::new(2_679_012.0, 1_247_892.0, 0.0);
        let mut mesh = Mesh::new();
        mesh.add_vertex_with_shift(
            Point3::new(2_679_012.123, 1_247_892.654, 3.0),
            Vector3::z(),
            &shift,
        );

        assert_relative_eq!(mesh.positions[0], 0.123, epsilon = 1e-5);
        assert_relative_eq!(mesh.positions[1], 0.654, epsilon = 1e-5);
        assert_relative_eq!(mesh.positions[2], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_centroid_and_recentre() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0];
        mesh.normals = vec![0.0; 9];

        let centroid = mesh.centroid_f64();
        assert_relative_eq!(centroid.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(centroid.z, 10.0, epsilon = 1e-9);

        mesh.apply_shift(&CoordinateShift::from_point(centroid));
        let recentred = mesh.centroid_f64();
        assert_relative_eq!(recentred.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(recentred.y, 0.0, epsilon = 1e-6);

        let (min, max) = mesh.bounds();
        assert_relative_eq!(min.x, -10.0, epsilon = 1e-6);
        assert_relative_eq!(max.z, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shift_addition() {
        let total = CoordinateShift::new(100.0, 200.0, 0.0) + CoordinateShift::new(1.5, -2.0, 0.5);
        assert_eq!(total, CoordinateShift::new(101.5, 198.0, 0.5));
        assert!(CoordinateShift::default().is_zero());
    }
}
