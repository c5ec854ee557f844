// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrusion operations - converting 2D footprints to closed 3D solids

use crate::error::{Error, Result};
use crate::mesh::{CoordinateShift, Mesh};
use crate::polygon::{ensure_ccw, ensure_cw};
use crate::profile::{Profile2D, Triangulation};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

/// Extrude a footprint vertically from `base_z` to `base_z + height`.
///
/// The solid is closed: a bottom cap facing down, a top cap facing up, and
/// one quad per boundary edge of the outer ring and of every hole. `shift` is
/// subtracted from each vertex in f64 before it is stored.
pub fn extrude_profile(
    profile: &Profile2D,
    base_z: f64,
    height: f64,
    shift: &CoordinateShift,
) -> Result<Mesh> {
    if !(height > 0.0) || !height.is_finite() {
        return Err(Error::InvalidExtrusion(format!(
            "height must be positive, got {height}"
        )));
    }
    if !base_z.is_finite() {
        return Err(Error::InvalidExtrusion("base elevation is not finite".to_string()));
    }

    let outer = ensure_ccw(&profile.outer);
    let holes: Vec<_> = profile.holes.iter().map(|h| ensure_cw(h)).collect();
    let oriented = Profile2D::with_holes(outer, holes);

    let triangulation = oriented.triangulate()?;

    let boundary_len =
        oriented.outer.len() + oriented.holes.iter().map(Vec::len).sum::<usize>();
    let mut mesh = Mesh::with_capacity(
        triangulation.points.len() * 2 + boundary_len * 4,
        triangulation.indices.len() * 2 + boundary_len * 6,
    );

    let top_z = base_z + height;
    create_cap_mesh(&triangulation, base_z, false, shift, &mut mesh);
    create_cap_mesh(&triangulation, top_z, true, shift, &mut mesh);

    create_side_walls(&oriented.outer, base_z, top_z, shift, &mut mesh);
    for hole in &oriented.holes {
        create_side_walls(hole, base_z, top_z, shift, &mut mesh);
    }

    Ok(mesh)
}

/// Create a cap mesh (top or bottom) from triangulation
fn create_cap_mesh(
    triangulation: &Triangulation,
    z: f64,
    facing_up: bool,
    shift: &CoordinateShift,
    mesh: &mut Mesh,
) {
    let base_index = mesh.vertex_count() as u32;
    let normal = if facing_up {
        Vector3::z()
    } else {
        -Vector3::z()
    };

    for point in &triangulation.points {
        mesh.add_vertex_with_shift(Point3::new(point.x, point.y, z), normal, shift);
    }

    for tri in triangulation.indices.chunks_exact(3) {
        let (a, b, c) = (
            triangulation.points[tri[0]],
            triangulation.points[tri[1]],
            triangulation.points[tri[2]],
        );
        // Counter-clockwise in plan view faces up
        let ccw = orient(&a, &b, &c) > 0.0;
        let (i0, i1, i2) = (
            base_index + tri[0] as u32,
            base_index + tri[1] as u32,
            base_index + tri[2] as u32,
        );
        if ccw == facing_up {
            mesh.add_triangle(i0, i1, i2);
        } else {
            mesh.add_triangle(i0, i2, i1);
        }
    }
}

#[inline]
fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Create side walls for a ring. Outer rings must be counter-clockwise and
/// holes clockwise so the quads face away from the solid.
fn create_side_walls(
    boundary: &[Point2<f64>],
    z_bottom: f64,
    z_top: f64,
    shift: &CoordinateShift,
    mesh: &mut Mesh,
) {
    for i in 0..boundary.len() {
        let p0 = &boundary[i];
        let p1 = &boundary[(i + 1) % boundary.len()];

        let edge = Vector3::new(p1.x - p0.x, p1.y - p0.y, 0.0);
        // Skip duplicate consecutive points
        let Some(normal) = Vector3::new(edge.y, -edge.x, 0.0).try_normalize(1e-10) else {
            continue;
        };

        let idx = mesh.vertex_count() as u32;
        mesh.add_vertex_with_shift(Point3::new(p0.x, p0.y, z_bottom), normal, shift);
        mesh.add_vertex_with_shift(Point3::new(p1.x, p1.y, z_bottom), normal, shift);
        mesh.add_vertex_with_shift(Point3::new(p1.x, p1.y, z_top), normal, shift);
        mesh.add_vertex_with_shift(Point3::new(p0.x, p0.y, z_top), normal, shift);

        mesh.add_triangle(idx, idx + 1, idx + 2);
        mesh.add_triangle(idx, idx + 2, idx + 3);
    }
}

/// Apply transformation matrix to mesh
pub fn apply_transform(mesh: &mut Mesh, transform: &Matrix4<f64>) {
    mesh.positions.chunks_exact_mut(3).for_each(|chunk| {
        let point = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
        let transformed = transform.transform_point(&point);
        chunk[0] = transformed.x as f32;
        chunk[1] = transformed.y as f32;
        chunk[2] = transformed.z as f32;
    });

    // Normals use the inverse transpose
    let normal_matrix = transform.try_inverse().unwrap_or(*transform).transpose();

    mesh.normals.chunks_exact_mut(3).for_each(|chunk| {
        let normal = Vector3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
        let transformed = (normal_matrix * normal.to_homogeneous())
            .xyz()
            .try_normalize(1e-12)
            .unwrap_or(normal);
        chunk[0] = transformed.x as f32;
        chunk[1] = transformed.y as f32;
        chunk[2] = transformed.z as f32;
    });
}
