//! plan3d Geometry Processing
//!
//! Planar geometry kernel for floor plan reconstruction: square-cap buffering of
//! centrelines, i_overlay-backed 2D booleans, planar polygonization, earcutr
//! triangulation and nalgebra-based extrusion into triangle meshes.

pub mod bool2d;
pub mod buffer;
pub mod error;
pub mod extrusion;
pub mod mesh;
pub mod polygon;
pub mod polygonize;
pub mod profile;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use bool2d::{difference, intersection, total_area, union, union_contours};
pub use buffer::{buffer_polyline, buffer_polyline_segments, buffer_segment};
pub use error::{Error, Result};
pub use extrusion::{apply_transform, extrude_profile};
pub use mesh::{CoordinateShift, Mesh};
pub use polygonize::{polygonize, Polygonized};
pub use profile::Profile2D;
