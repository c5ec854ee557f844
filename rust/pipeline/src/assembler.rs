// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh assembly: footprints to one classified, re-centred model

use crate::config::PipelineConfig;
use crate::error::{Error, Result, Stage};
use crate::material::{MaterialLabel, MaterialLibrary, RenderMaterial};
use crate::types::{
    ElementKind, FloorPolygon, Opening, OpeningKind, RoomKind, RoomPolygon, WallSegment,
};
use crate::wall_network::WallShell;
use nalgebra::{Point3, Vector3};
use plan3d_geometry::polygon::ring_bounds;
use plan3d_geometry::{
    buffer_polyline, extrude_profile, CoordinateShift, Error as GeometryError, Mesh, Profile2D,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;

/// Metadata for one extruded solid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolidInfo {
    pub kind: ElementKind,
    pub label: MaterialLabel,
    pub base_z: f64,
    pub height: f64,
    /// Index into [`BuildingModel::surfaces`]
    pub surface: usize,
    pub triangles: usize,
}

/// All geometry sharing one render material
#[derive(Debug, Clone)]
pub struct Surface {
    pub material: Arc<RenderMaterial>,
    pub mesh: Mesh,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    /// Distinct (height, material) wall groups
    pub wall_groups: usize,
    pub solids: usize,
    /// Solids whose extrusion failed and were left out
    pub failed: usize,
    pub triangles: usize,
}

/// The merged output model
#[derive(Debug, Clone)]
pub struct BuildingModel {
    /// One surface per material, in order of first use
    pub surfaces: Vec<Surface>,
    pub solids: Vec<SolidInfo>,
    /// Drawing-space position of the model origin
    pub shift: CoordinateShift,
    pub report: AssemblyReport,
}

impl BuildingModel {
    /// Every surface merged into a single mesh
    pub fn combined_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for surface in &self.surfaces {
            mesh.merge(&surface.mesh);
        }
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.mesh.triangle_count()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.mesh.vertex_count()).sum()
    }

    pub fn solids_of(&self, kind: ElementKind) -> impl Iterator<Item = &SolidInfo> {
        self.solids.iter().filter(move |s| s.kind == kind)
    }
}

/// Everything the assembler extrudes
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub shell: &'a WallShell,
    /// Walls in shell order
    pub walls: &'a [WallSegment],
    /// One label per wall, same order
    pub wall_materials: &'a [MaterialLabel],
    pub floor: Option<&'a FloorPolygon>,
    pub rooms: &'a [RoomPolygon],
    /// Doors and windows with their labels
    pub openings: &'a [(Opening, MaterialLabel)],
}

/// Builds a [`BuildingModel`] from classified footprints
#[derive(Debug, Clone, Copy)]
pub struct MeshAssembler<'a> {
    config: &'a PipelineConfig,
    library: &'a MaterialLibrary,
}

impl<'a> MeshAssembler<'a> {
    pub fn new(config: &'a PipelineConfig, library: &'a MaterialLibrary) -> Self {
        Self { config, library }
    }

    pub fn assemble(&self, input: &AssemblyInput<'_>) -> Result<BuildingModel> {
        let z0 = self.config.z_offset;
        let shift = coarse_origin(input.shell, z0);
        let mut builder = ModelBuilder::new(self.library, shift);

        // Walls: one region per (height, material) so merged joints are never doubled
        let groups = wall_groups(input, |w| self.config.heights.resolve(&w.layer));
        let indices: Vec<Vec<usize>> = groups.iter().map(|g| g.walls.clone()).collect();
        let regions = input.shell.partition(&indices);
        for (group, region) in groups.iter().zip(&regions) {
            for profile in region {
                builder.add(ElementKind::Wall, group.label, profile, z0, group.height)?;
            }
        }
        builder.report.wall_groups = groups.len();
        // A wall footprint exists, so losing every wall solid is fatal
        if !groups.is_empty() && builder.solids.is_empty() {
            let source = builder.last_error.take().unwrap_or_else(|| {
                GeometryError::DegenerateGeometry("no wall region could be extruded".to_string())
            });
            return Err(Error::geometry(Stage::Assembly)(source));
        }

        let slab = &self.config.slab;
        if let Some(floor) = input.floor {
            builder.add(
                ElementKind::Floor,
                MaterialLabel::Concrete,
                &floor.to_profile(),
                z0 + slab.offset,
                slab.thickness,
            )?;
        }
        for room in input.rooms {
            builder.add(
                ElementKind::Room,
                room_finish(room.kind),
                &room.profile,
                z0 + 2.0 * slab.offset,
                slab.thickness,
            )?;
        }

        if builder.solids.is_empty() {
            return Err(Error::EmptyModel);
        }

        let openings = &self.config.openings;
        for (opening, label) in input.openings {
            let (base, height) = match opening.kind {
                OpeningKind::Door => (openings.door_base, openings.door_height),
                OpeningKind::Window => (openings.window_base, openings.window_height),
            };
            let half = openings.panel_thickness / 2.0;
            let panel = match buffer_polyline(opening.segment.points(), half) {
                Ok(panel) => panel,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        layer = %opening.segment.layer,
                        "opening panel skipped"
                    );
                    builder.report.failed += 1;
                    continue;
                }
            };
            for profile in &panel {
                builder.add(opening.kind.into(), *label, profile, z0 + base, height)?;
            }
        }

        Ok(builder.finish())
    }
}

/// Finish material for a room slab
fn room_finish(kind: RoomKind) -> MaterialLabel {
    if kind.is_wet() {
        MaterialLabel::Tile
    } else {
        MaterialLabel::Marble
    }
}

struct WallGroup {
    height: f64,
    label: MaterialLabel,
    walls: Vec<usize>,
}

/// Walls grouped by resolved height and material, in order of first appearance
fn wall_groups(
    input: &AssemblyInput<'_>,
    height_of: impl Fn(&WallSegment) -> f64,
) -> Vec<WallGroup> {
    let mut groups: Vec<WallGroup> = Vec::new();
    let mut lookup: FxHashMap<(u64, MaterialLabel), usize> = FxHashMap::default();

    for (i, wall) in input.walls.iter().enumerate() {
        let height = height_of(wall);
        let label = input.wall_materials.get(i).copied().unwrap_or_default();
        let slot = *lookup.entry((height.to_bits(), label)).or_insert_with(|| {
            groups.push(WallGroup {
                height,
                label,
                walls: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].walls.push(i);
    }
    groups
}

/// Centre of the merged wall shell's bounding box, at storey elevation
fn coarse_origin(shell: &WallShell, z: f64) -> CoordinateShift {
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for profile in &shell.merged {
        if let Some((lo, hi)) = ring_bounds(&profile.outer) {
            min = (min.0.min(lo.x), min.1.min(lo.y));
            max = (max.0.max(hi.x), max.1.max(hi.y));
        }
    }
    if !min.0.is_finite() || !max.0.is_finite() {
        return CoordinateShift::new(0.0, 0.0, z);
    }
    CoordinateShift::new((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0, z)
}

struct ModelBuilder<'a> {
    library: &'a MaterialLibrary,
    shift: CoordinateShift,
    surfaces: Vec<Surface>,
    by_label: FxHashMap<MaterialLabel, usize>,
    solids: Vec<SolidInfo>,
    report: AssemblyReport,
    /// Most recent extrusion failure
    last_error: Option<GeometryError>,
}

impl<'a> ModelBuilder<'a> {
    fn new(library: &'a MaterialLibrary, shift: CoordinateShift) -> Self {
        Self {
            library,
            shift,
            surfaces: Vec::new(),
            by_label: FxHashMap::default(),
            solids: Vec::new(),
            report: AssemblyReport::default(),
            last_error: None,
        }
    }

    /// Extrude one footprint into the surface for `label`.
    ///
    /// A footprint that cannot be extruded is skipped and counted; only a
    /// material that cannot be loaded is an error.
    fn add(
        &mut self,
        kind: ElementKind,
        label: MaterialLabel,
        profile: &Profile2D,
        base_z: f64,
        height: f64,
    ) -> Result<()> {
        let mesh = match extrude_profile(profile, base_z, height, &self.shift) {
            Ok(mesh) if !mesh.is_empty() => mesh,
            Ok(_) => {
                self.report.failed += 1;
                self.last_error = Some(GeometryError::DegenerateGeometry(format!(
                    "{kind} extrusion produced no triangles"
                )));
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(%kind, error = %e, "solid skipped");
                self.report.failed += 1;
                self.last_error = Some(e);
                return Ok(());
            }
        };

        let surface = match self.by_label.get(&label) {
            Some(&i) => i,
            None => {
                self.surfaces.push(Surface {
                    material: self.library.get(label)?,
                    mesh: Mesh::new(),
                });
                self.by_label.insert(label, self.surfaces.len() - 1);
                self.surfaces.len() - 1
            }
        };

        let triangles = mesh.triangle_count();
        self.surfaces[surface].mesh.merge(&mesh);
        self.solids.push(SolidInfo {
            kind,
            label,
            base_z,
            height,
            surface,
            triangles,
        });
        Ok(())
    }

    /// Re-centre on the vertex centroid; translation only
    fn finish(mut self) -> BuildingModel {
        let mut sum = Vector3::<f64>::zeros();
        let mut count = 0usize;
        for surface in &self.surfaces {
            let c = surface.mesh.centroid_f64();
            let n = surface.mesh.vertex_count();
            sum += c.coords * n as f64;
            count += n;
        }
        let fine = if count > 0 {
            CoordinateShift::from_point(Point3::from(sum / count as f64))
        } else {
            CoordinateShift::default()
        };
        for surface in &mut self.surfaces {
            surface.mesh.apply_shift(&fine);
        }

        self.report.solids = self.solids.len();
        self.report.triangles = self.surfaces.iter().map(|s| s.mesh.triangle_count()).sum();

        BuildingModel {
            surfaces: self.surfaces,
            solids: self.solids,
            shift: self.shift + fine,
            report: self.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomSource;
    use crate::wall_network::build_wall_shell;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn wall(points: &[(f64, f64)], layer: &str) -> WallSegment {
        WallSegment::new(
            points.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
            layer,
        )
        .unwrap()
    }

    /// 10 x 6 box placed far from the origin
    fn box_walls(ox: f64, oy: f64) -> Vec<WallSegment> {
        let p = |x: f64, y: f64| (ox + x, oy + y);
        vec![
            wall(&[p(0.0, 0.0), p(10.0, 0.0)], "A-WALL"),
            wall(&[p(10.0, 0.0), p(10.0, 6.0)], "A-WALL"),
            wall(&[p(10.0, 6.0), p(0.0, 6.0)], "A-WALL-HALF"),
            wall(&[p(0.0, 6.0), p(0.0, 0.0)], "A-WALL"),
        ]
    }

    fn assemble(
        walls: &[WallSegment],
        labels: &[MaterialLabel],
        rooms: &[RoomPolygon],
        openings: &[(Opening, MaterialLabel)],
    ) -> Result<BuildingModel> {
        let config = PipelineConfig::default();
        let library = MaterialLibrary::untextured(config.materials.clone());
        let shell = build_wall_shell(walls, &[], 0.25)?;
        let input = AssemblyInput {
            shell: &shell,
            walls,
            wall_materials: labels,
            floor: None,
            rooms,
            openings,
        };
        MeshAssembler::new(&config, &library).assemble(&input)
    }

    #[test]
    fn test_surfaces_per_material() {
        let walls = box_walls(0.0, 0.0);
        let labels = [
            MaterialLabel::Concrete,
            MaterialLabel::Concrete,
            MaterialLabel::Concrete,
            MaterialLabel::Gypsum,
        ];
        let model = assemble(&walls, &labels, &[], &[]).unwrap();

        assert_eq!(model.surfaces.len(), 2);
        assert_eq!(model.surfaces[0].material.label, MaterialLabel::Concrete);
        assert_eq!(model.surfaces[1].material.label, MaterialLabel::Gypsum);
        // Full-height concrete, half-height concrete, gypsum
        assert_eq!(model.report.wall_groups, 3);
        assert!(model.solids_of(ElementKind::Wall).any(|s| s.height == 1.2));
        assert!(model.surfaces.iter().all(|s| s.mesh.indices_in_range()));
        assert_eq!(model.triangle_count(), model.report.triangles);
    }

    #[test]
    fn test_wall_volume_matches_footprint() {
        let walls = box_walls(0.0, 0.0);
        let labels = [MaterialLabel::Concrete; 4];
        let model = assemble(&walls, &labels, &[], &[]).unwrap();

        let volume: f64 = model
            .surfaces
            .iter()
            .map(|s| s.mesh.signed_volume())
            .sum();
        // Ring footprint: 10.25 x 6.25 minus 9.75 x 5.75, top wall at half height
        let ring = 10.25 * 6.25 - 9.75 * 5.75;
        // The full-height group claims both top corners first
        let top = 9.75 * 0.25;
        let expected = (ring - top) * 4.0 + top * 1.2;
        assert_relative_eq!(volume, expected, epsilon = 1e-2);
    }

    #[test]
    fn test_recentred_far_from_origin() {
        let walls = box_walls(500_000.0, 4_200_000.0);
        let labels = [MaterialLabel::Concrete; 4];
        let model = assemble(&walls, &labels, &[], &[]).unwrap();

        let mesh = model.combined_mesh();
        let c = mesh.centroid_f64();
        assert!(c.x.abs() < 1e-3 && c.y.abs() < 1e-3 && c.z.abs() < 1e-3);

        // No rescaling: extents are the true wall dimensions
        let (min, max) = mesh.bounds();
        assert_relative_eq!(max.x - min.x, 10.25, epsilon = 1e-3);
        assert_relative_eq!(max.y - min.y, 6.25, epsilon = 1e-3);
        assert_relative_eq!(max.z - min.z, 4.0, epsilon = 1e-4);
        assert!((model.shift.x - 500_005.0).abs() < 0.5);
    }

    #[test]
    fn test_rooms_and_openings() {
        let walls = box_walls(0.0, 0.0);
        let labels = [MaterialLabel::Concrete; 4];
        let rooms = vec![RoomPolygon {
            profile: Profile2D::new(vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 6.0),
                Point2::new(0.0, 6.0),
            ]),
            area: 60.0,
            kind: RoomKind::Bathroom,
            source: RoomSource::Inferred,
        }];
        let window = Opening {
            kind: OpeningKind::Window,
            segment: wall(&[(3.0, 0.0), (5.0, 0.0)], "A-WIN"),
        };
        let openings = [(window, MaterialLabel::Glass)];
        let model = assemble(&walls, &labels, &rooms, &openings).unwrap();

        let room = model.solids_of(ElementKind::Room).next().unwrap();
        assert_eq!(room.label, MaterialLabel::Tile);
        assert_relative_eq!(room.base_z, 0.002);

        let window = model.solids_of(ElementKind::Window).next().unwrap();
        assert_eq!(window.base_z, 1.0);
        assert_eq!(window.height, 1.2);
        let surface = &model.surfaces[window.surface];
        assert_eq!(surface.material.label, MaterialLabel::Glass);
    }

    #[test]
    fn test_losing_every_wall_solid_is_fatal() {
        let mut config = PipelineConfig::default();
        config.heights.default = 0.0;
        config.heights.rules.clear();
        let library = MaterialLibrary::untextured(config.materials.clone());
        let walls = box_walls(0.0, 0.0);
        let shell = build_wall_shell(&walls, &[], 0.25).unwrap();
        let input = AssemblyInput {
            shell: &shell,
            walls: &walls,
            wall_materials: &[MaterialLabel::Concrete; 4],
            floor: None,
            rooms: &[],
            openings: &[],
        };
        let err = MeshAssembler::new(&config, &library)
            .assemble(&input)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Geometry {
                stage: Stage::Assembly,
                source: GeometryError::InvalidExtrusion(_)
            }
        ));
    }

    #[test]
    fn test_empty_model_is_fatal() {
        let config = PipelineConfig::default();
        let library = MaterialLibrary::untextured(config.materials.clone());
        let walls = box_walls(0.0, 0.0);
        let shell = build_wall_shell(&walls, &[], 0.25).unwrap();
        // No walls handed to the assembler, no floor, no rooms
        let input = AssemblyInput {
            shell: &shell,
            walls: &[],
            wall_materials: &[],
            floor: None,
            rooms: &[],
            openings: &[],
        };
        let err = MeshAssembler::new(&config, &library)
            .assemble(&input)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyModel));
    }
}
