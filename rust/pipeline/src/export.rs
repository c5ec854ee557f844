// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary glTF 2.0 export
//!
//! One mesh with one primitive per surface. The model is Z-up internally and
//! is rotated to glTF's Y-up on the way out. Textures are embedded in the
//! binary chunk; textured surfaces get box-projected UVs.

use crate::assembler::{BuildingModel, Surface};
use crate::error::{Error, Result, Stage};
use nalgebra::Matrix4;
use plan3d_geometry::{apply_transform, Mesh};
use serde_json::{json, Value};
use std::f64::consts::FRAC_PI_2;
use std::path::Path;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const REPEAT: u32 = 10497;

/// Texture repeats once per this many drawing units
const UV_TILE: f32 = 1.0;

/// Encode a model as a GLB byte buffer
pub fn to_glb(model: &BuildingModel) -> Result<Vec<u8>> {
    let mut bin = BinaryBuffer::default();
    let mut accessors = Vec::new();
    let mut buffer_views = Vec::new();
    let mut materials = Vec::new();
    let mut textures = Vec::new();
    let mut images = Vec::new();
    let mut primitives = Vec::new();

    let z_up_to_y_up = Matrix4::from_euler_angles(-FRAC_PI_2, 0.0, 0.0);

    for surface in model.surfaces.iter().filter(|s| !s.mesh.is_empty()) {
        let textured = surface.material.texture.is_some();
        let uvs = textured.then(|| box_uvs(&surface.mesh));

        let mut mesh = surface.mesh.clone();
        apply_transform(&mut mesh, &z_up_to_y_up);

        let (min, max) = mesh.bounds();
        let position = push_accessor(
            &mut bin,
            &mut buffer_views,
            &mut accessors,
            floats_as_bytes(&mesh.positions),
            ARRAY_BUFFER,
            json!({
                "componentType": FLOAT,
                "count": mesh.vertex_count(),
                "type": "VEC3",
                "min": [min.x, min.y, min.z],
                "max": [max.x, max.y, max.z],
            }),
        );
        let normal = push_accessor(
            &mut bin,
            &mut buffer_views,
            &mut accessors,
            floats_as_bytes(&mesh.normals),
            ARRAY_BUFFER,
            json!({"componentType": FLOAT, "count": mesh.vertex_count(), "type": "VEC3"}),
        );
        let indices = push_accessor(
            &mut bin,
            &mut buffer_views,
            &mut accessors,
            mesh.indices.iter().flat_map(|i| i.to_le_bytes()).collect(),
            ELEMENT_ARRAY_BUFFER,
            json!({"componentType": UNSIGNED_INT, "count": mesh.indices.len(), "type": "SCALAR"}),
        );

        let mut attributes = json!({"POSITION": position, "NORMAL": normal});
        if let Some(uvs) = &uvs {
            let texcoord = push_accessor(
                &mut bin,
                &mut buffer_views,
                &mut accessors,
                floats_as_bytes(uvs),
                ARRAY_BUFFER,
                json!({"componentType": FLOAT, "count": uvs.len() / 2, "type": "VEC2"}),
            );
            attributes["TEXCOORD_0"] = json!(texcoord);
        }

        materials.push(material_json(
            surface,
            &mut bin,
            &mut buffer_views,
            &mut textures,
            &mut images,
        ));
        primitives.push(json!({
            "attributes": attributes,
            "indices": indices,
            "material": materials.len() - 1,
            "mode": 4,
        }));
    }

    if primitives.is_empty() {
        return Err(Error::Export("model has no geometry".to_string()));
    }

    let mut document = json!({
        "asset": {"version": "2.0", "generator": concat!("plan3d ", env!("CARGO_PKG_VERSION"))},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0, "name": "building"}],
        "meshes": [{"primitives": primitives}],
        "materials": materials,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{"byteLength": bin.data.len()}],
    });
    if !textures.is_empty() {
        document["textures"] = json!(textures);
        document["images"] = json!(images);
        document["samplers"] = json!([{"wrapS": REPEAT, "wrapT": REPEAT}]);
    }

    let json = serde_json::to_vec(&document).map_err(|e| Error::Export(e.to_string()))?;
    pack_glb(json, bin.data)
}

/// Encode and write a model to disk
pub fn write_glb(model: &BuildingModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_glb(model)?;
    std::fs::write(path, &bytes).map_err(Error::io(Stage::Export, path))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote GLB");
    Ok(())
}

#[derive(Default)]
struct BinaryBuffer {
    data: Vec<u8>,
}

impl BinaryBuffer {
    /// Append 4-byte aligned; returns (offset, length)
    fn push(&mut self, bytes: &[u8]) -> (usize, usize) {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        (offset, bytes.len())
    }
}

fn push_view(
    bin: &mut BinaryBuffer,
    views: &mut Vec<Value>,
    bytes: &[u8],
    target: Option<u32>,
) -> usize {
    let (offset, length) = bin.push(bytes);
    let mut view = json!({"buffer": 0, "byteOffset": offset, "byteLength": length});
    if let Some(target) = target {
        view["target"] = json!(target);
    }
    views.push(view);
    views.len() - 1
}

fn push_accessor(
    bin: &mut BinaryBuffer,
    views: &mut Vec<Value>,
    accessors: &mut Vec<Value>,
    bytes: Vec<u8>,
    target: u32,
    mut accessor: Value,
) -> usize {
    accessor["bufferView"] = json!(push_view(bin, views, &bytes, Some(target)));
    accessors.push(accessor);
    accessors.len() - 1
}

fn material_json(
    surface: &Surface,
    bin: &mut BinaryBuffer,
    views: &mut Vec<Value>,
    textures: &mut Vec<Value>,
    images: &mut Vec<Value>,
) -> Value {
    let material = &surface.material;
    let [r, g, b, a] = material.base_color;
    let mut pbr = json!({
        "baseColorFactor": [r, g, b, a],
        "metallicFactor": 0.0,
        "roughnessFactor": 0.9,
    });

    if let Some(texture) = &material.texture {
        let view = push_view(bin, views, &texture.bytes, None);
        images.push(json!({"bufferView": view, "mimeType": texture.mime_type}));
        textures.push(json!({"source": images.len() - 1, "sampler": 0}));
        pbr["baseColorTexture"] = json!({"index": textures.len() - 1});
    }

    let mut value = json!({
        "name": material.label.as_str(),
        "pbrMetallicRoughness": pbr,
        "doubleSided": false,
    });
    if a < 1.0 {
        value["alphaMode"] = json!("BLEND");
    }
    value
}

/// Planar UVs from the dominant normal axis, in the Z-up frame
fn box_uvs(mesh: &Mesh) -> Vec<f32> {
    let mut uvs = Vec::with_capacity(mesh.vertex_count() * 2);
    for (p, n) in mesh
        .positions
        .chunks_exact(3)
        .zip(mesh.normals.chunks_exact(3))
    {
        let (ax, ay, az) = (n[0].abs(), n[1].abs(), n[2].abs());
        let (u, v) = if az >= ax && az >= ay {
            (p[0], p[1])
        } else if ax >= ay {
            (p[1], p[2])
        } else {
            (p[0], p[2])
        };
        uvs.push(u / UV_TILE);
        uvs.push(v / UV_TILE);
    }
    uvs
}

fn floats_as_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// GLB container: 12-byte header, JSON chunk, BIN chunk
fn pack_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Result<Vec<u8>> {
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::Export(format!("model of {total} bytes exceeds the GLB limit")))?;

    let mut output = Vec::with_capacity(total as usize);
    output.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    output.extend_from_slice(&GLB_VERSION.to_le_bytes());
    output.extend_from_slice(&total.to_le_bytes());

    output.extend_from_slice(&(json.len() as u32).to_le_bytes());
    output.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    output.extend_from_slice(&json);

    output.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    output.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    output.extend_from_slice(&bin);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblyReport, SolidInfo};
    use crate::material::{MaterialLabel, RenderMaterial, Texture};
    use crate::types::ElementKind;
    use plan3d_geometry::profile::create_rectangle;
    use plan3d_geometry::{extrude_profile, CoordinateShift};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn model(texture: Option<Texture>) -> BuildingModel {
        let mesh = extrude_profile(
            &create_rectangle(4.0, 2.0),
            0.0,
            3.0,
            &CoordinateShift::default(),
        )
        .unwrap();
        BuildingModel {
            surfaces: vec![Surface {
                material: Arc::new(RenderMaterial {
                    label: MaterialLabel::Concrete,
                    base_color: [0.6, 0.6, 0.6, 1.0],
                    texture,
                }),
                mesh,
            }],
            solids: vec![SolidInfo {
                kind: ElementKind::Wall,
                label: MaterialLabel::Concrete,
                base_z: 0.0,
                height: 3.0,
                surface: 0,
                triangles: 12,
            }],
            shift: CoordinateShift::default(),
            report: AssemblyReport::default(),
        }
    }

    fn json_chunk(glb: &[u8]) -> Value {
        let len = u32_at(glb, 12) as usize;
        serde_json::from_slice(&glb[20..20 + len]).unwrap()
    }

    #[test]
    fn test_glb_container_layout() {
        let glb = to_glb(&model(None)).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32_at(&glb, 4), 2);
        assert_eq!(u32_at(&glb, 8) as usize, glb.len());
        assert_eq!(glb.len() % 4, 0);
        assert_eq!(u32_at(&glb, 16), CHUNK_JSON);

        let json_len = u32_at(&glb, 12) as usize;
        assert_eq!(u32_at(&glb, 20 + json_len + 4), CHUNK_BIN);
        let bin_len = u32_at(&glb, 20 + json_len) as usize;
        assert_eq!(20 + json_len + 8 + bin_len, glb.len());
    }

    #[test]
    fn test_document_is_y_up() {
        let glb = to_glb(&model(None)).unwrap();
        let doc = json_chunk(&glb);

        let position = &doc["accessors"][0];
        assert_eq!(position["count"], 24);
        // Extrusion height (Z) becomes Y
        let max_y = position["max"][1].as_f64().unwrap();
        let min_y = position["min"][1].as_f64().unwrap();
        assert!((max_y - 3.0).abs() < 1e-5 && min_y.abs() < 1e-5);
        assert_eq!(doc["materials"][0]["name"], "concrete");
        assert!(doc["meshes"][0]["primitives"][0]["attributes"]
            .get("TEXCOORD_0")
            .is_none());
        assert!(doc.get("textures").is_none());
    }

    #[test]
    fn test_embedded_texture() {
        let texture = Texture {
            path: PathBuf::from("concrete.png"),
            mime_type: "image/png",
            bytes: vec![1, 2, 3, 4, 5],
        };
        let glb = to_glb(&model(Some(texture))).unwrap();
        let doc = json_chunk(&glb);

        assert_eq!(doc["images"][0]["mimeType"], "image/png");
        let pbr = &doc["materials"][0]["pbrMetallicRoughness"];
        assert_eq!(pbr["baseColorTexture"]["index"], 0);
        let attributes = &doc["meshes"][0]["primitives"][0]["attributes"];
        let uv = attributes["TEXCOORD_0"].as_u64().unwrap() as usize;
        assert_eq!(doc["accessors"][uv]["type"], "VEC2");
    }

    #[test]
    fn test_empty_model_not_exported() {
        let mut empty = model(None);
        empty.surfaces[0].mesh = Mesh::new();
        assert!(matches!(to_glb(&empty), Err(Error::Export(_))));
    }
}
