//! Mesh capture and the `Mesh` block

pub mod enumerator;
pub mod normals;
pub mod skin;
pub mod uv;

use nalgebra::Vector3;
use smallvec::SmallVec;
use std::io::Write;

use fsxport_core::{Error, ExportConfig, Result};
use fsxport_scene::snapshot::{GroupWeight, MeshData};
use fsxport_scene::{SceneDescription, SceneObject};

use crate::format::{vector3, write_list};
use crate::material::write_material;
use crate::writer::XWriter;

pub use enumerator::{MeshEnumeration, VertexLayout};
pub use normals::NormalsEnumeration;
pub use skin::{cap_influences, SkinBinding, SkinBindings};
pub use uv::UvChannel;

/// Triangle of a captured mesh
///
/// Corner `c` of triangle `t` is corner `3 * t + c` of the per-corner arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    /// Source vertex indices
    pub vertices: [u32; 3],
    /// Material slot
    pub material_index: usize,
    /// Smooth shading
    pub smooth: bool,
    /// Normal of the polygon the triangle came from
    pub normal: [f32; 3],
}

/// Triangulated copy of a mesh, ready to write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSnapshot {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Smooth vertex normals
    pub vertex_normals: Vec<[f32; 3]>,
    /// Vertex group weights per vertex
    pub groups: Vec<SmallVec<[GroupWeight; 4]>>,
    /// Triangles
    pub triangles: Vec<Triangle>,
    /// UV layers, one entry per triangle corner
    pub uv_layers: Vec<Vec<[f32; 2]>>,
    /// Custom split normals, one per triangle corner
    pub corner_normals: Option<Vec<[f32; 3]>>,
}

impl MeshSnapshot {
    /// Capture the mesh of `object`
    ///
    /// Uses the evaluated mesh when modifiers are applied and one is
    /// available. V is flipped on polygons using a virtual cockpit panel
    /// material, then polygons are fan triangulated.
    pub fn capture(scene: &SceneDescription, object: &SceneObject, apply_modifiers: bool) -> Result<Self> {
        let mesh = if apply_modifiers {
            object.evaluated_mesh.as_ref().or(object.mesh.as_ref())
        } else {
            object.mesh.as_ref()
        }
        .ok_or_else(|| Error::invalid_scene(format!("mesh object '{}' has no mesh data", object.name)))?;

        let panel_slots: Vec<bool> = object
            .material_slots
            .iter()
            .map(|slot| {
                slot.as_deref()
                    .and_then(|name| scene.material(name))
                    .is_some_and(|m| m.params.vc_panel_texture)
            })
            .collect();

        Ok(Self::from_mesh(mesh, &panel_slots))
    }

    /// Triangulate `mesh`, flipping V on polygons whose slot is flagged in `flip_v_slots`
    pub fn from_mesh(mesh: &MeshData, flip_v_slots: &[bool]) -> Self {
        let offsets = mesh.corner_offsets();
        let face_normals: Vec<[f32; 3]> = mesh
            .polygons
            .iter()
            .map(|p| p.normal.unwrap_or_else(|| polygon_normal(mesh, &p.vertices)))
            .collect();

        let mut snapshot = Self {
            positions: mesh.vertices.iter().map(|v| v.co).collect(),
            vertex_normals: vertex_normals(mesh),
            groups: mesh.vertices.iter().map(|v| v.groups.clone()).collect(),
            triangles: Vec::with_capacity(mesh.polygons.len()),
            uv_layers: vec![Vec::new(); mesh.uv_layers.len()],
            corner_normals: mesh.corner_normals.as_ref().map(|_| Vec::new()),
        };

        for ((polygon, &offset), normal) in mesh.polygons.iter().zip(&offsets).zip(face_normals) {
            let flip = flip_v_slots.get(polygon.material_index).copied().unwrap_or(false);
            for k in 1..polygon.vertices.len().saturating_sub(1) {
                let corners = [0, k, k + 1];
                snapshot.triangles.push(Triangle {
                    vertices: corners.map(|c| polygon.vertices[c]),
                    material_index: polygon.material_index,
                    smooth: polygon.use_smooth,
                    normal,
                });
                for (layer, out) in mesh.uv_layers.iter().zip(snapshot.uv_layers.iter_mut()) {
                    out.extend(corners.iter().map(|&c| {
                        let [u, v] = layer.uvs[offset + c];
                        if flip { [u, 1.0 - v] } else { [u, v] }
                    }));
                }
                if let (Some(source), Some(out)) = (&mesh.corner_normals, snapshot.corner_normals.as_mut()) {
                    out.extend(corners.iter().map(|&c| source[offset + c]));
                }
            }
        }
        snapshot
    }

    /// Source vertex indices of every triangle
    pub fn faces(&self) -> impl Iterator<Item = &[u32]> {
        self.triangles.iter().map(|t| t.vertices.as_slice())
    }

    /// Check whether any UV layer exists
    pub fn has_uv_layers(&self) -> bool {
        !self.uv_layers.is_empty()
    }

    /// Enumerate vertices for writing
    pub fn enumerate(&self, layout: VertexLayout) -> MeshEnumeration {
        MeshEnumeration::build(layout, self.positions.len(), self.faces())
    }
}

fn polygon_normal(mesh: &MeshData, vertices: &[u32]) -> [f32; 3] {
    let n = newell(mesh, vertices);
    let n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
    [n.x, n.y, n.z]
}

// Unnormalized, its length is twice the polygon area
fn newell(mesh: &MeshData, vertices: &[u32]) -> Vector3<f32> {
    let mut n = Vector3::zeros();
    for (i, &a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let p = Vector3::from(mesh.vertices[a as usize].co);
        let q = Vector3::from(mesh.vertices[b as usize].co);
        n += Vector3::new((p.y - q.y) * (p.z + q.z), (p.z - q.z) * (p.x + q.x), (p.x - q.x) * (p.y + q.y));
    }
    n
}

fn vertex_normals(mesh: &MeshData) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::<f32>::zeros(); mesh.vertices.len()];
    if mesh.vertices.iter().any(|v| v.normal.is_none()) {
        for polygon in &mesh.polygons {
            let n = newell(mesh, &polygon.vertices);
            for &v in &polygon.vertices {
                sums[v as usize] += n;
            }
        }
    }
    mesh.vertices
        .iter()
        .zip(sums)
        .map(|(vertex, sum)| {
            vertex.normal.unwrap_or_else(|| {
                let n = sum.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
                [n.x, n.y, n.z]
            })
        })
        .collect()
}

/// Write the `Mesh` block of `object`
///
/// `skin` lists the armatures whose bones are exported and bound to this
/// mesh; it is only read when skin weights are enabled.
pub fn write_mesh<W: Write>(
    out: &mut XWriter<W>,
    scene: &SceneDescription,
    object: &SceneObject,
    safe_name: &str,
    snapshot: &MeshSnapshot,
    skin: &[SkinBinding],
    config: &ExportConfig,
) -> Result<()> {
    tracing::debug!(object = %object.name, triangles = snapshot.triangles.len(), "writing mesh");
    out.write(&format!("Mesh {{ // {safe_name} mesh\n"))?;
    out.indent();

    let layout = VertexLayout::for_mesh(snapshot.has_uv_layers(), config.export_skin_weights);
    let enumeration = snapshot.enumerate(layout);

    out.write(&format!("{};\n", enumeration.vertex_count()))?;
    write_list(
        out,
        enumeration.vertices.iter().map(|&v| vector3(snapshot.positions[v as usize])),
    )?;

    out.write(&format!("{};\n", enumeration.face_count()))?;
    write_list(
        out,
        enumeration.faces.iter().map(|face| {
            let indices: Vec<String> = face.iter().rev().map(u32::to_string).collect();
            format!("{};{};", face.len(), indices.join(","))
        }),
    )?;

    NormalsEnumeration::build(snapshot).write(out, safe_name)?;

    if let Some(layer) = snapshot.uv_layers.first() {
        uv::write_uv_block(out, safe_name, layer, UvChannel::Primary)?;
    }
    if config.sdk.supports_second_uv() {
        if let Some(layer) = snapshot.uv_layers.get(1) {
            uv::write_uv_block(out, safe_name, layer, UvChannel::Secondary)?;
        }
    }

    write_material_list(out, scene, object, safe_name, snapshot, config)?;

    if config.export_skin_weights {
        for binding in skin {
            skin::write_skin_weights(out, object, binding, snapshot, &enumeration)?;
        }
    }

    out.unindent();
    out.write(&format!("}} // End of {safe_name} mesh\n"))?;
    out.write(&format!("AnimLinkName {{ \"{safe_name}\"; }}\n"))
}

fn write_material_list<W: Write>(
    out: &mut XWriter<W>,
    scene: &SceneDescription,
    object: &SceneObject,
    safe_name: &str,
    snapshot: &MeshSnapshot,
    config: &ExportConfig,
) -> Result<()> {
    if object.material_slots.is_empty() {
        return Ok(());
    }

    out.write(&format!("MeshMaterialList {{ // {safe_name} material list\n"))?;
    out.indent();
    out.write(&format!("{};\n", object.material_slots.len()))?;
    out.write(&format!("{};\n", snapshot.triangles.len()))?;
    let last = snapshot.triangles.len().saturating_sub(1);
    for (i, triangle) in snapshot.triangles.iter().enumerate() {
        out.write(&triangle.material_index.to_string())?;
        out.write_raw(if i == last { ";\n" } else { ",\n" })?;
    }

    for slot in &object.material_slots {
        let Some(name) = slot else {
            tracing::debug!(object = %object.name, "empty material slot");
            continue;
        };
        let material = scene.material(name).ok_or_else(|| {
            Error::invalid_scene(format!("material '{name}' of '{}' is not defined", object.name))
        })?;
        write_material(out, material, config)?;
    }

    out.unindent();
    out.write(&format!("}} // End of {safe_name} material list\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsxport_scene::snapshot::{MeshPolygon, MeshVertex, UvLayer};
    use smallvec::smallvec;

    fn make_vertex(co: [f32; 3]) -> MeshVertex {
        MeshVertex { co, normal: None, groups: SmallVec::new() }
    }

    fn make_quad_mesh() -> MeshData {
        MeshData {
            vertices: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
                .into_iter()
                .map(make_vertex)
                .collect(),
            polygons: vec![MeshPolygon {
                vertices: smallvec![0, 1, 2, 3],
                material_index: 0,
                use_smooth: false,
                normal: None,
            }],
            uv_layers: vec![UvLayer {
                name: "UVMap".to_string(),
                uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.25]],
            }],
            corner_normals: None,
        }
    }

    #[test]
    fn test_quad_is_fan_triangulated() {
        let snapshot = MeshSnapshot::from_mesh(&make_quad_mesh(), &[]);
        let faces: Vec<&[u32]> = snapshot.faces().collect();
        assert_eq!(faces, vec![&[0, 1, 2][..], &[0, 2, 3][..]]);
        assert_eq!(snapshot.uv_layers[0].len(), 6);
        assert_eq!(snapshot.uv_layers[0][5], [0.0, 0.25]);
    }

    #[test]
    fn test_computed_normals_face_up() {
        let snapshot = MeshSnapshot::from_mesh(&make_quad_mesh(), &[]);
        assert_eq!(snapshot.triangles[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(snapshot.vertex_normals[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_panel_slot_flips_v() {
        let snapshot = MeshSnapshot::from_mesh(&make_quad_mesh(), &[true]);
        assert_eq!(snapshot.uv_layers[0][5], [0.0, 0.75]);
        assert_eq!(snapshot.uv_layers[0][0], [0.0, 1.0]);
    }

    #[test]
    fn test_mesh_block_counts() {
        let mut mesh = make_quad_mesh();
        mesh.uv_layers.clear();
        let snapshot = MeshSnapshot::from_mesh(&mesh, &[]);
        let scene = SceneDescription::default();
        let object: SceneObject =
            serde_json::from_str(r#"{"name": "Quad", "type": "MESH"}"#).unwrap();

        let mut out = XWriter::new(Vec::new());
        write_mesh(&mut out, &scene, &object, "Quad", &snapshot, &[], &ExportConfig::default()).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();

        assert!(text.starts_with("Mesh { // Quad mesh\n  4;\n"));
        assert!(text.contains("  2;\n  3;2,1,0;,\n  3;3,2,0;;\n"));
        assert!(text.contains("MeshNormals { // Quad normals\n"));
        assert!(!text.contains("MeshTextureCoords"));
        assert!(!text.contains("MeshMaterialList"));
        assert!(text.ends_with("} // End of Quad mesh\nAnimLinkName { \"Quad\"; }\n"));
    }

    #[test]
    fn test_unknown_material_is_an_error() {
        let snapshot = MeshSnapshot::from_mesh(&make_quad_mesh(), &[]);
        let scene = SceneDescription::default();
        let object: SceneObject =
            serde_json::from_str(r#"{"name": "Quad", "type": "MESH", "material_slots": ["Paint"]}"#).unwrap();
        let mut out = XWriter::new(Vec::new());
        let err = write_mesh(&mut out, &scene, &object, "Quad", &snapshot, &[], &ExportConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_capture_prefers_evaluated_mesh() {
        let mut object: SceneObject = serde_json::from_str(r#"{"name": "Quad", "type": "MESH"}"#).unwrap();
        object.mesh = Some(make_quad_mesh());
        let mut evaluated = make_quad_mesh();
        evaluated.vertices.push(make_vertex([2.0, 0.0, 0.0]));
        object.evaluated_mesh = Some(evaluated);
        let scene = SceneDescription::default();

        assert_eq!(MeshSnapshot::capture(&scene, &object, true).unwrap().positions.len(), 5);
        assert_eq!(MeshSnapshot::capture(&scene, &object, false).unwrap().positions.len(), 4);
    }
}
