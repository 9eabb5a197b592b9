//! `MeshNormals` block
//!
//! Normals are indexed independently of vertices: a flat triangle adds its
//! face normal once and points all three corners at it, a smooth triangle
//! reuses any identical normal already written.

use std::collections::HashMap;
use std::io::Write;

use fsxport_core::Result;

use super::MeshSnapshot;
use crate::format::{vector3, write_list};
use crate::writer::XWriter;

/// Normal vectors and per-face normal indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalsEnumeration {
    /// Distinct normals in first-use order (flat faces always add one)
    pub normals: Vec<[f32; 3]>,
    /// Normal index of each triangle corner, in source winding order
    pub faces: Vec<[u32; 3]>,
}

// -0.0 and 0.0 compare equal, so fold them before hashing the bits
fn key(n: [f32; 3]) -> [u32; 3] {
    n.map(|c| (c + 0.0).to_bits())
}

impl NormalsEnumeration {
    /// Index the normals of a captured mesh
    ///
    /// Smooth corners use the custom split normal when the mesh has them,
    /// the vertex normal otherwise.
    pub fn build(snapshot: &MeshSnapshot) -> Self {
        let mut out = Self {
            normals: Vec::new(),
            faces: Vec::with_capacity(snapshot.triangles.len()),
        };
        let mut seen: HashMap<[u32; 3], u32> = HashMap::new();

        for (t, triangle) in snapshot.triangles.iter().enumerate() {
            if !triangle.smooth {
                let index = out.push(triangle.normal);
                out.faces.push([index; 3]);
                continue;
            }

            let mut face = [0u32; 3];
            for (c, slot) in face.iter_mut().enumerate() {
                let normal = match &snapshot.corner_normals {
                    Some(corners) => corners[3 * t + c],
                    None => snapshot.vertex_normals[triangle.vertices[c] as usize],
                };
                *slot = match seen.get(&key(normal)) {
                    Some(&index) => index,
                    None => {
                        let index = out.push(normal);
                        seen.insert(key(normal), index);
                        index
                    }
                };
            }
            out.faces.push(face);
        }
        out
    }

    fn push(&mut self, normal: [f32; 3]) -> u32 {
        self.normals.push(normal);
        (self.normals.len() - 1) as u32
    }

    /// Write the block, faces in reversed winding
    pub fn write<W: Write>(&self, out: &mut XWriter<W>, safe_name: &str) -> Result<()> {
        out.write(&format!("MeshNormals {{ // {safe_name} normals\n"))?;
        out.indent();

        out.write(&format!("{};\n", self.normals.len()))?;
        write_list(out, self.normals.iter().map(|&n| vector3(n)))?;

        out.write(&format!("{};\n", self.faces.len()))?;
        write_list(out, self.faces.iter().map(|[a, b, c]| format!("3;{c},{b},{a};")))?;

        out.unindent();
        out.write(&format!("}} // End of {safe_name} normals\n"))
    }
}
