//! Mesh geometry as captured from the host

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use fsxport_core::{Error, Result};

/// Weight of a vertex in one vertex group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupWeight {
    /// Index into the owning object's `vertex_groups`
    pub group: usize,
    /// Influence, usually 0..=1
    pub weight: f32,
}

/// Mesh vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    /// Position in object space
    pub co: [f32; 3],
    /// Smooth vertex normal, computed on export when absent
    #[serde(default)]
    pub normal: Option<[f32; 3]>,
    /// Vertex group memberships
    #[serde(default)]
    pub groups: SmallVec<[GroupWeight; 4]>,
}

fn default_true() -> bool {
    true
}

/// Mesh polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPolygon {
    /// Vertex indices in winding order
    pub vertices: SmallVec<[u32; 4]>,
    /// Material slot
    #[serde(default)]
    pub material_index: usize,
    /// Smooth shading
    #[serde(default = "default_true")]
    pub use_smooth: bool,
    /// Face normal, computed on export when absent
    #[serde(default)]
    pub normal: Option<[f32; 3]>,
}

/// Per-corner UV coordinates of one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    /// Layer name
    #[serde(default)]
    pub name: String,
    /// One entry per polygon corner, in polygon order
    pub uvs: Vec<[f32; 2]>,
}

/// Geometry of one mesh object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Vertices
    #[serde(default)]
    pub vertices: Vec<MeshVertex>,
    /// Polygons
    #[serde(default)]
    pub polygons: Vec<MeshPolygon>,
    /// UV layers, first is the primary channel
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
    /// Custom split normals, one per corner
    #[serde(default)]
    pub corner_normals: Option<Vec<[f32; 3]>>,
}

impl MeshData {
    /// Total number of polygon corners
    pub fn corner_count(&self) -> usize {
        self.polygons.iter().map(|p| p.vertices.len()).sum()
    }

    /// Index of the first corner of every polygon
    pub fn corner_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.polygons.len());
        let mut next = 0;
        for polygon in &self.polygons {
            offsets.push(next);
            next += polygon.vertices.len();
        }
        offsets
    }

    /// Check index ranges and per-corner array lengths
    pub fn validate(&self, object: &str) -> Result<()> {
        let vertex_count = self.vertices.len();
        for (i, polygon) in self.polygons.iter().enumerate() {
            if polygon.vertices.len() < 3 {
                return Err(Error::invalid_scene(format!(
                    "mesh '{object}' polygon {i} has fewer than 3 corners"
                )));
            }
            if let Some(&bad) = polygon.vertices.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(Error::invalid_scene(format!(
                    "mesh '{object}' polygon {i} references vertex {bad} of {vertex_count}"
                )));
            }
        }

        let corners = self.corner_count();
        for layer in &self.uv_layers {
            if layer.uvs.len() != corners {
                return Err(Error::invalid_scene(format!(
                    "mesh '{object}' UV layer '{}' has {} entries for {corners} corners",
                    layer.name,
                    layer.uvs.len()
                )));
            }
        }
        if let Some(normals) = &self.corner_normals {
            if normals.len() != corners {
                return Err(Error::invalid_scene(format!(
                    "mesh '{object}' has {} corner normals for {corners} corners",
                    normals.len()
                )));
            }
        }
        Ok(())
    }
}
