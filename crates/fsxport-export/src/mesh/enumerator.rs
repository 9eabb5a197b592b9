//! Vertex/index views of a mesh
//!
//! The scene file wants one vertex entry per UV corner whenever UVs or skin
//! weights are written, so those meshes are unrolled: every polygon corner
//! becomes its own vertex. Other meshes keep their shared vertices.

use smallvec::SmallVec;

/// How polygon corners map to written vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// One entry per source vertex
    Shared,
    /// One entry per polygon corner
    Unrolled,
}

impl VertexLayout {
    /// Layout required for a mesh
    pub fn for_mesh(has_uv_layers: bool, skin_weights: bool) -> Self {
        if has_uv_layers || skin_weights {
            VertexLayout::Unrolled
        } else {
            VertexLayout::Shared
        }
    }
}

/// Enumerated vertices and faces
///
/// `vertices[faces[p][c]]` is the source vertex of corner `c` of polygon `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshEnumeration {
    /// Source vertex index of each written vertex
    pub vertices: Vec<u32>,
    /// Written vertex indices of each polygon, in source winding order
    pub faces: Vec<SmallVec<[u32; 4]>>,
}

impl MeshEnumeration {
    /// Enumerate `polygons` with the given layout
    pub fn build<'a, I>(layout: VertexLayout, vertex_count: usize, polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        match layout {
            VertexLayout::Shared => Self::shared(vertex_count, polygons),
            VertexLayout::Unrolled => Self::unrolled(polygons),
        }
    }

    /// Keep source vertices and indices as they are
    pub fn shared<'a, I>(vertex_count: usize, polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        let vertex_count = u32::try_from(vertex_count).unwrap_or(u32::MAX);
        Self {
            vertices: (0..vertex_count).collect(),
            faces: polygons.into_iter().map(SmallVec::from_slice).collect(),
        }
    }

    /// Duplicate each vertex for every polygon corner using it
    pub fn unrolled<'a, I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut next = 0u32;
        for polygon in polygons {
            vertices.extend_from_slice(polygon);
            let end = next + polygon.len() as u32;
            faces.push((next..end).collect());
            next = end;
        }
        Self { vertices, faces }
    }

    /// Number of written vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of written faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}
