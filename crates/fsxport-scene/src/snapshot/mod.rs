//! Read-only snapshot of a host scene
//!
//! The exporter never talks to a live host. Instead the host dumps its scene
//! into this serde model (usually as JSON) and the exporter evaluates frames
//! from it through [`crate::evaluator::SnapshotEvaluator`].

mod animation;
mod armature;
mod material;
mod mesh;

pub use animation::{pose_bone_path, AnimationData, FCurve, Keyframe, NlaStrip, NlaTrack};
pub use armature::{ArmatureData, BoneData, PoseBone, PosePosition};
pub use material::{
    Material, MaterialMode, MaterialParams, NodeLink, NodeSocket, NodeTree, ShaderNode, TextureSlots, TEX_IMAGE,
};
pub use mesh::{GroupWeight, MeshData, MeshPolygon, MeshVertex, UvLayer};

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use fsxport_core::{Error, Result, ResultExt};

/// 4x4 matrix stored row by row
pub type Matrix4Rows = [[f32; 4]; 4];

pub(crate) fn identity_rows() -> Matrix4Rows {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

pub(crate) fn identity_quaternion() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

pub(crate) fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Convert row-major storage into a matrix
pub fn rows_to_matrix(rows: &Matrix4Rows) -> Matrix4<f32> {
    Matrix4::from_fn(|r, c| rows[r][c])
}

/// Convert a matrix into row-major storage
pub fn matrix_to_rows(m: &Matrix4<f32>) -> Matrix4Rows {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

/// Host object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    /// Transform-only helper
    Empty,
    /// Polygon mesh
    Mesh,
    /// Skeleton
    Armature,
    /// Anything the exporter does not handle (cameras, lights, curves)
    #[serde(other)]
    Other,
}

impl ObjectKind {
    /// Whether objects of this kind become export nodes
    pub const fn is_exportable(self) -> bool {
        !matches!(self, ObjectKind::Other)
    }
}

/// Object modifier, only armature deforms matter to the exporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Modifier {
    /// Skins the mesh to an armature object
    Armature {
        /// Armature object name
        object: Option<String>,
    },
    /// Any other modifier
    #[serde(other)]
    Other,
}

/// Rotation of an object's basis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rotation {
    /// Euler angles in radians, applied X then Y then Z
    Xyz {
        /// Angles
        euler: [f32; 3],
    },
    /// Unit quaternion `w, x, y, z`
    Quaternion {
        /// Components
        quaternion: [f32; 4],
    },
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Xyz { euler: [0.0; 3] }
    }
}

/// Object transform relative to its parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectTransform {
    /// Translation
    pub location: [f32; 3],
    /// Rotation
    pub rotation: Rotation,
    /// Scale
    pub scale: [f32; 3],
    /// Inverse of the parent's world matrix at parenting time
    pub parent_inverse: Matrix4Rows,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            rotation: Rotation::default(),
            scale: unit_scale(),
            parent_inverse: identity_rows(),
        }
    }
}

/// One host object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Unique object name
    pub name: String,
    /// Object type
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Parent object name
    #[serde(default)]
    pub parent: Option<String>,
    /// Selection state
    #[serde(default)]
    pub selected: bool,
    /// Basis transform
    #[serde(default)]
    pub transform: ObjectTransform,
    /// Keyframe curves of the active action
    #[serde(default)]
    pub animation: Option<AnimationData>,
    /// NLA tracks, used for pose bones when there is no active action
    #[serde(default)]
    pub nla_tracks: Vec<NlaTrack>,
    /// Names of object constraints
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Baked local matrices per frame starting at 0, used for constraint output
    #[serde(default)]
    pub baked_local: Vec<Matrix4Rows>,
    /// Animation tag driving the `.xanim` entry
    #[serde(default)]
    pub anim_tag: Option<String>,
    /// Manual animation length, `start-end`
    #[serde(default)]
    pub anim_length: Option<String>,
    /// Attach point XML embedded as part data
    #[serde(default)]
    pub attach_xml: Option<String>,
    /// Vertex group names, indexed by `GroupWeight::group`
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    /// Modifier stack
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// Material slot names, `None` for empty slots
    #[serde(default)]
    pub material_slots: Vec<Option<String>>,
    /// Base mesh
    #[serde(default)]
    pub mesh: Option<MeshData>,
    /// Mesh with modifiers applied, armature deform excluded
    #[serde(default)]
    pub evaluated_mesh: Option<MeshData>,
    /// Armature data
    #[serde(default)]
    pub armature: Option<ArmatureData>,
}

impl SceneObject {
    /// Armature objects bound by armature modifiers, in stack order
    pub fn armature_modifier_targets(&self) -> impl Iterator<Item = &str> {
        self.modifiers.iter().filter_map(|m| match m {
            Modifier::Armature { object: Some(name) } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether dense per-frame sampling is needed
    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Curves driving the pose bones of an armature
    ///
    /// The active action when there is one, otherwise the strips of every
    /// unmuted NLA track.
    pub fn pose_curves(&self) -> Vec<&FCurve> {
        match &self.animation {
            Some(action) => action.fcurves.iter().collect(),
            None => self.nla_tracks.iter().flat_map(|t| t.active_curves()).collect(),
        }
    }

    /// Evaluate component `index` of pose curve `path`, if animated
    pub fn sample_pose(&self, path: &str, index: usize, frame: f32) -> Option<f32> {
        self.pose_curves()
            .into_iter()
            .find(|c| c.data_path == path && c.array_index == index)
            .and_then(|c| c.evaluate(frame))
    }

    /// Every curve of the object, action and NLA strips alike
    fn all_curves_mut(&mut self) -> impl Iterator<Item = &mut FCurve> {
        let action = self.animation.iter_mut().flat_map(|a| a.fcurves.iter_mut());
        let strips = self
            .nla_tracks
            .iter_mut()
            .flat_map(|t| t.strips.iter_mut())
            .flat_map(|s| s.action.fcurves.iter_mut());
        action.chain(strips)
    }

    fn all_curves(&self) -> impl Iterator<Item = &FCurve> {
        let action = self.animation.iter().flat_map(|a| a.fcurves.iter());
        let strips = self
            .nla_tracks
            .iter()
            .flat_map(|t| t.strips.iter())
            .flat_map(|s| s.action.fcurves.iter());
        action.chain(strips)
    }

    /// Tag of this object, ignoring empty strings
    pub fn tag(&self) -> Option<&str> {
        self.anim_tag.as_deref().filter(|t| !t.is_empty())
    }
}

/// A whole host scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Host application and version, written into the file header
    #[serde(default)]
    pub application: String,
    /// Frame displayed when the snapshot was taken
    #[serde(default)]
    pub frame_current: i32,
    /// All objects
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    /// All materials
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl SceneDescription {
    /// Load a snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).with_context(|| format!("loading scene {}", path.display()))
    }

    /// Parse and validate a snapshot from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut scene: Self = serde_json::from_str(text).map_err(|e| Error::invalid_scene(e.to_string()))?;
        scene.sort_keyframes();
        scene.validate()?;
        Ok(scene)
    }

    /// Object by name
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Material by name
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Direct children of an object, in scene order
    pub fn children_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SceneObject> + 'a {
        self.objects.iter().filter(move |o| o.parent.as_deref() == Some(name))
    }

    /// Put every curve's keyframes in ascending frame order
    pub fn sort_keyframes(&mut self) {
        for object in &mut self.objects {
            object.all_curves_mut().for_each(FCurve::sort_keyframes);
        }
    }

    /// Check names, references, curves and mesh data
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for object in &self.objects {
            if !names.insert(object.name.as_str()) {
                return Err(Error::invalid_scene(format!("duplicate object name '{}'", object.name)));
            }
        }

        for object in &self.objects {
            if let Some(parent) = &object.parent {
                if !names.contains(parent.as_str()) {
                    return Err(Error::UnknownObject { name: parent.clone() });
                }
            }
            for mesh in [&object.mesh, &object.evaluated_mesh].into_iter().flatten() {
                mesh.validate(&object.name)?;
            }
            if object.kind == ObjectKind::Armature && object.armature.is_none() {
                return Err(Error::invalid_scene(format!("armature '{}' has no armature data", object.name)));
            }
            if let Some(curve) = object.all_curves().find(|c| !c.is_ordered()) {
                return Err(Error::invalid_scene(format!(
                    "curve '{}[{}]' of '{}' has unordered keyframes",
                    curve.data_path, curve.array_index, object.name
                )));
            }
            if let Some(armature) = &object.armature {
                for bone in &armature.bones {
                    if let Some(parent) = &bone.parent {
                        if !armature.has_bone(parent) {
                            return Err(Error::invalid_scene(format!(
                                "bone '{}' of '{}' has unknown parent '{parent}'",
                                bone.name, object.name
                            )));
                        }
                    }
                }
            }
        }

        // Detect parent cycles by walking up from every object
        for object in &self.objects {
            let mut seen = HashSet::new();
            let mut current = Some(object);
            while let Some(node) = current {
                if !seen.insert(node.name.as_str()) {
                    return Err(Error::ParentCycle { node: node.name.clone() });
                }
                current = node.parent.as_deref().and_then(|p| self.object(p));
            }
        }

        for object in &self.objects {
            let Some(armature) = &object.armature else {
                continue;
            };
            for bone in &armature.bones {
                let mut seen = HashSet::new();
                let mut current = Some(bone);
                while let Some(node) = current {
                    if !seen.insert(node.name.as_str()) {
                        return Err(Error::ParentCycle {
                            node: format!("{}:{}", object.name, node.name),
                        });
                    }
                    current = node.parent.as_deref().and_then(|p| armature.bone(p));
                }
            }
        }
        Ok(())
    }
}
