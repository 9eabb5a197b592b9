//! Armature rest data and pose state

use serde::{Deserialize, Serialize};

use super::Matrix4Rows;

/// Which bone matrices the armature displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PosePosition {
    /// Bind pose
    Rest,
    /// Animated pose
    #[default]
    Pose,
}

/// Rest bone of an armature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneData {
    /// Bone name, unique within the armature
    pub name: String,
    /// Parent bone name
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest matrix in armature space
    #[serde(default = "super::identity_rows")]
    pub matrix_local: Matrix4Rows,
}

/// Animated state of a bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseBone {
    /// Name of the bone this pose drives
    pub name: String,
    /// Location relative to rest
    #[serde(default)]
    pub location: [f32; 3],
    /// Rotation relative to rest, `w, x, y, z`
    #[serde(default = "super::identity_quaternion")]
    pub rotation_quaternion: [f32; 4],
    /// Scale relative to rest
    #[serde(default = "super::unit_scale")]
    pub scale: [f32; 3],
    /// Names of bone constraints
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Baked basis matrices per frame starting at 0, used for constraint output
    #[serde(default)]
    pub baked_basis: Vec<Matrix4Rows>,
    /// Animation tag driving the `.xanim` entry of this bone
    #[serde(default)]
    pub anim_tag: Option<String>,
    /// Manual animation length in the `start-end` form
    #[serde(default)]
    pub anim_length: Option<String>,
}

/// Armature data block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmatureData {
    /// Rest or pose display
    #[serde(default)]
    pub pose_position: PosePosition,
    /// Bones in hierarchy order
    #[serde(default)]
    pub bones: Vec<BoneData>,
    /// Pose state by bone
    #[serde(default)]
    pub pose: Vec<PoseBone>,
}

impl ArmatureData {
    /// Look up a rest bone
    pub fn bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Look up a pose bone
    pub fn pose_bone(&self, name: &str) -> Option<&PoseBone> {
        self.pose.iter().find(|b| b.name == name)
    }

    /// Names of direct children of `name`
    pub fn children_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BoneData> + 'a {
        self.bones.iter().filter(move |b| b.parent.as_deref() == Some(name))
    }

    /// Whether a bone of that name exists
    pub fn has_bone(&self, name: &str) -> bool {
        self.bone(name).is_some()
    }
}
