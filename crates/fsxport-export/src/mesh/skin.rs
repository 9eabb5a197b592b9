//! Skin bindings and the `MeshSkinWeights` block

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use fsxport_core::naming::bone_safe_name;
use fsxport_core::Result;
use fsxport_scene::{NodeKind, SceneDescription, SceneForest, SceneObject, SourceRef};

use super::{MeshEnumeration, MeshSnapshot};
use crate::format::float;
use crate::writer::XWriter;

/// Most bones a vertex may be weighted to
pub const MAX_INFLUENCES: usize = 4;

/// Armature bound to a mesh through an armature modifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinBinding {
    /// Armature object name
    pub armature: String,
    /// Bones of the armature still in the export forest
    pub bones: BTreeSet<String>,
}

/// Skin bindings of every exported mesh
///
/// Captured while armature nodes are still in the forest, since flattening
/// removes them before the meshes are written.
#[derive(Debug, Clone, Default)]
pub struct SkinBindings {
    by_mesh: HashMap<String, Vec<SkinBinding>>,
}

impl SkinBindings {
    /// Record the exported armatures each exported mesh is bound to
    pub fn capture(scene: &SceneDescription, forest: &SceneForest) -> Self {
        let mut by_mesh = HashMap::new();
        for (_, node) in forest.nodes() {
            if node.kind != NodeKind::Mesh {
                continue;
            }
            let Some(object) = scene.object(&node.name) else {
                continue;
            };

            let bindings: Vec<SkinBinding> = object
                .armature_modifier_targets()
                .filter_map(|target| {
                    forest.object_id(target)?;
                    let armature = scene.object(target)?.armature.as_ref()?;
                    let bones: BTreeSet<String> = armature
                        .pose
                        .iter()
                        .filter(|b| forest.id_of(&SourceRef::bone(target, &b.name)).is_some())
                        .map(|b| b.name.clone())
                        .collect();
                    if bones.is_empty() {
                        tracing::debug!(mesh = %node.name, armature = target, "armature has no exported bones");
                        return None;
                    }
                    Some(SkinBinding { armature: target.to_string(), bones })
                })
                .collect();

            if !bindings.is_empty() {
                by_mesh.insert(node.name.clone(), bindings);
            }
        }
        Self { by_mesh }
    }

    /// Bindings of one mesh
    pub fn for_mesh(&self, mesh: &str) -> &[SkinBinding] {
        self.by_mesh.get(mesh).map_or(&[], Vec::as_slice)
    }

    /// Number of meshes with at least one binding
    pub fn len(&self) -> usize {
        self.by_mesh.len()
    }

    /// Check whether no mesh is bound
    pub fn is_empty(&self) -> bool {
        self.by_mesh.is_empty()
    }
}

/// Keep the strongest influences and renormalize them
///
/// More than [`MAX_INFLUENCES`] entries are cut down to the largest ones.
/// Kept weights are divided by their own sum. A vertex whose weights total
/// zero gets zero for every kept entry.
pub fn cap_influences<T>(mut influences: Vec<(T, f32)>) -> Vec<(T, f32)> {
    let total: f32 = influences.iter().map(|(_, w)| w).sum();
    if influences.len() > MAX_INFLUENCES {
        influences.sort_by(|a, b| b.1.total_cmp(&a.1));
        influences.truncate(MAX_INFLUENCES);
    }
    let kept: f32 = influences.iter().map(|(_, w)| w).sum();
    for (_, w) in &mut influences {
        *w = if total == 0.0 || kept == 0.0 { 0.0 } else { *w / kept };
    }
    influences
}

/// Write the skin weights of `object` against one armature
pub fn write_skin_weights<W: Write>(
    out: &mut XWriter<W>,
    object: &SceneObject,
    binding: &SkinBinding,
    snapshot: &MeshSnapshot,
    enumeration: &MeshEnumeration,
) -> Result<()> {
    let group_bones: HashMap<usize, String> = object
        .vertex_groups
        .iter()
        .enumerate()
        .filter(|(_, name)| binding.bones.contains(name.as_str()))
        .map(|(index, name)| (index, bone_safe_name(&binding.armature, name)))
        .collect();
    tracing::debug!(
        object = %object.name,
        armature = %binding.armature,
        bones = group_bones.len(),
        "writing skin weights"
    );

    out.write("MeshSkinWeights {\n")?;
    out.write(&format!("{};\n", enumeration.vertex_count()))?;
    out.indent();

    for &vertex in &enumeration.vertices {
        let influences: Vec<(&str, f32)> = snapshot.groups[vertex as usize]
            .iter()
            .filter_map(|g| group_bones.get(&g.group).map(|bone| (bone.as_str(), g.weight)))
            .collect();
        let influences = cap_influences(influences);

        out.write(&format!("{};\n", influences.len()))?;
        out.indent();
        for (bone, weight) in influences {
            out.write(&format!("\"{bone}\","))?;
            out.write_raw(&format!("{};\n", float(weight)))?;
        }
        out.unindent();
    }

    out.unindent();
    out.write("} // End MeshSkinWeights\n")
}
