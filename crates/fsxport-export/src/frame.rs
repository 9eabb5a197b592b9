//! `Frame` records for export nodes
//!
//! Each node becomes a frame holding its transform relative to the frame it
//! is written in, followed by its content and the frames of its children in
//! name order.

use nalgebra::Matrix4;
use std::io::Write;

use fsxport_core::{Error, ExportConfig, Result};
use fsxport_scene::math::inverse_or_identity;
use fsxport_scene::snapshot::rows_to_matrix;
use fsxport_scene::{
    ArmatureData, FrameEvaluator, NodeId, NodeKind, PosePosition, SceneDescription, SceneForest, SceneNode,
};

use crate::format::write_matrix;
use crate::mesh::{write_mesh, MeshSnapshot, SkinBindings};
use crate::writer::XWriter;

/// Writes the frame tree of a prepared forest
pub struct FrameWriter<'a, E: FrameEvaluator + ?Sized> {
    scene: &'a SceneDescription,
    forest: &'a SceneForest,
    evaluator: &'a E,
    skin: &'a SkinBindings,
    config: &'a ExportConfig,
}

impl<'a, E: FrameEvaluator + ?Sized> FrameWriter<'a, E> {
    /// Writer over `forest`, reading transforms from `evaluator`
    pub fn new(
        scene: &'a SceneDescription,
        forest: &'a SceneForest,
        evaluator: &'a E,
        skin: &'a SkinBindings,
        config: &'a ExportConfig,
    ) -> Self {
        Self {
            scene,
            forest,
            evaluator,
            skin,
            config,
        }
    }

    fn node(&self, id: NodeId) -> Result<&'a SceneNode> {
        self.forest
            .get(id)
            .ok_or_else(|| Error::internal(format!("node {id} is not in the export forest")))
    }

    fn armature(&self, name: &str) -> Result<&'a ArmatureData> {
        self.scene
            .object(name)
            .and_then(|o| o.armature.as_ref())
            .ok_or_else(|| Error::invalid_scene(format!("'{name}' is not an armature")))
    }

    /// Bone matrix in armature space, rest or posed as the armature says
    fn bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f32>> {
        let data = self.armature(armature)?;
        match data.pose_position {
            PosePosition::Rest => data
                .bone(bone)
                .map(|b| rows_to_matrix(&b.matrix_local))
                .ok_or_else(|| Error::invalid_scene(format!("armature '{armature}' has no bone '{bone}'"))),
            PosePosition::Pose => self.evaluator.pose_bone_matrix(armature, bone),
        }
    }

    /// World matrix of a node at the evaluator's frame
    pub fn world_matrix(&self, id: NodeId) -> Result<Matrix4<f32>> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Bone { armature, bone } => {
                Ok(self.evaluator.object_world_matrix(armature)? * self.bone_matrix(armature, bone)?)
            }
            _ => self.evaluator.object_world_matrix(&node.name),
        }
    }

    /// Transform written into the node's `FrameTransformMatrix`
    ///
    /// Objects are relative to their frame parent, or in world space at the
    /// root. Bones are relative to their skeletal parent, and root bones
    /// carry the armature's world matrix.
    pub fn local_matrix(&self, id: NodeId) -> Result<Matrix4<f32>> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Bone { armature, bone } => {
                let data = self.armature(armature)?;
                let own = self.bone_matrix(armature, bone)?;
                let base = match data.bone(bone).and_then(|b| b.parent.as_deref()) {
                    Some(parent) => inverse_or_identity(&self.bone_matrix(armature, parent)?),
                    None => self.evaluator.object_world_matrix(armature)?,
                };
                Ok(base * own)
            }
            _ => {
                let world = self.evaluator.object_world_matrix(&node.name)?;
                match node.parent() {
                    Some(parent) => Ok(inverse_or_identity(&self.world_matrix(parent)?) * world),
                    None => Ok(world),
                }
            }
        }
    }

    /// Write every root and its subtree
    pub fn write_roots<W: Write>(&self, out: &mut XWriter<W>) -> Result<()> {
        for root in self.forest.roots() {
            self.write_node(out, root)?;
        }
        Ok(())
    }

    /// Write the frame of `id` and its subtree
    pub fn write_node<W: Write>(&self, out: &mut XWriter<W>, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        tracing::debug!(node = %node.name, kind = node.kind.label(), "writing frame");
        let safe = node.safe_name.as_str();

        out.write(&format!("Frame frm-{safe} {{\n"))?;
        out.indent();

        if !node.kind.is_bone() {
            let attach = self.scene.object(&node.name).and_then(|o| o.attach_xml.as_deref());
            if let Some(xml) = attach.filter(|x| !x.is_empty()) {
                write_part_data(out, xml)?;
            }
        }

        out.write("FrameTransformMatrix {\n")?;
        out.indent();
        write_matrix(out, &self.local_matrix(id)?)?;
        out.unindent();
        out.write("}\n")?;

        match &node.kind {
            NodeKind::Mesh => {
                let object = self
                    .scene
                    .object(&node.name)
                    .ok_or_else(|| Error::UnknownObject { name: node.name.clone() })?;
                let snapshot = MeshSnapshot::capture(self.scene, object, self.config.apply_modifiers)?;
                write_mesh(out, self.scene, object, safe, &snapshot, self.skin.for_mesh(&node.name), self.config)?;
            }
            NodeKind::Bone { .. } => {
                for record in ["BoneInfo", "AnimLinkName"] {
                    out.write(&format!("{record} {{\n"))?;
                    out.indent();
                    out.write(&format!("\"{safe}\";\n"))?;
                    out.unindent();
                    out.write("}\n")?;
                }
            }
            NodeKind::Empty | NodeKind::Armature => {
                out.write(&format!("AnimLinkName {{ \"{safe}\"; }}\n"))?;
            }
        }

        for child in self.forest.sorted_children(id) {
            self.write_node(out, child)?;
        }

        out.unindent();
        out.write(&format!("}} // End of frm-{safe}\n"))
    }
}

/// Attach point payload, one character code per entry plus a terminator
pub fn write_part_data<W: Write>(out: &mut XWriter<W>, xml: &str) -> Result<()> {
    out.write("PartData {\n")?;
    out.indent();
    out.write(&format!("{};\n", xml.chars().count() + 1))?;
    for (i, c) in xml.chars().enumerate() {
        let code = format!("{}, ", u32::from(c));
        if i % 10 == 0 {
            out.write(&code)?;
        } else {
            out.write_raw(&code)?;
        }
        if i % 10 == 9 {
            out.write_raw("\n")?;
        }
    }
    out.write_raw("0;\n")?;
    out.unindent();
    out.write("}  // End PartData\n")
}
