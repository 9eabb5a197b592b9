//! Frame evaluation of a scene snapshot
//!
//! Exporters never read transforms straight out of the snapshot. They ask a
//! [`FrameEvaluator`] for the matrices at the current frame, which lets a
//! live host plug in its own evaluation (constraints, drivers) while tests and
//! the CLI use [`SnapshotEvaluator`].

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
use std::ops::{Deref, DerefMut};

use fsxport_core::{Error, Result};

use crate::math;
use crate::snapshot::{
    pose_bone_path, rows_to_matrix, ArmatureData, Matrix4Rows, PoseBone, PosePosition, Rotation, SceneDescription,
    SceneObject,
};

/// Transform queries at a settable frame
pub trait FrameEvaluator {
    /// Frame the evaluator currently reports
    fn current_frame(&self) -> i32;

    /// Move to `frame`
    fn set_frame(&mut self, frame: i32);

    /// Object matrix in world space
    fn object_world_matrix(&self, object: &str) -> Result<Matrix4<f32>>;

    /// Object matrix relative to its parent, parent inverse included
    fn object_local_matrix(&self, object: &str) -> Result<Matrix4<f32>>;

    /// Pose bone matrix in armature space
    fn pose_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f32>>;

    /// Pose bone basis, the animated offset from rest
    fn pose_bone_basis(&self, armature: &str, bone: &str) -> Result<Matrix4<f32>>;
}

/// Restores the evaluator's frame when dropped
pub struct FrameGuard<'a, E: FrameEvaluator + ?Sized> {
    evaluator: &'a mut E,
    original: i32,
}

impl<'a, E: FrameEvaluator + ?Sized> FrameGuard<'a, E> {
    /// Remember the current frame of `evaluator`
    pub fn new(evaluator: &'a mut E) -> Self {
        let original = evaluator.current_frame();
        Self { evaluator, original }
    }

    /// Frame that will be restored
    pub fn original_frame(&self) -> i32 {
        self.original
    }
}

impl<E: FrameEvaluator + ?Sized> Deref for FrameGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.evaluator
    }
}

impl<E: FrameEvaluator + ?Sized> DerefMut for FrameGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.evaluator
    }
}

impl<E: FrameEvaluator + ?Sized> Drop for FrameGuard<'_, E> {
    fn drop(&mut self) {
        self.evaluator.set_frame(self.original);
    }
}

/// Evaluates a [`SceneDescription`] by interpolating its keyframe curves
///
/// Baked matrices take precedence over curves; they carry constraint output
/// that the snapshot cannot reproduce.
#[derive(Debug, Clone)]
pub struct SnapshotEvaluator<'s> {
    scene: &'s SceneDescription,
    frame: i32,
}

impl<'s> SnapshotEvaluator<'s> {
    /// Start at the snapshot's current frame
    pub fn new(scene: &'s SceneDescription) -> Self {
        Self {
            scene,
            frame: scene.frame_current,
        }
    }

    /// The evaluated scene
    pub fn scene(&self) -> &'s SceneDescription {
        self.scene
    }

    fn object(&self, name: &str) -> Result<&'s SceneObject> {
        self.scene
            .object(name)
            .ok_or_else(|| Error::UnknownObject { name: name.to_string() })
    }

    fn armature(&self, name: &str) -> Result<&'s ArmatureData> {
        self.object(name)?
            .armature
            .as_ref()
            .ok_or_else(|| Error::invalid_scene(format!("'{name}' is not an armature")))
    }

    fn baked(&self, matrices: &[Matrix4Rows]) -> Option<Matrix4<f32>> {
        let last = matrices.len().checked_sub(1)?;
        let index = usize::try_from(self.frame).unwrap_or(0).min(last);
        Some(rows_to_matrix(&matrices[index]))
    }

    fn basis(&self, object: &SceneObject) -> Matrix4<f32> {
        let frame = self.frame as f32;
        let transform = &object.transform;
        let anim = object.animation.as_ref();
        let channel = |path: &str, index: usize, fallback: f32| {
            anim.and_then(|a| a.sample(path, index, frame)).unwrap_or(fallback)
        };

        let location = Vector3::from_fn(|i, _| channel("location", i, transform.location[i]));
        let scale = Vector3::from_fn(|i, _| channel("scale", i, transform.scale[i]));
        let rotation = match transform.rotation {
            Rotation::Xyz { euler } => {
                let e: [f32; 3] = std::array::from_fn(|i| channel("rotation_euler", i, euler[i]));
                math::rotation_quaternion(&Rotation::Xyz { euler: e })
            }
            Rotation::Quaternion { quaternion } => {
                let q: [f32; 4] = std::array::from_fn(|i| channel("rotation_quaternion", i, quaternion[i]));
                math::rotation_quaternion(&Rotation::Quaternion { quaternion: q })
            }
        };
        math::compose(location, &rotation, scale)
    }

    fn local(&self, object: &SceneObject) -> Matrix4<f32> {
        if let Some(baked) = self.baked(&object.baked_local) {
            return baked;
        }
        rows_to_matrix(&object.transform.parent_inverse) * self.basis(object)
    }

    fn world(&self, object: &SceneObject) -> Result<Matrix4<f32>> {
        let local = self.local(object);
        match &object.parent {
            Some(parent) => Ok(self.world(self.object(parent)?)? * local),
            None => Ok(local),
        }
    }

    fn bone_basis(&self, armature: &SceneObject, pose: &PoseBone) -> Matrix4<f32> {
        if let Some(baked) = self.baked(&pose.baked_basis) {
            return baked;
        }
        let frame = self.frame as f32;
        let channel = |property: &str, index: usize, fallback: f32| {
            armature
                .sample_pose(&pose_bone_path(&pose.name, property), index, frame)
                .unwrap_or(fallback)
        };

        let location = Vector3::from_fn(|i, _| channel("location", i, pose.location[i]));
        let scale = Vector3::from_fn(|i, _| channel("scale", i, pose.scale[i]));
        let q: [f32; 4] = std::array::from_fn(|i| channel("rotation_quaternion", i, pose.rotation_quaternion[i]));
        let rotation = UnitQuaternion::new_normalize(Quaternion::new(q[0], q[1], q[2], q[3]));
        math::compose(location, &rotation, scale)
    }

    fn bone_pose(
        &self,
        armature: &SceneObject,
        data: &ArmatureData,
        bone: &str,
        depth: usize,
    ) -> Result<Matrix4<f32>> {
        if depth > data.bones.len() {
            return Err(Error::ParentCycle {
                node: format!("{}:{bone}", armature.name),
            });
        }
        let rest_bone = data.bone(bone).ok_or_else(|| {
            Error::invalid_scene(format!("armature '{}' has no bone '{bone}'", armature.name))
        })?;
        let rest = rows_to_matrix(&rest_bone.matrix_local);
        if data.pose_position == PosePosition::Rest {
            return Ok(rest);
        }

        let basis = data
            .pose_bone(bone)
            .map(|p| self.bone_basis(armature, p))
            .unwrap_or_else(Matrix4::identity);
        match &rest_bone.parent {
            Some(parent) => {
                let parent_rest = data
                    .bone(parent)
                    .map(|b| rows_to_matrix(&b.matrix_local))
                    .unwrap_or_else(Matrix4::identity);
                let parent_pose = self.bone_pose(armature, data, parent, depth + 1)?;
                Ok(parent_pose * math::inverse_or_identity(&parent_rest) * rest * basis)
            }
            None => Ok(rest * basis),
        }
    }
}

impl FrameEvaluator for SnapshotEvaluator<'_> {
    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn object_world_matrix(&self, object: &str) -> Result<Matrix4<f32>> {
        self.world(self.object(object)?)
    }

    fn object_local_matrix(&self, object: &str) -> Result<Matrix4<f32>> {
        Ok(self.local(self.object(object)?))
    }

    fn pose_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f32>> {
        let object = self.object(armature)?;
        let data = self.armature(armature)?;
        self.bone_pose(object, data, bone, 0)
    }

    fn pose_bone_basis(&self, armature: &str, bone: &str) -> Result<Matrix4<f32>> {
        let object = self.object(armature)?;
        let data = self.armature(armature)?;
        Ok(data
            .pose_bone(bone)
            .map(|p| self.bone_basis(object, p))
            .unwrap_or_else(Matrix4::identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const ANIMATED: &str = r#"{
        "frame_current": 3,
        "objects": [
            {"name": "Parent", "type": "EMPTY", "transform": {"location": [10, 0, 0]}},
            {"name": "Child", "type": "MESH", "parent": "Parent",
             "transform": {"location": [0, 1, 0]},
             "animation": {"fcurves": [
                {"data_path": "location", "array_index": 2,
                 "keyframes": [{"frame": 0, "value": 0}, {"frame": 10, "value": 5}]}]}},
            {"name": "Rig", "type": "ARMATURE",
             "armature": {
                "bones": [
                    {"name": "Root"},
                    {"name": "Tip", "parent": "Root",
                     "matrix_local": [[1,0,0,0],[0,1,0,2],[0,0,1,0],[0,0,0,1]]}],
                "pose": [{"name": "Root"}, {"name": "Tip"}]},
             "animation": {"fcurves": [
                {"data_path": "pose.bones[\"Root\"].location", "array_index": 0,
                 "keyframes": [{"frame": 0, "value": 0}, {"frame": 4, "value": 4}]}]}}
        ]
    }"#;

    fn make_scene() -> SceneDescription {
        SceneDescription::from_json_str(ANIMATED).unwrap()
    }

    #[test]
    fn test_object_curves_and_parenting() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);
        assert_eq!(eval.current_frame(), 3);

        eval.set_frame(10);
        let world = eval.object_world_matrix("Child").unwrap();
        assert_relative_eq!(math::to_translation(&world), Vector3::new(10.0, 1.0, 5.0));

        let local = eval.object_local_matrix("Child").unwrap();
        assert_relative_eq!(math::to_translation(&local), Vector3::new(0.0, 1.0, 5.0));
    }

    #[test]
    fn test_frame_guard_restores_frame() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);
        {
            let mut guard = FrameGuard::new(&mut eval);
            guard.set_frame(42);
            assert_eq!(guard.current_frame(), 42);
            assert_eq!(guard.original_frame(), 3);
        }
        assert_eq!(eval.current_frame(), 3);
    }

    #[test]
    fn test_pose_chain_follows_parent() {
        let scene = make_scene();
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.set_frame(2);

        let root = eval.pose_bone_matrix("Rig", "Root").unwrap();
        assert_relative_eq!(math::to_translation(&root), Vector3::new(2.0, 0.0, 0.0));

        let tip = eval.pose_bone_matrix("Rig", "Tip").unwrap();
        assert_relative_eq!(math::to_translation(&tip), Vector3::new(2.0, 2.0, 0.0));

        let basis = eval.pose_bone_basis("Rig", "Root").unwrap();
        assert_relative_eq!(math::to_translation(&basis), Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_cyclic_bones_stop_recursion() {
        let mut scene = make_scene();
        if let Some(arm) = scene.objects[2].armature.as_mut() {
            arm.bones[0].parent = Some("Tip".to_string());
        }
        let eval = SnapshotEvaluator::new(&scene);
        let err = eval.pose_bone_matrix("Rig", "Tip").unwrap_err();
        assert!(matches!(err, Error::ParentCycle { .. }));
    }

    #[test]
    fn test_pose_basis_from_nla_strip() {
        let mut scene = make_scene();
        let action = scene.objects[2].animation.take().unwrap();
        scene.objects[2].nla_tracks = vec![crate::snapshot::NlaTrack {
            name: "Swing".to_string(),
            mute: false,
            strips: vec![crate::snapshot::NlaStrip {
                name: "Swing".to_string(),
                action,
            }],
        }];
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.set_frame(3);
        let basis = eval.pose_bone_basis("Rig", "Root").unwrap();
        assert_relative_eq!(math::to_translation(&basis), Vector3::new(3.0, 0.0, 0.0));

        scene.objects[2].nla_tracks[0].mute = true;
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.set_frame(3);
        let basis = eval.pose_bone_basis("Rig", "Root").unwrap();
        assert_relative_eq!(basis, Matrix4::identity());
    }

    #[test]
    fn test_rest_position_ignores_pose() {
        let mut scene = make_scene();
        if let Some(arm) = scene.objects[2].armature.as_mut() {
            arm.pose_position = PosePosition::Rest;
        }
        let mut eval = SnapshotEvaluator::new(&scene);
        eval.set_frame(4);
        let root = eval.pose_bone_matrix("Rig", "Root").unwrap();
        assert_relative_eq!(root, Matrix4::identity());
    }

    #[test]
    fn test_baked_local_overrides_curves() {
        let mut scene = make_scene();
        let turned = math::compose(
            Vector3::zeros(),
            &UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
            Vector3::repeat(1.0),
        );
        scene.objects[0].baked_local = vec![crate::snapshot::matrix_to_rows(&turned)];

        let mut eval = SnapshotEvaluator::new(&scene);
        eval.set_frame(7);
        let parent = eval.object_world_matrix("Parent").unwrap();
        assert_relative_eq!(parent, turned, epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_object() {
        let scene = make_scene();
        let eval = SnapshotEvaluator::new(&scene);
        assert!(matches!(
            eval.object_world_matrix("Nope"),
            Err(Error::UnknownObject { .. })
        ));
    }
}
