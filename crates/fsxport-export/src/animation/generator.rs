//! Key sampling for tagged objects and bones

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};

use fsxport_core::{Error, Result};
use fsxport_scene::math::{inverse_or_identity, rotation_difference, to_3x3, to_quaternion, to_translation};
use fsxport_scene::snapshot::{pose_bone_path, AnimationData, FCurve};
use fsxport_scene::{FrameEvaluator, FrameGuard, NodeKind, SceneDescription, SceneForest, SceneObject};

use super::Animation;
use crate::modeldef::{AnimationDef, ModelDef};

/// Curve paths that drive object keys
const OBJECT_CHANNELS: [&str; 2] = ["location", "rotation_euler"];

/// Curve properties that drive bone keys
const BONE_CHANNELS: [&str; 2] = ["rotation_quaternion", "location"];

/// Upper bound on per-frame sampling
pub const MAX_DENSE_FRAMES: i32 = 100_000;

/// Tags used by the export list, in first-seen order
pub fn animation_tags(scene: &SceneDescription, forest: &SceneForest) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for id in forest.export_list() {
        let Some(node) = forest.get(id) else {
            continue;
        };
        let tag = match &node.kind {
            NodeKind::Bone { armature, bone } => scene
                .object(armature)
                .and_then(|o| o.armature.as_ref())
                .and_then(|a| a.pose_bone(bone))
                .and_then(|p| p.anim_tag.as_deref()),
            _ => scene.object(&node.name).and_then(SceneObject::tag),
        };
        if let Some(tag) = tag.filter(|t| !t.is_empty()) {
            if !tags.iter().any(|t| t == tag) {
                tracing::info!(node = %node.name, tag, "animation found");
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Run the generator of every node in the export list
///
/// Meshes and empties use the object generator. Bones use the bone
/// generator when `with_bones` is set. Armatures have none.
pub fn generate_all<E: FrameEvaluator + ?Sized>(
    evaluator: &mut E,
    scene: &SceneDescription,
    forest: &SceneForest,
    modeldef: &ModelDef,
    with_bones: bool,
) -> Result<Vec<Animation>> {
    let mut animations = Vec::new();
    for id in forest.export_list() {
        let Some(node) = forest.get(id) else {
            continue;
        };
        let generated = match &node.kind {
            NodeKind::Empty | NodeKind::Mesh => {
                let object = scene
                    .object(&node.name)
                    .ok_or_else(|| Error::UnknownObject { name: node.name.clone() })?;
                generate_object(evaluator, object, &node.safe_name, modeldef)?
            }
            NodeKind::Bone { armature, bone } if with_bones => {
                let object = scene
                    .object(armature)
                    .ok_or_else(|| Error::UnknownObject { name: armature.clone() })?;
                generate_bone(evaluator, object, bone, &node.safe_name, modeldef)?
            }
            _ => None,
        };
        if let Some(animation) = generated {
            tracing::debug!(
                part = %animation.safe_name,
                tag = %animation.tag,
                keys = animation.rotation_keys.len(),
                range = animation.key_range,
                "generated animation"
            );
            animations.push(animation);
        }
    }
    Ok(animations)
}

/// Sample a tagged mesh or empty
///
/// Keys hold the change from the frame-0 local transform. Objects with
/// constraints or without curves are sampled on every frame of the
/// animation length, others only on their location and rotation keyframes.
pub fn generate_object<E: FrameEvaluator + ?Sized>(
    evaluator: &mut E,
    object: &SceneObject,
    safe_name: &str,
    modeldef: &ModelDef,
) -> Result<Option<Animation>> {
    let Some(tag) = object.tag() else {
        return Ok(None);
    };
    let mut guard = FrameGuard::new(evaluator);
    guard.set_frame(0);
    let base = guard.object_local_matrix(&object.name)?;
    let base_rotation = to_quaternion(&base);
    let base_position = to_translation(&base);

    let mut animation = Animation::new(safe_name, tag);

    match &object.animation {
        Some(data) if !object.has_constraints() => {
            for curve in data.fcurves.iter().filter(|c| OBJECT_CHANNELS.contains(&c.data_path.as_str())) {
                for key in &curve.keyframes {
                    let frame = key.frame as i32;
                    if !animation.has_frame(frame) {
                        let (rotation, position) =
                            sample_object(&mut *guard, &object.name, frame, &base_rotation, &base_position)?;
                        animation.insert(frame, rotation, position);
                    }
                }
                animation.key_range = animation.key_range.max(curve.range().1);
            }
        }
        data => {
            let range = dense_range(
                modeldef.animation(tag),
                data.as_ref().and_then(AnimationData::max_frame),
                object.anim_length.as_deref(),
                &object.name,
            )?;
            animation.key_range = range as f32;
            for frame in 0..=range {
                let (rotation, position) =
                    sample_object(&mut *guard, &object.name, frame, &base_rotation, &base_position)?;
                animation.insert(frame, rotation, position);
            }
        }
    }

    Ok(animation.is_exportable().then_some(animation))
}

/// Sample a tagged bone of `armature`
///
/// Bones with constraints are sampled on every frame and keyed relative to
/// their frame-0 pose. Others are keyed from their pose basis on the
/// rotation and location keyframes of their curves. The curves come from the
/// active action, or from the unmuted NLA tracks when there is none.
pub fn generate_bone<E: FrameEvaluator + ?Sized>(
    evaluator: &mut E,
    armature: &SceneObject,
    bone: &str,
    safe_name: &str,
    modeldef: &ModelDef,
) -> Result<Option<Animation>> {
    let data = armature
        .armature
        .as_ref()
        .ok_or_else(|| Error::invalid_scene(format!("'{}' is not an armature", armature.name)))?;
    let Some(pose) = data.pose_bone(bone) else {
        return Ok(None);
    };
    let Some(tag) = pose.anim_tag.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let parent = data.bone(bone).and_then(|b| b.parent.as_deref());

    let mut guard = FrameGuard::new(evaluator);
    guard.set_frame(0);
    let base = relative_pose(&*guard, &armature.name, bone, parent)?;
    let base_rotation = to_quaternion(&base);
    let base_position = to_translation(&base);
    let base_3x3 = to_3x3(&base);

    let mut animation = Animation::new(safe_name, tag);
    let curves = armature.pose_curves();

    if !pose.constraints.is_empty() {
        let extent = bone_curves(&curves, bone).map(|c| c.range().1).reduce(f32::max);
        let range = dense_range(
            modeldef.animation(tag),
            extent,
            pose.anim_length.as_deref(),
            &format!("{}:{bone}", armature.name),
        )?;
        animation.key_range = range as f32;
        for frame in 0..=range {
            guard.set_frame(frame);
            let current = relative_pose(&*guard, &armature.name, bone, parent)?;
            let delta = rotation_difference(&base_rotation, &to_quaternion(&current));
            let rotation = (-delta.into_inner()).conjugate();
            animation.insert(frame, rotation, to_translation(&current) - base_position);
        }
    } else if !curves.is_empty() {
        let paths: Vec<String> = BONE_CHANNELS.iter().map(|p| pose_bone_path(bone, p)).collect();
        for curve in curves.iter().filter(|c| paths.contains(&c.data_path)) {
            for key in &curve.keyframes {
                let frame = key.frame as i32;
                if animation.has_frame(frame) {
                    continue;
                }
                guard.set_frame(frame);
                let basis = guard.pose_bone_basis(&armature.name, bone)?;
                let rotation = to_quaternion(&basis).into_inner().conjugate();
                animation.insert(frame, rotation, base_3x3 * to_translation(&basis));
            }
            animation.key_range = animation.key_range.max(curve.range().1);
        }
    } else {
        tracing::debug!(armature = %armature.name, bone, "bone is tagged but the armature has no curves");
    }

    Ok(animation.is_exportable().then_some(animation))
}

/// Change of the object's local transform from the frame-0 base
fn sample_object<E: FrameEvaluator + ?Sized>(
    evaluator: &mut E,
    object: &str,
    frame: i32,
    base_rotation: &UnitQuaternion<f32>,
    base_position: &Vector3<f32>,
) -> Result<(Quaternion<f32>, Vector3<f32>)> {
    evaluator.set_frame(frame);
    let current = evaluator.object_local_matrix(object)?;
    let rotation = rotation_difference(&to_quaternion(&current), base_rotation);
    Ok((rotation.into_inner(), to_translation(&current) - base_position))
}

/// Pose matrix relative to the parent pose, or in armature space for roots
fn relative_pose<E: FrameEvaluator + ?Sized>(
    evaluator: &E,
    armature: &str,
    bone: &str,
    parent: Option<&str>,
) -> Result<Matrix4<f32>> {
    let pose = evaluator.pose_bone_matrix(armature, bone)?;
    match parent {
        Some(parent) => Ok(inverse_or_identity(&evaluator.pose_bone_matrix(armature, parent)?) * pose),
        None => Ok(pose),
    }
}

/// Curves of any property of pose bone `bone`
fn bone_curves<'a>(curves: &'a [&'a FCurve], bone: &str) -> impl Iterator<Item = &'a FCurve> + 'a {
    let prefix = format!("pose.bones[\"{bone}\"].");
    curves
        .iter()
        .copied()
        .filter(move |c| c.data_path.starts_with(&prefix) && !c.keyframes.is_empty())
}

/// Frame count for per-frame sampling
///
/// The dictionary length wins, then the last keyframe of the curves, then
/// the last `-` separated field of the manual length text. Lengths above
/// [`MAX_DENSE_FRAMES`] are capped.
fn dense_range(def: Option<&AnimationDef>, curve_extent: Option<f32>, manual: Option<&str>, object: &str) -> Result<i32> {
    let range = if let Some(length) = def.and_then(AnimationDef::length) {
        i32::try_from(length).unwrap_or(i32::MAX)
    } else if let Some(extent) = curve_extent {
        extent as i32
    } else {
        manual
            .and_then(|text| text.split('-').last())
            .and_then(|field| field.trim().parse().ok())
            .ok_or_else(|| Error::AnimationLength {
                object: object.to_string(),
            })?
    };
    if range > MAX_DENSE_FRAMES {
        tracing::warn!(object, range, limit = MAX_DENSE_FRAMES, "animation length capped");
        return Ok(MAX_DENSE_FRAMES);
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fsxport_scene::snapshot::{Keyframe, NlaStrip, NlaTrack};
    use fsxport_scene::SnapshotEvaluator;

    const DICT: &str = r#"<ModelInfo>
        <Animation name="flap" type="Sim" />
        <Animation name="door" length="10" type="Sim" />
        <Animation name="boom" type="Sim" />
        <Animation name="spin" type="Standard" />
        <Animation name="endless" length="2000000000" type="Sim" />
    </ModelInfo>"#;

    const SCENE: &str = r#"{
        "frame_current": 7,
        "objects": [
            {"name": "Flap", "type": "EMPTY", "anim_tag": "flap",
             "animation": {"fcurves": [
                {"data_path": "rotation_euler", "array_index": 0,
                 "keyframes": [{"frame": 0, "value": 0}, {"frame": 24, "value": 1.0}]}]}},
            {"name": "Door", "type": "EMPTY", "anim_tag": "door", "constraints": ["COPY_ROTATION"],
             "transform": {"location": [1, 0, 0]}},
            {"name": "Fan", "type": "EMPTY", "anim_tag": "spin", "anim_length": "0-5"},
            {"name": "Lost", "type": "EMPTY", "anim_tag": "spin"},
            {"name": "Plain", "type": "EMPTY"},
            {"name": "Idle", "type": "EMPTY", "anim_tag": "spin", "anim_length": "0-0"},
            {"name": "Pinned", "type": "EMPTY", "anim_tag": "flap",
             "animation": {"fcurves": [
                {"data_path": "location", "array_index": 0, "keyframes": [{"frame": 0, "value": 1.0}]}]}},
            {"name": "Rig", "type": "ARMATURE",
             "armature": {
                "pose_position": "POSE",
                "bones": [{"name": "Root"}, {"name": "Arm", "parent": "Root"}],
                "pose": [{"name": "Root", "anim_tag": "boom"},
                         {"name": "Arm", "anim_tag": "door", "constraints": ["IK"]}]},
             "animation": {"fcurves": [
                {"data_path": "pose.bones[\"Root\"].location", "array_index": 0,
                 "keyframes": [{"frame": 0, "value": 0}, {"frame": 4, "value": 4}]},
                {"data_path": "pose.bones[\"Arm\"].location", "array_index": 1,
                 "keyframes": [{"frame": 0, "value": 0}, {"frame": 10, "value": 5}]}]}}
        ]
    }"#;

    fn setup() -> (SceneDescription, ModelDef) {
        (SceneDescription::from_json_str(SCENE).unwrap(), ModelDef::parse(DICT).unwrap())
    }

    #[test]
    fn test_sparse_rotation_keys() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_object(&mut eval, scene.object("Flap").unwrap(), "Flap", &dict)
            .unwrap()
            .unwrap();

        assert_eq!(anim.tag, "flap");
        assert_relative_eq!(anim.key_range, 24.0);
        assert_eq!(anim.rotation_keys.keys().copied().collect::<Vec<_>>(), vec![0, 24]);
        assert_eq!(anim.position_keys.keys().copied().collect::<Vec<_>>(), vec![0, 24]);
        assert_relative_eq!(anim.rotation_keys[&0].w, 1.0, epsilon = 1e-6);
        assert_relative_eq!(anim.rotation_keys[&24].w, 0.5f32.cos(), epsilon = 1e-5);
        assert_relative_eq!(anim.rotation_keys[&24].i.abs(), 0.5f32.sin(), epsilon = 1e-5);
        assert_eq!(eval.current_frame(), 7);
    }

    #[test]
    fn test_dense_uses_dictionary_length() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_object(&mut eval, scene.object("Door").unwrap(), "Door", &dict)
            .unwrap()
            .unwrap();
        assert_relative_eq!(anim.key_range, 10.0);
        assert_eq!(anim.rotation_keys.len(), 11);
        assert_relative_eq!(anim.position_keys[&5], Vector3::zeros());
    }

    #[test]
    fn test_dense_manual_length() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_object(&mut eval, scene.object("Fan").unwrap(), "Fan", &dict)
            .unwrap()
            .unwrap();
        assert_relative_eq!(anim.key_range, 5.0);
        assert_eq!(anim.rotation_keys.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_undeterminable_length() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let err = generate_object(&mut eval, scene.object("Lost").unwrap(), "Lost", &dict).unwrap_err();
        assert!(matches!(err, Error::AnimationLength { ref object } if object == "Lost"));
        assert!(err.is_configuration_error());
        assert_eq!(eval.current_frame(), 7);
    }

    #[test]
    fn test_untagged_object() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        assert!(generate_object(&mut eval, scene.object("Plain").unwrap(), "Plain", &dict)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_range_is_dropped() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        assert!(generate_object(&mut eval, scene.object("Idle").unwrap(), "Idle", &dict)
            .unwrap()
            .is_none());
        assert!(generate_object(&mut eval, scene.object("Pinned").unwrap(), "Pinned", &dict)
            .unwrap()
            .is_none());
        assert_eq!(eval.current_frame(), 7);
    }

    #[test]
    fn test_dense_range_is_capped() {
        let dict = ModelDef::parse(DICT).unwrap();
        let range = dense_range(dict.animation("endless"), None, None, "Prop").unwrap();
        assert_eq!(range, MAX_DENSE_FRAMES);
        assert_eq!(dense_range(None, Some(12.0), Some("0-99"), "Prop").unwrap(), 12);
        assert_eq!(dense_range(None, None, Some("3-40"), "Prop").unwrap(), 40);
    }

    #[test]
    fn test_bone_keys_from_nla_tracks() {
        let (mut scene, dict) = setup();
        let rig = scene.objects.iter_mut().find(|o| o.name == "Rig").unwrap();
        let action = rig.animation.take().unwrap();
        rig.nla_tracks = vec![
            NlaTrack {
                name: "Muted".to_string(),
                mute: true,
                strips: vec![NlaStrip {
                    name: "Muted".to_string(),
                    action: AnimationData {
                        fcurves: vec![FCurve {
                            data_path: pose_bone_path("Root", "location"),
                            array_index: 0,
                            keyframes: vec![Keyframe { frame: 30.0, value: 9.0 }],
                        }],
                    },
                }],
            },
            NlaTrack {
                name: "Boom".to_string(),
                mute: false,
                strips: vec![NlaStrip {
                    name: "Boom".to_string(),
                    action,
                }],
            },
        ];

        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_bone(&mut eval, scene.object("Rig").unwrap(), "Root", "Rig_Root", &dict)
            .unwrap()
            .unwrap();
        assert_relative_eq!(anim.key_range, 4.0);
        assert_eq!(anim.position_keys.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_relative_eq!(anim.position_keys[&4], Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-6);

        let dense = generate_bone(&mut eval, scene.object("Rig").unwrap(), "Arm", "Rig_Arm", &dict)
            .unwrap()
            .unwrap();
        assert_eq!(dense.rotation_keys.len(), 11);
        assert_eq!(eval.current_frame(), 7);
    }

    #[test]
    fn test_sparse_bone_keys() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_bone(&mut eval, scene.object("Rig").unwrap(), "Root", "Rig_Root", &dict)
            .unwrap()
            .unwrap();
        assert_eq!(anim.tag, "boom");
        assert_relative_eq!(anim.key_range, 4.0);
        assert_eq!(anim.position_keys.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_relative_eq!(anim.position_keys[&4], Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(anim.rotation_keys[&4].w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_dense_bone_keys() {
        let (scene, dict) = setup();
        let mut eval = SnapshotEvaluator::new(&scene);
        let anim = generate_bone(&mut eval, scene.object("Rig").unwrap(), "Arm", "Rig_Arm", &dict)
            .unwrap()
            .unwrap();
        assert_relative_eq!(anim.key_range, 10.0);
        assert_eq!(anim.rotation_keys.len(), 11);
        assert_relative_eq!(anim.position_keys[&2], Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(anim.rotation_keys[&2].w, -1.0, epsilon = 1e-6);
        assert_eq!(eval.current_frame(), 7);
    }

    #[test]
    fn test_generate_all_and_tags() {
        let mut scene = SceneDescription::from_json_str(SCENE).unwrap();
        scene.objects.retain(|o| o.name != "Lost");
        let dict = ModelDef::parse(DICT).unwrap();
        let mut forest = SceneForest::build(&scene, true).unwrap();
        fsxport_scene::flatten_armatures(&mut forest);

        let tags = animation_tags(&scene, &forest);
        assert_eq!(tags, vec!["door", "spin", "flap", "boom"]);

        let mut eval = SnapshotEvaluator::new(&scene);
        let all = generate_all(&mut eval, &scene, &forest, &dict, true).unwrap();
        let parts: Vec<&str> = all.iter().map(|a| a.safe_name.as_str()).collect();
        assert_eq!(parts, vec!["Door", "Fan", "Flap", "Rig_Arm", "Rig_Root"]);

        let without_bones = generate_all(&mut eval, &scene, &forest, &dict, false).unwrap();
        assert_eq!(without_bones.len(), 3);
    }
}
