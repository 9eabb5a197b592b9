//! End-to-end export tests
//!
//! These tests run the whole exporter against small scene snapshots and
//! inspect the written files:
//! - frame layout and mesh counts
//! - selection and hierarchy outline
//! - animation sampling and the `.xanim` library
//! - skin weights against flattened bones
//! - configuration failures that must leave nothing on disk

use std::path::{Path, PathBuf};

use fsxport_core::{Error, ExportConfig, ModelIdentity};
use fsxport_export::XExporter;
use fsxport_scene::{SceneDescription, SnapshotEvaluator};

const GUID: &str = "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9";

/// Helper to create a configuration writing into `dir`
fn make_config(dir: &Path) -> ExportConfig {
    ExportConfig {
        output_path: dir.join("model.x"),
        export_skin_weights: false,
        export_animation: false,
        export_selection: false,
        model: ModelIdentity {
            guid: GUID.to_string(),
            friendly_name: "Test model".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to run an export and read the scene file back
fn run_export(scene: &SceneDescription, config: ExportConfig) -> (fsxport_export::ExportReport, String) {
    let path = config.output_path.clone();
    let mut eval = SnapshotEvaluator::new(scene);
    let report = XExporter::new(config).export(scene, &mut eval).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    (report, text)
}

fn scene(json: &str) -> SceneDescription {
    SceneDescription::from_json_str(json).unwrap()
}

/// Trimmed lines of the scene file
fn lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

/// The line following the first line equal to `marker`
fn line_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let lines = lines(text);
    let at = lines.iter().position(|l| *l == marker)?;
    lines.get(at + 1).copied()
}

const SINGLE_MESH: &str = r#"{
    "application": "Blender 3.6.2",
    "objects": [
        {"name": "Pad", "type": "MESH",
         "mesh": {"vertices": [{"co": [0,0,0]}, {"co": [1,0,0]}, {"co": [1,1,0]}, {"co": [0,1,0]}],
                  "polygons": [{"vertices": [0, 1, 2, 3], "use_smooth": false}]}}
    ]
}"#;

const NESTED: &str = r#"{
    "objects": [
        {"name": "Base", "type": "EMPTY"},
        {"name": "Lid", "type": "MESH", "parent": "Base", "selected": true,
         "mesh": {"vertices": [{"co": [0,0,0]}, {"co": [1,0,0]}, {"co": [0,1,0]}],
                  "polygons": [{"vertices": [0, 1, 2]}]}}
    ]
}"#;

const ANIMATED: &str = r#"{
    "objects": [
        {"name": "Flap", "type": "EMPTY", "anim_tag": "flap_move",
         "animation": {"fcurves": [
            {"data_path": "rotation_euler", "array_index": 2,
             "keyframes": [{"frame": 0, "value": 0.0}, {"frame": 24, "value": 1.5707964}]}
         ]}}
    ]
}"#;

const MODELDEF: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<ModelInfo>
    <Animation name="flap_move" guid="11111111-2222-3333-4444-555555555555" type="Sim" typeParam="AutoPlay" />
    <Animation name="gear_move" length="100" type="Sim" />
    <Animation name="hatch_move" type="Sim" />
</ModelInfo>
"#;

const SKINNED: &str = r#"{
    "objects": [
        {"name": "Rig", "type": "ARMATURE",
         "armature": {
            "bones": [
                {"name": "Hip"},
                {"name": "Knee", "parent": "Hip",
                 "matrix_local": [[1,0,0,0],[0,1,0,1],[0,0,1,0],[0,0,0,1]]}
            ],
            "pose": [{"name": "Hip"}, {"name": "Knee"}]
         }},
        {"name": "Leg", "type": "MESH", "parent": "Rig",
         "vertex_groups": ["Hip", "Knee", "Unrelated"],
         "modifiers": [{"type": "ARMATURE", "object": "Rig"}],
         "mesh": {"vertices": [
                    {"co": [0,0,0], "groups": [{"group": 0, "weight": 1.0}]},
                    {"co": [1,0,0], "groups": [{"group": 0, "weight": 0.5}, {"group": 1, "weight": 0.5}]},
                    {"co": [0,1,0], "groups": [{"group": 1, "weight": 0.75}, {"group": 2, "weight": 0.25}]}],
                  "polygons": [{"vertices": [0, 1, 2]}]}}
    ]
}"#;

mod layout_tests {
    use super::*;

    #[test]
    fn test_single_mesh_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (report, text) = run_export(&scene(SINGLE_MESH), make_config(dir.path()));

        assert_eq!(report.nodes, 1);
        assert_eq!(report.roots, vec!["Pad".to_string()]);
        assert!(text.starts_with("xof 0302txt 0032\n"));

        let lines = lines(&text);
        let frames: Vec<&&str> = lines.iter().filter(|l| l.starts_with("Frame frm-Pad")).collect();
        assert_eq!(frames.len(), 1);

        let master = lines.iter().position(|l| l.starts_with("Frame frm-MasterScale")).unwrap();
        let axis = lines.iter().position(|l| l.starts_with("Frame RotateAroundX")).unwrap();
        let pad = lines.iter().position(|l| l.starts_with("Frame frm-Pad")).unwrap();
        let close = lines.iter().position(|l| *l == "} // End of frm-RotateAroundX").unwrap();
        assert!(master < axis && axis < pad && pad < close);
    }

    #[test]
    fn test_mesh_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (_, text) = run_export(&scene(SINGLE_MESH), make_config(dir.path()));

        // Quad is fanned into two triangles over the shared vertices
        assert_eq!(line_after(&text, "Mesh { // Pad mesh"), Some("4;"));
        assert_eq!(line_after(&text, "2;"), Some("3;2,1,0;,"));
        assert!(text.contains("3;3,2,0;;"));
        assert!(text.contains("AnimLinkName { \"Pad\"; }"));
    }

    #[test]
    fn test_identity_transform() {
        let dir = tempfile::tempdir().unwrap();
        let (_, text) = run_export(&scene(SINGLE_MESH), make_config(dir.path()));

        let lines = lines(&text);
        let pad = lines.iter().position(|l| l.starts_with("Frame frm-Pad")).unwrap();
        let matrix = pad + lines[pad..].iter().position(|l| *l == "FrameTransformMatrix {").unwrap();
        assert_eq!(lines[matrix + 1], "1.000000, 0.000000, 0.000000, 0.000000,");
        assert_eq!(lines[matrix + 2], "0.000000, 1.000000, 0.000000, 0.000000,");
        assert_eq!(lines[matrix + 3], "0.000000, 0.000000, 1.000000, 0.000000,");
        assert_eq!(lines[matrix + 4], "0.000000, 0.000000, 0.000000, 1.000000;;");
    }

    #[test]
    fn test_guid_record() {
        let dir = tempfile::tempdir().unwrap();
        let (_, text) = run_export(&scene(SINGLE_MESH), make_config(dir.path()));
        assert!(text.contains(&format!("\"{{{GUID}}}\";")));
        assert!(text.contains("\"Test_model\";"));
    }
}

mod selection_tests {
    use super::*;

    #[test]
    fn test_selected_child_becomes_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.export_selection = true;
        let (report, text) = run_export(&scene(NESTED), config);

        assert_eq!(report.pruned, vec!["Base".to_string()]);
        assert_eq!(report.roots, vec!["Lid".to_string()]);
        assert!(!text.contains("frm-Base"));

        let outline: Vec<&str> = text
            .lines()
            .skip_while(|l| !l.starts_with("// Scene_Root"))
            .skip(1)
            .take_while(|l| !l.is_empty())
            .collect();
        assert_eq!(outline, vec!["//   Lid"]);
    }

    #[test]
    fn test_full_hierarchy_without_selection() {
        let dir = tempfile::tempdir().unwrap();
        let (report, text) = run_export(&scene(NESTED), make_config(dir.path()));

        assert!(report.pruned.is_empty());
        assert_eq!(report.roots, vec!["Base".to_string()]);
        assert!(text.contains("//   Base\n//     Lid\n"));

        let base = text.find("Frame frm-Base {").unwrap();
        let lid = text.find("Frame frm-Lid {").unwrap();
        let base_end = text.find("} // End of frm-Base").unwrap();
        assert!(base < lid && lid < base_end);
    }
}

mod animation_tests {
    use super::*;

    fn animated_config(dir: &Path) -> ExportConfig {
        let modeldef = dir.join("modeldef.xml");
        std::fs::write(&modeldef, MODELDEF).unwrap();
        let mut config = make_config(dir);
        config.export_animation = true;
        config.modeldef_path = Some(modeldef);
        config
    }

    #[test]
    fn test_keys_at_curve_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (report, _) = run_export(&scene(ANIMATED), animated_config(dir.path()));

        assert_eq!(report.animations.len(), 1);
        let flap = &report.animations[0];
        assert_eq!(flap.part, "Flap");
        assert_eq!(flap.tag, "flap_move");
        assert_eq!(flap.key_range, 24.0);
        assert_eq!(flap.keys, 2);
    }

    #[test]
    fn test_xanim_written() {
        let dir = tempfile::tempdir().unwrap();
        let (report, _) = run_export(&scene(ANIMATED), animated_config(dir.path()));

        let path: PathBuf = report.xanim_path.unwrap();
        assert_eq!(path, dir.path().join("model.xanim"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("<AnimLib version=\"9.1\">"));
        assert!(text.contains("name=\"flap_move\""));
        assert!(text.contains("length=\"24.000000\""));
        assert!(text.contains("partName=\"Flap\""));
        assert!(text.contains("<Keyframe time=\"0.000000\""));
        assert!(text.contains("<Keyframe time=\"24.000000\""));
        assert!(!text.contains("gear_move"));
    }

    #[test]
    fn test_zero_range_tag_has_no_streams() {
        let dir = tempfile::tempdir().unwrap();
        let json = ANIMATED.replace(
            r#"{"name": "Flap", "type": "EMPTY""#,
            r#"{"name": "Hatch", "type": "EMPTY", "anim_tag": "hatch_move", "anim_length": "0-0"},
        {"name": "Flap", "type": "EMPTY""#,
        );
        let (report, _) = run_export(&scene(&json), animated_config(dir.path()));

        let parts: Vec<&str> = report.animations.iter().map(|a| a.part.as_str()).collect();
        assert_eq!(parts, vec!["Flap"]);
        let text = std::fs::read_to_string(report.xanim_path.unwrap()).unwrap();
        assert!(text.contains("name=\"hatch_move\""));
        assert!(text.contains("partName=\"Flap\""));
        assert!(!text.contains("partName=\"Hatch\""));
    }

    #[test]
    fn test_untagged_scene_writes_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let (report, _) = run_export(&scene(SINGLE_MESH), animated_config(dir.path()));

        assert!(report.animations.is_empty());
        let text = std::fs::read_to_string(report.xanim_path.unwrap()).unwrap();
        assert!(!text.contains("<Anim "));
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let json = ANIMATED.replace("\"flap_move\"", "\"missing_tag\"");
        let scene = scene(&json);
        let mut eval = SnapshotEvaluator::new(&scene);
        let err = XExporter::new(animated_config(dir.path()))
            .export(&scene, &mut eval)
            .unwrap_err();
        assert!(matches!(err.root(), Error::MissingAnimationTag { .. }));
    }
}

mod skin_tests {
    use super::*;

    fn skinned_config(dir: &Path) -> ExportConfig {
        let mut config = make_config(dir);
        config.export_skin_weights = true;
        config
    }

    #[test]
    fn test_armature_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let (report, text) = run_export(&scene(SKINNED), skinned_config(dir.path()));

        assert_eq!(report.flattened, vec!["Rig".to_string()]);
        assert_eq!(report.skinned_meshes, 1);
        assert!(!text.contains("Frame frm-Rig {"));
        assert!(text.contains("Frame frm-Rig_Hip {"));
        assert!(text.contains("Frame frm-Rig_Knee {"));

        let hip = text.find("Frame frm-Rig_Hip {").unwrap();
        let knee = text.find("Frame frm-Rig_Knee {").unwrap();
        let hip_end = text.find("} // End of frm-Rig_Hip").unwrap();
        assert!(hip < knee && knee < hip_end);
    }

    #[test]
    fn test_skin_weights_block() {
        let dir = tempfile::tempdir().unwrap();
        let (_, text) = run_export(&scene(SKINNED), skinned_config(dir.path()));

        assert_eq!(line_after(&text, "MeshSkinWeights {"), Some("3;"));
        let lines = lines(&text);
        let start = lines.iter().position(|l| *l == "MeshSkinWeights {").unwrap();
        let end = lines.iter().position(|l| *l == "} // End MeshSkinWeights").unwrap();
        let block = &lines[start..end];

        assert!(block.contains(&"\"Rig_Hip\", 1.000000;"));
        assert!(block.contains(&"\"Rig_Knee\", 0.500000;"));
        // Unrelated group dropped, remaining weight renormalized
        assert!(block.contains(&"\"Rig_Knee\", 1.000000;"));
        assert!(!block.iter().any(|l| l.contains("Unrelated")));
    }

    #[test]
    fn test_weights_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let (report, text) = run_export(&scene(SKINNED), make_config(dir.path()));

        assert_eq!(report.skinned_meshes, 0);
        assert!(!text.contains("MeshSkinWeights"));
        assert!(!text.contains("frm-Rig_Hip"));
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_invalid_guid_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.model.guid = "{not-a-guid}".to_string();
        let scene = scene(SINGLE_MESH);
        let mut eval = SnapshotEvaluator::new(&scene);

        let err = XExporter::new(config).export(&scene, &mut eval).unwrap_err();
        assert!(matches!(err, Error::InvalidGuid { .. }));
        assert!(err.is_configuration_error());
        assert!(!dir.path().join("model.x").exists());
    }

    #[test]
    fn test_cyclic_skeleton_is_configuration_error() {
        let json = SKINNED.replacen(r#"{"name": "Hip"}"#, r#"{"name": "Hip", "parent": "Knee"}"#, 1);
        let err = SceneDescription::from_json_str(&json).unwrap_err();
        assert!(matches!(err, Error::ParentCycle { ref node } if node == "Rig:Hip"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_animation_without_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.export_animation = true;
        let scene = scene(ANIMATED);
        let mut eval = SnapshotEvaluator::new(&scene);

        let err = XExporter::new(config).export(&scene, &mut eval).unwrap_err();
        assert!(matches!(err, Error::MissingConfig { .. }));
        assert!(!dir.path().join("model.x").exists());
    }

    #[test]
    fn test_evaluator_frame_restored() {
        use fsxport_scene::FrameEvaluator;

        let dir = tempfile::tempdir().unwrap();
        let json = ANIMATED.replacen("{\n    \"objects\"", "{\n    \"frame_current\": 7,\n    \"objects\"", 1);
        let scene = scene(&json);
        let mut eval = SnapshotEvaluator::new(&scene);
        assert_eq!(eval.current_frame(), 7);

        XExporter::new(make_config(dir.path()))
            .export(&scene, &mut eval)
            .unwrap();
        assert_eq!(eval.current_frame(), 7);
    }
}
