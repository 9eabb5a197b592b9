//! Armature removal before writing
//!
//! Armatures never become frames. Once skin bindings have been captured
//! their wrapper nodes are taken out and their children hoisted to the
//! armature's current parent in the forest.

use crate::index::{NodeKind, SceneForest};

/// Remove every armature node, returning the removed names
pub fn flatten_armatures(forest: &mut SceneForest) -> Vec<String> {
    let armatures: Vec<_> = forest
        .nodes()
        .filter(|(_, n)| n.kind == NodeKind::Armature)
        .map(|(id, _)| id)
        .collect();

    let mut removed = Vec::with_capacity(armatures.len());
    for id in armatures {
        let Some(node) = forest.get(id) else {
            continue;
        };
        let parent = node.parent();
        let children = node.children().to_vec();

        forest.detach(id);
        for child in children {
            forest.set_parent(child, parent);
        }
        if let Some(node) = forest.remove(id) {
            tracing::debug!(armature = %node.name, "flattened armature");
            removed.push(node.name);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::prune;
    use crate::snapshot::SceneDescription;

    const SCENE: &str = r#"{
        "objects": [
            {"name": "Plane", "type": "EMPTY", "selected": true},
            {"name": "Hull", "type": "EMPTY", "parent": "Plane"},
            {"name": "Rig", "type": "ARMATURE", "parent": "Hull", "selected": true,
             "armature": {"bones": [{"name": "Strut"}]}},
            {"name": "Wheel", "type": "MESH", "parent": "Rig", "selected": true},
            {"name": "Tire", "type": "MESH", "parent": "Rig", "selected": true}
        ]
    }"#;

    #[test]
    fn test_children_move_to_armature_parent() {
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let mut forest = SceneForest::build(&scene, false).unwrap();

        assert_eq!(flatten_armatures(&mut forest), vec!["Rig"]);
        let hull = forest.object_id("Hull").unwrap();
        let kids = forest.sorted_children(hull);
        assert_eq!(kids, vec![forest.object_id("Tire").unwrap(), forest.object_id("Wheel").unwrap()]);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_uses_forest_parent_after_pruning() {
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let mut forest = SceneForest::build(&scene, true).unwrap();
        prune(&mut forest, |name| scene.object(name).is_some_and(|o| o.selected));

        // Hull is gone, so Rig hangs directly under Plane
        flatten_armatures(&mut forest);
        let plane = forest.object_id("Plane").unwrap();
        assert_eq!(forest.sorted_children(plane).len(), 2);

        // bones are roots and survive flattening
        let names: Vec<_> = forest.roots().iter().map(|&id| forest.get(id).unwrap().name.clone()).collect();
        assert_eq!(names, vec!["Plane", "Rig_Strut"]);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_root_armature_promotes_children() {
        let scene = SceneDescription::from_json_str(
            r#"{"objects": [
                {"name": "Rig", "type": "ARMATURE", "armature": {}},
                {"name": "Body", "type": "MESH", "parent": "Rig"}]}"#,
        )
        .unwrap();
        let mut forest = SceneForest::build(&scene, false).unwrap();
        flatten_armatures(&mut forest);
        assert_eq!(forest.roots(), vec![forest.object_id("Body").unwrap()]);
    }
}
