//! Export forest built from a scene snapshot
//!
//! Every exportable object (and, with skin weights on, every bone) gets a
//! [`SceneNode`] in an arena. Parent and child links are arena ids, and the
//! [`SceneForest`] methods are the only way to change them, which keeps both
//! directions consistent.

use std::collections::{HashMap, HashSet};

use fsxport_core::naming::{bone_safe_name, safe_name};
use fsxport_core::{Error, Result};

use crate::snapshot::{ObjectKind, SceneDescription};

/// Arena index of a node
pub type NodeId = usize;

/// Key of a node in the forest index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    /// Scene object by name
    Object(String),
    /// Bone of an armature object
    Bone {
        /// Armature object name
        armature: String,
        /// Bone name
        bone: String,
    },
}

impl SourceRef {
    /// Key of a scene object
    pub fn object(name: impl Into<String>) -> Self {
        SourceRef::Object(name.into())
    }

    /// Key of a bone
    pub fn bone(armature: impl Into<String>, bone: impl Into<String>) -> Self {
        SourceRef::Bone {
            armature: armature.into(),
            bone: bone.into(),
        }
    }
}

/// What a node exports as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Transform-only frame
    Empty,
    /// Frame with a mesh block
    Mesh,
    /// Skeleton, removed before writing
    Armature,
    /// Bone frame
    Bone {
        /// Owning armature object name, also its index key
        armature: String,
        /// Bone name within the armature
        bone: String,
    },
}

impl NodeKind {
    /// Whether this is a bone node
    pub fn is_bone(&self) -> bool {
        matches!(self, NodeKind::Bone { .. })
    }

    /// Short label used in outlines and logs
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Empty => "EMPTY",
            NodeKind::Mesh => "MESH",
            NodeKind::Armature => "ARMATURE",
            NodeKind::Bone { .. } => "BONE",
        }
    }
}

/// One export node
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Node type
    pub kind: NodeKind,
    /// Source name, `<armature>_<bone>` for bones
    pub name: String,
    /// Name used for frames and references in the output
    pub safe_name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(kind: NodeKind, name: String, safe_name: String) -> Self {
        Self {
            kind,
            name,
            safe_name,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Scene object this node comes from; the armature for bones
    pub fn object_name(&self) -> &str {
        match &self.kind {
            NodeKind::Bone { armature, .. } => armature,
            _ => &self.name,
        }
    }

    /// Index key of this node
    pub fn source(&self) -> SourceRef {
        match &self.kind {
            NodeKind::Bone { armature, bone } => SourceRef::bone(armature, bone),
            _ => SourceRef::object(&self.name),
        }
    }
}

/// Arena of export nodes plus the source index
#[derive(Debug, Clone, Default)]
pub struct SceneForest {
    nodes: Vec<Option<SceneNode>>,
    index: HashMap<SourceRef, NodeId>,
}

impl SceneForest {
    /// Index every exportable object of `scene`, and every bone when
    /// `with_bones` is set
    pub fn build(scene: &SceneDescription, with_bones: bool) -> Result<Self> {
        let mut forest = Self::default();

        for object in &scene.objects {
            let kind = match object.kind {
                ObjectKind::Empty => NodeKind::Empty,
                ObjectKind::Mesh => NodeKind::Mesh,
                ObjectKind::Armature => NodeKind::Armature,
                ObjectKind::Other => continue,
            };
            tracing::debug!(object = %object.name, kind = kind.label(), "indexed object");
            forest.insert(
                SourceRef::object(&object.name),
                SceneNode::new(kind, object.name.clone(), safe_name(&object.name)),
            );

            if !with_bones {
                continue;
            }
            if let Some(armature) = &object.armature {
                for bone in &armature.bones {
                    let kind = NodeKind::Bone {
                        armature: object.name.clone(),
                        bone: bone.name.clone(),
                    };
                    forest.insert(
                        SourceRef::bone(&object.name, &bone.name),
                        SceneNode::new(
                            kind,
                            format!("{}_{}", object.name, bone.name),
                            bone_safe_name(&object.name, &bone.name),
                        ),
                    );
                }
            }
        }

        // Object links
        for object in &scene.objects {
            let Some(id) = forest.object_id(&object.name) else {
                continue;
            };
            if let Some(child) = scene.children_of(&object.name).find(|c| !c.kind.is_exportable()) {
                return Err(Error::UnsupportedChild {
                    node: object.name.clone(),
                    child: child.name.clone(),
                });
            }
            if let Some(parent) = &object.parent {
                let parent_id = forest.object_id(parent).ok_or_else(|| Error::UnindexedParent {
                    node: object.name.clone(),
                    parent: parent.clone(),
                })?;
                forest.set_parent(id, Some(parent_id));
            }
        }

        // Skeletal links
        if with_bones {
            for object in &scene.objects {
                let Some(armature) = object.armature.as_ref().filter(|_| object.kind.is_exportable()) else {
                    continue;
                };
                for bone in &armature.bones {
                    let Some(parent) = &bone.parent else {
                        continue;
                    };
                    let child_id = forest.id_of(&SourceRef::bone(&object.name, &bone.name));
                    let parent_id = forest.id_of(&SourceRef::bone(&object.name, parent));
                    match (child_id, parent_id) {
                        (Some(child_id), Some(parent_id)) => forest.set_parent(child_id, Some(parent_id)),
                        _ => {
                            return Err(Error::UnindexedParent {
                                node: format!("{}_{}", object.name, bone.name),
                                parent: format!("{}_{}", object.name, parent),
                            })
                        }
                    }
                }
            }
        }

        tracing::info!(nodes = forest.len(), "scene index built");
        Ok(forest)
    }

    fn insert(&mut self, source: SourceRef, node: SceneNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        self.index.insert(source, id);
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the forest has no nodes
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Node by id, `None` once removed
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    /// Whether `id` is still in the forest
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Id of an indexed source
    pub fn id_of(&self, source: &SourceRef) -> Option<NodeId> {
        self.index.get(source).copied()
    }

    /// Id of a scene object
    pub fn object_id(&self, name: &str) -> Option<NodeId> {
        self.id_of(&SourceRef::object(name))
    }

    /// Live ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, node)| node.as_ref().map(|_| id))
    }

    /// Live nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, node)| node.as_ref().map(|n| (id, n)))
    }

    /// Move `child` under `parent`, or make it a root
    ///
    /// The child is detached from its previous parent and appended to the new
    /// parent's children unless already listed.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = parent;
        }
        if let Some(parent_node) = parent.and_then(|p| self.node_mut(p)) {
            if !parent_node.children.contains(&child) {
                parent_node.children.push(child);
            }
        }
    }

    /// Drop the link between `id` and its parent
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Take a node out of the forest
    ///
    /// Children still pointing at it become roots; callers re-parent them
    /// first when they should stay attached.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        self.detach(id);
        let node = self.nodes.get_mut(id)?.take()?;
        for &child in &node.children {
            if let Some(child_node) = self.node_mut(child) {
                if child_node.parent == Some(id) {
                    child_node.parent = None;
                }
            }
        }
        self.index.remove(&node.source());
        Some(node)
    }

    fn sorted_by_name(&self, ids: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = ids.filter(|&id| self.contains(id)).collect();
        ids.sort_by(|&a, &b| self.name_of(a).cmp(self.name_of(b)));
        ids
    }

    fn name_of(&self, id: NodeId) -> &str {
        self.get(id).map(|n| n.name.as_str()).unwrap_or_default()
    }

    /// Parentless nodes sorted by name
    pub fn roots(&self) -> Vec<NodeId> {
        self.sorted_by_name(self.nodes().filter(|(_, n)| n.parent.is_none()).map(|(id, _)| id))
    }

    /// Children of `id` sorted by name
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        match self.get(id) {
            Some(node) => self.sorted_by_name(node.children.iter().copied()),
            None => Vec::new(),
        }
    }

    /// Every live node sorted by name
    pub fn export_list(&self) -> Vec<NodeId> {
        self.sorted_by_name(self.ids())
    }

    /// Depth-first walk from the sorted roots, yielding `(depth, id)`
    pub fn depth_first(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(usize, NodeId)> = self.roots().into_iter().rev().map(|id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            stack.extend(self.sorted_children(id).into_iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }

    /// Check that links agree in both directions, point at live nodes, and
    /// contain no cycle
    pub fn is_consistent(&self) -> bool {
        for (id, node) in self.nodes() {
            if let Some(parent) = node.parent {
                match self.get(parent) {
                    Some(p) if p.children.contains(&id) => {}
                    _ => return false,
                }
            }
            let mut seen = HashSet::new();
            for &child in &node.children {
                if !seen.insert(child) {
                    return false;
                }
                match self.get(child) {
                    Some(c) if c.parent == Some(id) => {}
                    _ => return false,
                }
            }
        }
        // every node reachable from a root exactly once
        let walked = self.depth_first();
        let unique: HashSet<NodeId> = walked.iter().map(|&(_, id)| id).collect();
        walked.len() == self.len() && unique.len() == self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIGGED: &str = r#"{
        "objects": [
            {"name": "Body", "type": "MESH", "parent": "Root"},
            {"name": "Root", "type": "EMPTY"},
            {"name": "Rig", "type": "ARMATURE", "parent": "Root",
             "armature": {"bones": [
                {"name": "Hip"},
                {"name": "Knee", "parent": "Hip"},
                {"name": "Foot", "parent": "Knee"}]}},
            {"name": "Gear door", "type": "MESH", "parent": "Rig"}
        ]
    }"#;

    fn make_forest(with_bones: bool) -> SceneForest {
        let scene = SceneDescription::from_json_str(RIGGED).unwrap();
        SceneForest::build(&scene, with_bones).unwrap()
    }

    fn names(forest: &SceneForest, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| forest.get(id).unwrap().name.clone()).collect()
    }

    #[test]
    fn test_build_objects_only() {
        let forest = make_forest(false);
        assert_eq!(forest.len(), 4);
        assert!(forest.is_consistent());
        assert_eq!(names(&forest, &forest.roots()), vec!["Root"]);

        let root = forest.object_id("Root").unwrap();
        assert_eq!(names(&forest, &forest.sorted_children(root)), vec!["Body", "Rig"]);

        let door = forest.get(forest.object_id("Gear door").unwrap()).unwrap();
        assert_eq!(door.safe_name, "Gear_door");
    }

    #[test]
    fn test_build_with_bones() {
        let forest = make_forest(true);
        assert_eq!(forest.len(), 7);
        assert!(forest.is_consistent());

        // root bones are forest roots
        assert_eq!(names(&forest, &forest.roots()), vec!["Rig_Hip", "Root"]);

        let knee = forest.id_of(&SourceRef::bone("Rig", "Knee")).unwrap();
        let node = forest.get(knee).unwrap();
        assert_eq!(node.safe_name, "Rig_Knee");
        assert_eq!(node.object_name(), "Rig");
        assert_eq!(node.parent(), forest.id_of(&SourceRef::bone("Rig", "Hip")));
    }

    #[test]
    fn test_unsupported_child_is_fatal() {
        let scene = SceneDescription::from_json_str(
            r#"{"objects": [
                {"name": "Root", "type": "EMPTY"},
                {"name": "Cam", "type": "CAMERA", "parent": "Root"}]}"#,
        )
        .unwrap();
        let err = SceneForest::build(&scene, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedChild { ref child, .. } if child == "Cam"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_unindexed_parent_is_fatal() {
        let scene = SceneDescription::from_json_str(
            r#"{"objects": [
                {"name": "Lamp", "type": "LIGHT"},
                {"name": "Shade", "type": "MESH", "parent": "Lamp"}]}"#,
        )
        .unwrap();
        let err = SceneForest::build(&scene, false).unwrap_err();
        assert!(matches!(err, Error::UnindexedParent { ref parent, .. } if parent == "Lamp"));
    }

    #[test]
    fn test_set_parent_and_remove() {
        let mut forest = make_forest(false);
        let root = forest.object_id("Root").unwrap();
        let rig = forest.object_id("Rig").unwrap();
        let door = forest.object_id("Gear door").unwrap();

        forest.set_parent(door, Some(root));
        forest.set_parent(door, Some(root));
        assert_eq!(forest.get(root).unwrap().children().iter().filter(|&&c| c == door).count(), 1);
        assert!(forest.get(rig).unwrap().children().is_empty());

        let removed = forest.remove(rig).unwrap();
        assert_eq!(removed.name, "Rig");
        assert!(forest.object_id("Rig").is_none());
        assert!(!forest.contains(rig));
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_depth_first_order() {
        let forest = make_forest(true);
        let walk: Vec<(usize, String)> = forest
            .depth_first()
            .into_iter()
            .map(|(depth, id)| (depth, forest.get(id).unwrap().name.clone()))
            .collect();
        assert_eq!(
            walk,
            vec![
                (0, "Rig_Hip".to_string()),
                (1, "Rig_Knee".to_string()),
                (2, "Rig_Foot".to_string()),
                (0, "Root".to_string()),
                (1, "Body".to_string()),
                (1, "Rig".to_string()),
                (2, "Gear door".to_string()),
            ]
        );
    }
}
