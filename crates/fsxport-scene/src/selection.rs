//! Selection pruning of the export forest

use crate::index::{NodeId, NodeKind, SceneForest};

/// Remove unselected nodes from `forest`, returning their names
///
/// `is_selected` is asked about scene object names. Bones follow their
/// armature: they stay when it is selected and are dropped with their whole
/// bone subtree otherwise. An unselected object is removed and its children
/// move up to its parent (or become roots) before the walk continues into
/// them.
pub fn prune<F>(forest: &mut SceneForest, is_selected: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut doomed = Vec::new();
    for root in forest.roots() {
        visit(forest, root, &is_selected, &mut doomed);
    }

    let mut removed = Vec::with_capacity(doomed.len());
    for id in doomed {
        if let Some(node) = forest.remove(id) {
            tracing::debug!(node = %node.name, "removed unselected node");
            removed.push(node.name);
        }
    }
    tracing::info!(removed = removed.len(), kept = forest.len(), "selection applied");
    removed
}

fn visit<F>(forest: &mut SceneForest, id: NodeId, is_selected: &F, doomed: &mut Vec<NodeId>)
where
    F: Fn(&str) -> bool,
{
    let Some(node) = forest.get(id) else {
        return;
    };
    let children = node.children().to_vec();

    if let NodeKind::Bone { armature, .. } = &node.kind {
        if is_selected(armature) {
            return;
        }
        doomed.push(id);
        for child in children {
            visit(forest, child, is_selected, doomed);
        }
        return;
    }

    if is_selected(&node.name) {
        for child in children {
            visit(forest, child, is_selected, doomed);
        }
        return;
    }

    let parent = node.parent();
    doomed.push(id);
    forest.detach(id);
    for child in children {
        forest.set_parent(child, parent);
        visit(forest, child, is_selected, doomed);
    }
}
