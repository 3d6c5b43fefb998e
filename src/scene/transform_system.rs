//! Hierarchy update.
//!
//! Propagates world matrices through the graph with an explicit stack
//! (deep scenes must not overflow the call stack). A node recomputes its
//! world matrix when its own local matrix changed or any ancestor's did;
//! the per-node dirty check lives in [`Transform::update_local_matrix`].
//!
//! [`Transform::update_local_matrix`]: crate::scene::Transform::update_local_matrix

use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::node::Node;
use crate::scene::NodeHandle;

/// Update every subtree in `roots` against an identity parent.
///
/// Returns whether any world matrix changed — the layer dirty signal.
pub fn update_hierarchy(nodes: &mut SlotMap<NodeHandle, Node>, roots: &[NodeHandle]) -> bool {
    let mut any_changed = false;
    for &root in roots {
        any_changed |= update_subtree(nodes, root, Affine3A::IDENTITY, false);
    }
    any_changed
}

/// Update a single subtree below `parent_world`.
///
/// `force` recomputes every node regardless of dirtiness (used after the
/// parent space itself changed, e.g. a re-parented subtree).
pub fn update_subtree(
    nodes: &mut SlotMap<NodeHandle, Node>,
    root: NodeHandle,
    parent_world: Affine3A,
    force: bool,
) -> bool {
    let mut any_changed = false;
    // (node, parent world matrix, parent changed)
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);
    stack.push((root, parent_world, force));

    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let world_needs_update = local_changed || parent_changed;

        if world_needs_update {
            let new_world = parent_world * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);
            any_changed = true;
        }

        let current_world = node.transform.world_matrix;
        // Reverse push keeps the walk depth-first in child order.
        for i in (0..node.children.len()).rev() {
            stack.push((node.children[i], current_world, world_needs_update));
        }
    }

    any_changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn child_world_composes_parent_local() {
        let mut nodes: SlotMap<NodeHandle, Node> = SlotMap::with_key();

        let mut parent = Node::new();
        parent.transform.position = Vec3::new(1.0, 0.0, 0.0);
        let parent_handle = nodes.insert(parent);

        let mut child = Node::new();
        child.transform.position = Vec3::new(0.0, 1.0, 0.0);
        child.parent = Some(parent_handle);
        let child_handle = nodes.insert(child);
        nodes[parent_handle].children.push(child_handle);

        assert!(update_hierarchy(&mut nodes, &[parent_handle]));

        let world = nodes[child_handle].transform.world_matrix.translation;
        assert!((world.x - 1.0).abs() < 1e-5);
        assert!((world.y - 1.0).abs() < 1e-5);

        // Second pass with nothing touched reports clean.
        assert!(!update_hierarchy(&mut nodes, &[parent_handle]));
    }

    #[test]
    fn parent_move_propagates_to_clean_children() {
        let mut nodes: SlotMap<NodeHandle, Node> = SlotMap::with_key();
        let parent_handle = nodes.insert(Node::new());
        let mut child = Node::new();
        child.parent = Some(parent_handle);
        let child_handle = nodes.insert(child);
        nodes[parent_handle].children.push(child_handle);

        update_hierarchy(&mut nodes, &[parent_handle]);

        nodes[parent_handle].transform.position = Vec3::new(0.0, 0.0, 5.0);
        assert!(update_hierarchy(&mut nodes, &[parent_handle]));

        let world = nodes[child_handle].transform.world_matrix.translation;
        assert!((world.z - 5.0).abs() < 1e-5);
    }
}
