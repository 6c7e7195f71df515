//! Nested tree assembly.
//!
//! # Responsibility
//! - Compose the nested view of a subtree from per-parent sibling chains.
//!
//! # Invariants
//! - Traversal is iterative, depth-first, parent before children.
//! - Leaf types terminate descent without a store read.
//! - Assembly never writes to the store.

use super::error::{TreeError, TreeResult};
use super::navigator::ordered_children;
use super::placement::PlacementValidator;
use crate::model::node::{Node, NodeId, TreeNode};
use crate::store::NodeStore;
use std::collections::HashMap;

/// Reads the subtree under `root` into a nested value.
pub async fn assemble<S>(
    store: &S,
    placement: &PlacementValidator,
    root: Node,
) -> TreeResult<TreeNode>
where
    S: NodeStore + ?Sized,
{
    let mut children_of = HashMap::new();
    let mut pending = vec![root.clone()];
    while let Some(current) = pending.pop() {
        if placement.is_leaf(&current.node_type) {
            continue;
        }
        let children = ordered_children(store, current.id).await?;
        pending.extend(children.iter().rev().cloned());
        children_of.insert(current.id, children);
    }
    build_nested(root, children_of)
}

/// Folds a parent -> ordered children map into a nested tree rooted at `root`.
pub(crate) fn build_nested(
    root: Node,
    children_of: HashMap<NodeId, Vec<Node>>,
) -> TreeResult<TreeNode> {
    let root_id = root.id;

    let mut preorder = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(children) = children_of.get(&node.id) {
            stack.extend(children.iter().rev().cloned());
        }
        preorder.push(node);
    }

    // Reverse pre-order finishes every subtree before its parent; the
    // parent's children are then the top `n` entries, first child on top.
    let mut finished: Vec<TreeNode> = Vec::new();
    for node in preorder.into_iter().rev() {
        let child_count = children_of.get(&node.id).map_or(0, Vec::len);
        let split_at = finished.len().saturating_sub(child_count);
        let mut children = finished.split_off(split_at);
        children.reverse();
        finished.push(TreeNode { node, children });
    }

    finished.pop().ok_or(TreeError::NodeNotFound(root_id))
}

#[cfg(test)]
mod tests {
    use super::build_nested;
    use crate::model::node::{NewNode, Node, NodeId, NodeType};
    use std::collections::HashMap;

    fn node(raw: i64, node_type: NodeType) -> Node {
        NewNode::new(node_type).into_node(NodeId::new(raw).unwrap())
    }

    #[test]
    fn build_nested_keeps_child_order_at_every_level() {
        let children_of = HashMap::from([
            (
                NodeId::new(1).unwrap(),
                vec![node(2, NodeType::task()), node(5, NodeType::page())],
            ),
            (
                NodeId::new(2).unwrap(),
                vec![node(3, NodeType::document()), node(4, NodeType::page())],
            ),
        ]);
        let tree = build_nested(node(1, NodeType::task()), children_of).unwrap();

        let raw = |ids: Vec<NodeId>| ids.into_iter().map(NodeId::get).collect::<Vec<_>>();
        assert_eq!(raw(tree.child_ids()), vec![2, 5]);
        assert_eq!(raw(tree.children[0].child_ids()), vec![3, 4]);
        assert_eq!(raw(tree.preorder_ids()), vec![1, 2, 3, 4, 5]);
    }
}
