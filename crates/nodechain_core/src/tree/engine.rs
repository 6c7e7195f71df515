//! Tree mutation engine.
//!
//! # Responsibility
//! - Insert, move and sort nodes by relinking embedded sibling chains.
//! - Validate placement, selection and destination before the first write.
//! - Signal `TreeChanged` after every successful mutation.
//!
//! # Invariants
//! - All checks run before any store write; a rejected call writes nothing.
//! - Once writes start, a failure stops the mutation where it is. Nothing is
//!   retried or rolled back, since re-applying a splice can corrupt the chain.
//! - Moved and sorted records are rewritten whole (delete then re-insert),
//!   never field by field.
//! - `insert` honours `prev_id` over `next_id` when both are given.

use super::assembler::{assemble, build_nested};
use super::error::{DestinationError, TreeError, TreeResult};
use super::events::{emit, event_channel, TreeEvent};
use super::navigator;
use super::placement::PlacementValidator;
use crate::config::{ConfigError, TreeConfig};
use crate::model::node::{NewNode, Node, NodeFieldsUpdate, NodeId, NodePatch, TreeNode};
use crate::store::{NodeFilter, NodeStore, StoreError};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Where a block of nodes should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub parent_id: Option<NodeId>,
    pub prev_id: Option<NodeId>,
    pub next_id: Option<NodeId>,
}

/// Drop gesture relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    /// Onto the node: becomes its first child.
    Into,
    /// Into the gap before the node.
    Before,
    /// Into the gap after the node.
    After,
}

#[derive(Debug, Clone, Copy)]
enum InsertSplice {
    After {
        prev: NodeId,
        old_next: Option<NodeId>,
    },
    Before {
        next: NodeId,
        old_prev: Option<NodeId>,
    },
    Sole,
}

/// Ordered tree engine over a `NodeStore`.
pub struct TreeEngine<S: NodeStore> {
    store: S,
    placement: PlacementValidator,
    events: broadcast::Sender<TreeEvent>,
}

impl<S: NodeStore> TreeEngine<S> {
    /// Creates an engine after validating `config`.
    pub fn new(store: S, config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            placement: PlacementValidator::new(Arc::new(config)),
            events: event_channel(),
        })
    }

    /// Creates an engine with the task/document/page table.
    pub fn with_default_config(store: S) -> Self {
        Self {
            store,
            placement: PlacementValidator::new(Arc::new(TreeConfig::default())),
            events: event_channel(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        self.placement.config()
    }

    pub fn placement(&self) -> &PlacementValidator {
        &self.placement
    }

    /// Receiver for `TreeChanged` (and `SelectionChanged` from view states
    /// sharing this engine's sender).
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<TreeEvent> {
        self.events.clone()
    }

    pub async fn get_node(&self, id: NodeId) -> TreeResult<Option<Node>> {
        let mut found = self.store.select_where(&NodeFilter::by_id(id)).await?;
        Ok(found.pop())
    }

    pub async fn require_node(&self, id: NodeId) -> TreeResult<Node> {
        self.get_node(id).await?.ok_or(TreeError::NodeNotFound(id))
    }

    /// Records with no parent, ordered by id.
    pub async fn list_roots(&self) -> TreeResult<Vec<Node>> {
        let mut roots = self.store.select_where(&NodeFilter::roots()).await?;
        roots.sort_by_key(|node| node.id);
        Ok(roots)
    }

    pub async fn ordered_children(&self, parent_id: NodeId) -> TreeResult<Vec<Node>> {
        navigator::ordered_children(&self.store, parent_id).await
    }

    pub async fn check_chain(&self, parent_id: NodeId) -> TreeResult<Vec<Node>> {
        navigator::check_chain(&self.store, parent_id).await
    }

    pub async fn first_child(&self, parent_id: NodeId) -> TreeResult<Option<Node>> {
        navigator::first_child(&self.store, parent_id).await
    }

    pub async fn last_child(&self, parent_id: NodeId) -> TreeResult<Option<Node>> {
        navigator::last_child(&self.store, parent_id).await
    }

    /// Nested read-only view of the subtree under `root`.
    pub async fn assemble(&self, root: Node) -> TreeResult<TreeNode> {
        assemble(&self.store, &self.placement, root).await
    }

    pub async fn assemble_from(&self, root_id: NodeId) -> TreeResult<TreeNode> {
        let root = self.require_node(root_id).await?;
        self.assemble(root).await
    }

    /// Inserts a distinguished root (`parent_id = None`, no sibling links).
    pub async fn create_root(&self, node: NewNode) -> TreeResult<Node> {
        let started_at = Instant::now();
        let result = self.create_root_inner(node).await;
        self.finish("tree_create_root", started_at, &result);
        result
    }

    async fn create_root_inner(&self, node: NewNode) -> TreeResult<Node> {
        self.placement.ensure_known(&node.node_type)?;
        let record = NewNode {
            id: None,
            parent_id: None,
            prev_id: None,
            next_id: None,
            ..node
        };
        let created = self.insert_one(record).await?;
        info!(
            "event=tree_create_root module=tree status=ok id={}",
            created.id
        );
        Ok(created)
    }

    /// Inserts `node` under `parent_id` and splices it into the sibling chain.
    ///
    /// With `prev_id` set the node goes right after `prev_id`; otherwise with
    /// `next_id` set it goes right before `next_id`; with neither it must be
    /// the parent's only child. When both are given, `next_id` is ignored.
    pub async fn insert(
        &self,
        node: NewNode,
        parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        next_id: Option<NodeId>,
    ) -> TreeResult<Node> {
        let started_at = Instant::now();
        let result = self.insert_inner(node, parent_id, prev_id, next_id).await;
        self.finish("tree_insert", started_at, &result);
        result
    }

    /// Inserts `node` as the last child of `parent_id`.
    pub async fn append_child(&self, parent_id: NodeId, node: NewNode) -> TreeResult<Node> {
        let tail = self.last_child(parent_id).await?;
        self.insert(node, Some(parent_id), tail.map(|tail| tail.id), None)
            .await
    }

    /// Inserts `node` as the first child of `parent_id`.
    pub async fn prepend_child(&self, parent_id: NodeId, node: NewNode) -> TreeResult<Node> {
        let head = self.first_child(parent_id).await?;
        self.insert(node, Some(parent_id), None, head.map(|head| head.id))
            .await
    }

    async fn insert_inner(
        &self,
        node: NewNode,
        parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        next_id: Option<NodeId>,
    ) -> TreeResult<Node> {
        let parent_id = parent_id.ok_or(DestinationError::Root)?;
        self.placement.ensure_known(&node.node_type)?;
        let parent = self.require_node(parent_id).await?;
        self.placement.check(&node.node_type, &parent.node_type)?;

        let splice = match (prev_id, next_id) {
            (Some(prev), ignored_next) => {
                if let Some(ignored_next) = ignored_next {
                    debug!(
                        "event=tree_insert module=tree status=ignored_next prev_id={prev} next_id={ignored_next}"
                    );
                }
                let prev_node = self.require_sibling(prev, parent_id).await?;
                InsertSplice::After {
                    prev,
                    old_next: prev_node.next_id,
                }
            }
            (None, Some(next)) => {
                let next_node = self.require_sibling(next, parent_id).await?;
                InsertSplice::Before {
                    next,
                    old_prev: next_node.prev_id,
                }
            }
            (None, None) => {
                let existing = self
                    .store
                    .select_where(&NodeFilter::children_of(parent_id))
                    .await?;
                if !existing.is_empty() {
                    return Err(DestinationError::NotAdjacent {
                        prev: None,
                        next: None,
                    }
                    .into());
                }
                InsertSplice::Sole
            }
        };

        let record = NewNode {
            id: None,
            parent_id: Some(parent_id),
            prev_id: match splice {
                InsertSplice::After { prev, .. } => Some(prev),
                _ => None,
            },
            next_id: match splice {
                InsertSplice::Before { next, .. } => Some(next),
                _ => None,
            },
            ..node
        };
        let mut created = self.insert_one(record).await?;

        match splice {
            InsertSplice::After { prev, old_next } => {
                self.patch(prev, NodePatch::next(Some(created.id))).await?;
                if let Some(old_next) = old_next {
                    self.patch(old_next, NodePatch::prev(Some(created.id)))
                        .await?;
                    self.patch(created.id, NodePatch::next(Some(old_next)))
                        .await?;
                    created.next_id = Some(old_next);
                }
            }
            InsertSplice::Before { next, old_prev } => {
                self.patch(next, NodePatch::prev(Some(created.id))).await?;
                if let Some(old_prev) = old_prev {
                    self.patch(old_prev, NodePatch::next(Some(created.id)))
                        .await?;
                    self.patch(created.id, NodePatch::prev(Some(old_prev)))
                        .await?;
                    created.prev_id = Some(old_prev);
                }
            }
            InsertSplice::Sole => {}
        }

        info!(
            "event=tree_insert module=tree status=ok id={} parent_id={} prev_id={} next_id={}",
            created.id,
            parent_id,
            NodeId::to_wire(created.prev_id),
            NodeId::to_wire(created.next_id)
        );
        Ok(created)
    }

    /// Moves `ids` as one block under `new_parent_id`, between `prev_id` and
    /// `next_id`.
    ///
    /// The block keeps the nodes' current chain order, whatever order `ids`
    /// lists them in. All nodes must share one parent and one type.
    pub async fn move_nodes(
        &self,
        ids: &[NodeId],
        new_parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        next_id: Option<NodeId>,
    ) -> TreeResult<()> {
        let started_at = Instant::now();
        let result = self
            .move_inner(ids, new_parent_id, prev_id, next_id)
            .await;
        self.finish("tree_move", started_at, &result);
        result
    }

    /// `move_nodes` with a resolved `Destination`.
    pub async fn move_to(&self, ids: &[NodeId], destination: Destination) -> TreeResult<()> {
        self.move_nodes(
            ids,
            destination.parent_id,
            destination.prev_id,
            destination.next_id,
        )
        .await
    }

    async fn move_inner(
        &self,
        ids: &[NodeId],
        new_parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        next_id: Option<NodeId>,
    ) -> TreeResult<()> {
        let Some(&first_id) = ids.first() else {
            return Err(TreeError::EmptySelection);
        };
        let new_parent_id = new_parent_id.ok_or(DestinationError::Root)?;
        for splice in [prev_id, next_id].into_iter().flatten() {
            if ids.contains(&splice) {
                return Err(DestinationError::SplicePointInSelection(splice).into());
            }
        }

        let first = self.require_node(first_id).await?;
        let source_parent_id = first
            .parent_id
            .ok_or(DestinationError::MovingRoot(first.id))?;
        let destination = self.require_node(new_parent_id).await?;
        self.placement
            .check(&first.node_type, &destination.node_type)?;

        let wanted: HashSet<NodeId> = ids.iter().copied().collect();
        let source_chain = self.ordered_children(source_parent_id).await?;
        let moving: Vec<Node> = source_chain
            .iter()
            .filter(|node| wanted.contains(&node.id))
            .cloned()
            .collect();
        if moving.len() != wanted.len() {
            for id in ids {
                if !moving.iter().any(|node| node.id == *id) {
                    self.require_node(*id).await?;
                }
            }
            return Err(TreeError::HeterogeneousSelection);
        }
        if moving
            .iter()
            .any(|node| node.node_type != first.node_type)
        {
            return Err(TreeError::HeterogeneousSelection);
        }

        self.ensure_no_cycle(&wanted, new_parent_id).await?;

        let destination_chain = if new_parent_id == source_parent_id {
            source_chain
        } else {
            self.ordered_children(new_parent_id).await?
        };
        let remaining: Vec<NodeId> = destination_chain
            .iter()
            .map(|node| node.id)
            .filter(|id| !wanted.contains(id))
            .collect();
        self.ensure_adjacent(new_parent_id, &remaining, prev_id, next_id)
            .await?;

        let runs = contiguous_runs(&moving);
        for run in &runs {
            let (Some(run_first), Some(run_last)) = (run.first(), run.last()) else {
                continue;
            };
            let before = run_first.prev_id;
            let after = run_last.next_id;
            if let Some(before) = before {
                self.patch(before, NodePatch::next(after)).await?;
            }
            if let Some(after) = after {
                self.patch(after, NodePatch::prev(before)).await?;
            }
        }

        let relinked = relink(&moving, new_parent_id, prev_id, next_id);
        let (block_first, block_last) = match (relinked.first(), relinked.last()) {
            (Some(block_first), Some(block_last)) => (block_first.id, block_last.id),
            _ => return Err(TreeError::EmptySelection),
        };
        self.replace_records(&relinked).await?;

        if let Some(next_id) = next_id {
            self.patch(next_id, NodePatch::prev(Some(block_last))).await?;
        }
        if let Some(prev_id) = prev_id {
            self.patch(prev_id, NodePatch::next(Some(block_first))).await?;
        }

        info!(
            "event=tree_move module=tree status=ok count={} runs={} from_parent={} to_parent={} prev_id={} next_id={}",
            relinked.len(),
            runs.len(),
            source_parent_id,
            new_parent_id,
            NodeId::to_wire(prev_id),
            NodeId::to_wire(next_id)
        );
        Ok(())
    }

    /// Regroups children by type priority at every level under `root`,
    /// relinks each level as a fresh chain and returns the sorted tree.
    pub async fn sort(&self, root: Node) -> TreeResult<TreeNode> {
        let started_at = Instant::now();
        let result = self.sort_inner(root).await;
        self.finish("tree_sort", started_at, &result);
        result
    }

    async fn sort_inner(&self, root: Node) -> TreeResult<TreeNode> {
        let mut children_of = HashMap::new();
        let mut relinked_parents = 0usize;
        let mut pending = vec![root.clone()];
        while let Some(current) = pending.pop() {
            if self.placement.is_leaf(&current.node_type) {
                continue;
            }
            let mut children = self.ordered_children(current.id).await?;
            if children.is_empty() {
                continue;
            }

            let config = self.placement.config();
            children.sort_by_key(|child| config.sort_rank(&child.node_type));
            let relinked = relink(&children, current.id, None, None);
            self.replace_records(&relinked).await?;
            relinked_parents += 1;

            pending.extend(relinked.iter().rev().cloned());
            children_of.insert(current.id, relinked);
        }

        info!(
            "event=tree_sort module=tree status=ok root_id={} relinked_parents={}",
            root.id, relinked_parents
        );
        build_nested(root, children_of)
    }

    /// Rewrites payload fields of one node and returns the stored record.
    pub async fn update_fields(&self, id: NodeId, update: NodeFieldsUpdate) -> TreeResult<Node> {
        let started_at = Instant::now();
        let result = self.update_fields_inner(id, update).await;
        self.finish("tree_update", started_at, &result);
        result
    }

    async fn update_fields_inner(&self, id: NodeId, update: NodeFieldsUpdate) -> TreeResult<Node> {
        let changed = self.store.update_where(id, &update.into()).await?;
        if changed == 0 {
            return Err(TreeError::NodeNotFound(id));
        }
        self.require_node(id).await
    }

    /// Deletes records as-is.
    ///
    /// Callers must already have spliced the nodes out of their chains; any
    /// neighbour still pointing at a removed id surfaces later as `BrokenChain`.
    pub async fn remove_nodes(&self, ids: &[NodeId]) -> TreeResult<u64> {
        let started_at = Instant::now();
        let result = self
            .store
            .delete_where(ids)
            .await
            .map_err(TreeError::from);
        self.finish("tree_remove", started_at, &result);
        result
    }

    /// Splices `id` out of its chain, then deletes it with all descendants.
    pub async fn detach_and_remove(&self, id: NodeId) -> TreeResult<u64> {
        let started_at = Instant::now();
        let result = self.detach_and_remove_inner(id).await;
        self.finish("tree_detach_remove", started_at, &result);
        result
    }

    async fn detach_and_remove_inner(&self, id: NodeId) -> TreeResult<u64> {
        let node = self.require_node(id).await?;

        let mut doomed = vec![node.id];
        let mut pending = vec![node.id];
        while let Some(current) = pending.pop() {
            let children = self
                .store
                .select_where(&NodeFilter::children_of(current))
                .await?;
            for child in children {
                doomed.push(child.id);
                pending.push(child.id);
            }
        }

        if node.parent_id.is_some() {
            if let Some(before) = node.prev_id {
                self.patch(before, NodePatch::next(node.next_id)).await?;
            }
            if let Some(after) = node.next_id {
                self.patch(after, NodePatch::prev(node.prev_id)).await?;
            }
        }
        let removed = self.store.delete_where(&doomed).await?;
        info!(
            "event=tree_detach_remove module=tree status=ok id={} removed={}",
            id, removed
        );
        Ok(removed)
    }

    /// Resolves a drop gesture on `target_id` into a move destination.
    pub async fn drop_target(
        &self,
        target_id: NodeId,
        position: DropPosition,
    ) -> TreeResult<Destination> {
        let target = self.require_node(target_id).await?;
        let destination = match position {
            DropPosition::Into => Destination {
                parent_id: Some(target.id),
                prev_id: None,
                next_id: self.first_child(target.id).await?.map(|head| head.id),
            },
            DropPosition::After => Destination {
                parent_id: target.parent_id,
                prev_id: Some(target.id),
                next_id: target.next_id,
            },
            DropPosition::Before => Destination {
                parent_id: target.parent_id,
                prev_id: target.prev_id,
                next_id: Some(target.id),
            },
        };
        Ok(destination)
    }

    async fn require_sibling(&self, id: NodeId, parent_id: NodeId) -> TreeResult<Node> {
        let node = self.require_node(id).await?;
        if node.parent_id != Some(parent_id) {
            return Err(DestinationError::ForeignSibling {
                sibling: id,
                parent: parent_id,
            }
            .into());
        }
        Ok(node)
    }

    async fn ensure_no_cycle(
        &self,
        moving: &HashSet<NodeId>,
        new_parent_id: NodeId,
    ) -> TreeResult<()> {
        let mut visited = HashSet::new();
        let mut cursor = Some(new_parent_id);
        while let Some(current) = cursor {
            if moving.contains(&current) || !visited.insert(current) {
                return Err(DestinationError::Cycle {
                    node: current,
                    parent: new_parent_id,
                }
                .into());
            }
            cursor = self.require_node(current).await?.parent_id;
        }
        Ok(())
    }

    async fn ensure_adjacent(
        &self,
        parent_id: NodeId,
        remaining: &[NodeId],
        prev_id: Option<NodeId>,
        next_id: Option<NodeId>,
    ) -> TreeResult<()> {
        for splice in [prev_id, next_id].into_iter().flatten() {
            if !remaining.contains(&splice) {
                self.require_node(splice).await?;
                return Err(DestinationError::ForeignSibling {
                    sibling: splice,
                    parent: parent_id,
                }
                .into());
            }
        }

        let expected_next = match prev_id {
            Some(prev) => remaining
                .iter()
                .position(|id| *id == prev)
                .and_then(|index| remaining.get(index + 1))
                .copied(),
            None => remaining.first().copied(),
        };
        if expected_next != next_id {
            return Err(DestinationError::NotAdjacent {
                prev: prev_id,
                next: next_id,
            }
            .into());
        }
        Ok(())
    }

    async fn insert_one(&self, record: NewNode) -> TreeResult<Node> {
        self.store
            .insert_records(vec![record])
            .await?
            .pop()
            .ok_or_else(|| {
                TreeError::StorageFailure(StoreError::InvalidData(
                    "insert returned no record".to_string(),
                ))
            })
    }

    async fn patch(&self, id: NodeId, patch: NodePatch) -> TreeResult<()> {
        self.store.update_where(id, &patch).await?;
        Ok(())
    }

    /// Delete-then-insert of whole records, keeping their ids.
    async fn replace_records(&self, records: &[Node]) -> TreeResult<()> {
        let ids: Vec<NodeId> = records.iter().map(|node| node.id).collect();
        self.store.delete_where(&ids).await?;
        self.store
            .insert_records(records.iter().map(Node::to_new_node).collect())
            .await?;
        Ok(())
    }

    fn finish<T>(&self, event: &'static str, started_at: Instant, result: &TreeResult<T>) {
        let duration_ms = started_at.elapsed().as_millis();
        match result {
            Ok(_) => {
                debug!("event={event} module=tree status=done duration_ms={duration_ms}");
                emit(&self.events, TreeEvent::TreeChanged);
            }
            Err(err) => warn!(
                "event={event} module=tree status=error duration_ms={duration_ms} error_code={} error={}",
                err.code(),
                err
            ),
        }
    }
}

/// Splits chain-ordered nodes into maximal runs of chain neighbours.
fn contiguous_runs(nodes: &[Node]) -> Vec<&[Node]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for index in 1..=nodes.len() {
        let breaks = match (nodes.get(index - 1), nodes.get(index)) {
            (Some(previous), Some(current)) => previous.next_id != Some(current.id),
            _ => true,
        };
        if breaks {
            runs.push(&nodes[start..index]);
            start = index;
        }
    }
    runs
}

/// Copies `nodes` into one chain under `parent_id`, attached to the given ends.
fn relink(
    nodes: &[Node],
    parent_id: NodeId,
    head_prev: Option<NodeId>,
    tail_next: Option<NodeId>,
) -> Vec<Node> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| Node {
            parent_id: Some(parent_id),
            prev_id: if index == 0 {
                head_prev
            } else {
                Some(nodes[index - 1].id)
            },
            next_id: match nodes.get(index + 1) {
                Some(next) => Some(next.id),
                None => tail_next,
            },
            ..node.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{contiguous_runs, relink};
    use crate::model::node::{NewNode, Node, NodeId, NodeType};

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    fn linked(raw: i64, prev: i64, next: i64) -> Node {
        let mut node = NewNode::new(NodeType::page()).under(id(1)).into_node(id(raw));
        node.prev_id = NodeId::from_wire(prev);
        node.next_id = NodeId::from_wire(next);
        node
    }

    #[test]
    fn runs_split_on_chain_gaps() {
        // Chain 2 -> 3 -> 4 -> 5 -> 6, selection {2, 3, 5}.
        let selection = vec![linked(2, 0, 3), linked(3, 2, 4), linked(5, 4, 6)];
        let runs = contiguous_runs(&selection);
        let shape: Vec<Vec<i64>> = runs
            .iter()
            .map(|run| run.iter().map(|node| node.id.get()).collect())
            .collect();
        assert_eq!(shape, vec![vec![2, 3], vec![5]]);
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn relink_attaches_block_ends() {
        let block = vec![linked(2, 0, 3), linked(5, 4, 6)];
        let relinked = relink(&block, id(9), Some(id(7)), None);
        assert_eq!(relinked[0].parent_id, Some(id(9)));
        assert_eq!(relinked[0].prev_id, Some(id(7)));
        assert_eq!(relinked[0].next_id, Some(id(5)));
        assert_eq!(relinked[1].prev_id, Some(id(2)));
        assert_eq!(relinked[1].next_id, None);
    }
}
