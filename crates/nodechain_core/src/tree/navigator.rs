//! Sibling list navigation.
//!
//! # Responsibility
//! - Rebuild the ordered child sequence of one parent from its unordered records.
//! - Detect chain corruption instead of truncating silently.
//!
//! # Invariants
//! - A parent whose children contain no head yields an empty sequence.
//! - A dangling or asymmetric `next_id`, a second head or a loop is a
//!   `BrokenChain` error.

use super::error::{ChainFault, TreeError, TreeResult};
use crate::model::node::{Node, NodeId};
use crate::store::{NodeFilter, NodeStore};
use std::collections::{HashMap, HashSet};

/// Returns the children of `parent_id` in chain order.
pub async fn ordered_children<S>(store: &S, parent_id: NodeId) -> TreeResult<Vec<Node>>
where
    S: NodeStore + ?Sized,
{
    let siblings = store
        .select_where(&NodeFilter::children_of(parent_id))
        .await?;
    order_siblings(siblings).map_err(|fault| TreeError::BrokenChain { parent_id, fault })
}

/// Like `ordered_children`, but a non-empty sibling set with no head is an error.
pub async fn check_chain<S>(store: &S, parent_id: NodeId) -> TreeResult<Vec<Node>>
where
    S: NodeStore + ?Sized,
{
    let siblings = store
        .select_where(&NodeFilter::children_of(parent_id))
        .await?;
    if !siblings.is_empty() && !siblings.iter().any(Node::is_head) {
        return Err(TreeError::BrokenChain {
            parent_id,
            fault: ChainFault::MissingHead,
        });
    }
    order_siblings(siblings).map_err(|fault| TreeError::BrokenChain { parent_id, fault })
}

/// Head of the chain (`prev_id = None`), if any.
pub async fn first_child<S>(store: &S, parent_id: NodeId) -> TreeResult<Option<Node>>
where
    S: NodeStore + ?Sized,
{
    let heads = store
        .select_where(&NodeFilter::children_of(parent_id).with_prev(None))
        .await?;
    single_end(parent_id, heads)
}

/// Tail of the chain (`next_id = None`), if any.
pub async fn last_child<S>(store: &S, parent_id: NodeId) -> TreeResult<Option<Node>>
where
    S: NodeStore + ?Sized,
{
    let tails = store
        .select_where(&NodeFilter::children_of(parent_id).with_next(None))
        .await?;
    single_end(parent_id, tails)
}

fn single_end(parent_id: NodeId, mut ends: Vec<Node>) -> TreeResult<Option<Node>> {
    if ends.len() > 1 {
        let mut ids: Vec<NodeId> = ends.iter().map(|node| node.id).collect();
        ids.sort();
        return Err(TreeError::BrokenChain {
            parent_id,
            fault: ChainFault::MultipleHeads(ids),
        });
    }
    Ok(ends.pop())
}

/// Orders one parent's sibling records by walking the embedded links.
pub(crate) fn order_siblings(siblings: Vec<Node>) -> Result<Vec<Node>, ChainFault> {
    let mut heads: Vec<NodeId> = siblings
        .iter()
        .filter(|node| node.is_head())
        .map(|node| node.id)
        .collect();
    if heads.is_empty() {
        return Ok(Vec::new());
    }
    if heads.len() > 1 {
        heads.sort();
        return Err(ChainFault::MultipleHeads(heads));
    }

    let total = siblings.len();
    let mut by_id: HashMap<NodeId, Node> =
        siblings.into_iter().map(|node| (node.id, node)).collect();
    let mut visited = HashSet::with_capacity(total);
    let mut ordered = Vec::with_capacity(total);

    let mut cursor = by_id.remove(&heads[0]);
    while let Some(current) = cursor.take() {
        visited.insert(current.id);
        if let Some(next_id) = current.next_id {
            if visited.contains(&next_id) {
                return Err(ChainFault::Cycle(next_id));
            }
            let next = by_id.remove(&next_id).ok_or(ChainFault::DanglingNext {
                from: current.id,
                missing: next_id,
            })?;
            if next.prev_id != Some(current.id) {
                return Err(ChainFault::AsymmetricLink {
                    from: current.id,
                    to: next_id,
                });
            }
            cursor = Some(next);
        }
        ordered.push(current);
    }

    if !by_id.is_empty() {
        let mut unreached: Vec<NodeId> = by_id.into_keys().collect();
        unreached.sort();
        return Err(ChainFault::Unreached(unreached));
    }
    Ok(ordered)
}
