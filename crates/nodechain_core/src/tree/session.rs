//! Per-view node state (selected, checked, expanded).
//!
//! # Responsibility
//! - Hold view-local id sets that never touch the store.
//! - Signal `SelectionChanged` whenever one of the sets is replaced.
//!
//! # Invariants
//! - Each set keeps first-seen order and holds no duplicates.
//! - A range selection stays within one sibling chain.

use super::engine::TreeEngine;
use super::error::TreeResult;
use super::events::{emit, TreeEvent};
use crate::model::node::NodeId;
use crate::store::NodeStore;
use tokio::sync::broadcast;

#[derive(Debug, Default)]
pub struct ViewState {
    selected: Vec<NodeId>,
    checked: Vec<NodeId>,
    expanded: Vec<NodeId>,
    events: Option<broadcast::Sender<TreeEvent>>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// View state that reports changes on `sender`, usually
    /// `TreeEngine::event_sender`.
    pub fn with_events(sender: broadcast::Sender<TreeEvent>) -> Self {
        Self {
            events: Some(sender),
            ..Self::default()
        }
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn checked(&self) -> &[NodeId] {
        &self.checked
    }

    pub fn expanded(&self) -> &[NodeId] {
        &self.expanded
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn set_selected(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selected = dedup(ids);
        self.changed();
    }

    pub fn set_checked(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.checked = dedup(ids);
        self.changed();
    }

    pub fn set_expanded(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.expanded = dedup(ids);
        self.changed();
    }

    pub fn toggle_expanded(&mut self, id: NodeId) {
        if let Some(index) = self.expanded.iter().position(|current| *current == id) {
            self.expanded.remove(index);
        } else {
            self.expanded.push(id);
        }
        self.changed();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.changed();
    }

    /// Selects every sibling between `anchor` and `target`, inclusive.
    ///
    /// Falls back to selecting only `target` when the two are not siblings.
    pub async fn select_range<S: NodeStore>(
        &mut self,
        engine: &TreeEngine<S>,
        anchor: NodeId,
        target: NodeId,
    ) -> TreeResult<()> {
        let anchor_node = engine.require_node(anchor).await?;
        let target_node = engine.require_node(target).await?;

        let range = match anchor_node.parent_id {
            Some(parent_id) if anchor_node.parent_id == target_node.parent_id => {
                let siblings = engine.ordered_children(parent_id).await?;
                let anchor_at = siblings.iter().position(|node| node.id == anchor);
                let target_at = siblings.iter().position(|node| node.id == target);
                match (anchor_at, target_at) {
                    (Some(a), Some(b)) => {
                        let (start, end) = if a <= b { (a, b) } else { (b, a) };
                        siblings[start..=end].iter().map(|node| node.id).collect()
                    }
                    _ => vec![target],
                }
            }
            _ => vec![target],
        };

        self.set_selected(range);
        Ok(())
    }

    fn changed(&self) {
        if let Some(sender) = &self.events {
            emit(sender, TreeEvent::SelectionChanged);
        }
    }
}

fn dedup(ids: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
    let mut unique = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::ViewState;
    use crate::model::node::NodeId;
    use crate::tree::events::{event_channel, TreeEvent};

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    #[test]
    fn setters_dedup_and_signal() {
        let sender = event_channel();
        let mut receiver = sender.subscribe();
        let mut view = ViewState::with_events(sender);

        view.set_checked([id(3), id(2), id(3)]);
        assert_eq!(view.checked(), &[id(3), id(2)]);
        assert_eq!(receiver.try_recv().unwrap(), TreeEvent::SelectionChanged);

        view.toggle_expanded(id(4));
        view.toggle_expanded(id(4));
        assert!(!view.is_expanded(id(4)));
        assert_eq!(receiver.try_recv().unwrap(), TreeEvent::SelectionChanged);
        assert_eq!(receiver.try_recv().unwrap(), TreeEvent::SelectionChanged);
    }

    #[test]
    fn detached_view_state_still_tracks_sets() {
        let mut view = ViewState::new();
        view.set_selected([id(7)]);
        assert!(view.is_selected(id(7)));
        view.clear_selection();
        assert!(view.selected().is_empty());
    }
}
