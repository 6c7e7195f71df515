//! Change notifications for tree observers.
//!
//! Events are payload-free: observers re-read whatever they render.
//! Delivery uses a tokio broadcast channel, so a slow subscriber lags
//! instead of blocking the engine.

use tokio::sync::broadcast;

/// Capacity of the broadcast ring; lagging receivers skip older events.
pub const TREE_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Signals emitted to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeEvent {
    /// A mutation completed successfully.
    TreeChanged,
    /// Selected, checked or expanded sets changed.
    SelectionChanged,
}

impl TreeEvent {
    pub fn topic(self) -> &'static str {
        match self {
            Self::TreeChanged => "nodes",
            Self::SelectionChanged => "nodes_meta",
        }
    }
}

/// Creates a sender with the default capacity.
pub fn event_channel() -> broadcast::Sender<TreeEvent> {
    let (sender, _) = broadcast::channel(TREE_EVENT_CHANNEL_CAPACITY);
    sender
}

/// Sends without caring whether anyone listens.
pub(crate) fn emit(sender: &broadcast::Sender<TreeEvent>, event: TreeEvent) {
    // No receivers is a normal state for headless callers.
    let _ = sender.send(event);
}
