//! Core logic for nodechain, an ordered typed tree over a flat record store.
//! Sibling order lives in each record's `prev_id`/`next_id` links.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;
pub mod tree;

pub use config::{ConfigError, TreeConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{NewNode, Node, NodeFieldsUpdate, NodeId, NodePatch, NodeType, TreeNode};
pub use store::{
    MemoryNodeStore, NodeFilter, NodeStore, SqliteNodeStore, StoreError, StoreResult,
};
pub use tree::{
    ChainFault, Destination, DestinationError, DropPosition, PlacementValidator, TreeEngine,
    TreeError, TreeEvent, TreeResult, ViewState,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
