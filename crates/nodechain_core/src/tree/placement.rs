//! Type placement rules.
//!
//! # Responsibility
//! - Answer whether a child type may live under a parent type.
//!
//! # Invariants
//! - Checks are pure; callers run them before the first store write.

use super::error::{TreeError, TreeResult};
use crate::config::TreeConfig;
use crate::model::node::NodeType;
use std::sync::Arc;

/// Direction-table lookups over a validated `TreeConfig`.
#[derive(Debug, Clone)]
pub struct PlacementValidator {
    config: Arc<TreeConfig>,
}

impl PlacementValidator {
    pub fn new(config: Arc<TreeConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn can_place(&self, child_type: &NodeType, parent_type: &NodeType) -> bool {
        self.config
            .allowed_parents_of(child_type)
            .contains(parent_type)
    }

    /// Fails with `UnknownType` for types outside the enumeration.
    pub fn ensure_known(&self, node_type: &NodeType) -> TreeResult<()> {
        if self.config.is_known(node_type) {
            Ok(())
        } else {
            Err(TreeError::UnknownType(node_type.clone()))
        }
    }

    /// Fails with `PlacementViolation` carrying both types.
    pub fn check(&self, child_type: &NodeType, parent_type: &NodeType) -> TreeResult<()> {
        self.ensure_known(child_type)?;
        if self.can_place(child_type, parent_type) {
            return Ok(());
        }
        Err(TreeError::PlacementViolation {
            child_type: child_type.clone(),
            parent_type: parent_type.clone(),
        })
    }

    pub fn is_leaf(&self, node_type: &NodeType) -> bool {
        self.config.is_leaf(node_type)
    }
}
