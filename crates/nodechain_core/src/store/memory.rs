//! In-process node collection.
//!
//! # Responsibility
//! - Provide a `NodeStore` with no persistence for tests and embedders.
//! - Count writes and inject failures so partial-relink paths can be exercised.
//!
//! # Invariants
//! - Ids are assigned from a monotonic counter and never reused.
//! - A rejected insert batch writes nothing.

use super::{NodeFilter, NodeStore, StoreError, StoreResult};
use crate::model::node::{NewNode, Node, NodeId, NodePatch};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct MemoryState {
    records: BTreeMap<NodeId, Node>,
    next_raw_id: i64,
    writes: u64,
    fail_after: Option<u64>,
}

/// Mutex-guarded in-memory record collection.
#[derive(Debug)]
pub struct MemoryNodeStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: BTreeMap::new(),
                next_raw_id: 1,
                writes: 0,
                fail_after: None,
            }),
        }
    }

    /// Lets `allowed` more write calls succeed, then fails every later one.
    pub fn fail_after_writes(&self, allowed: u64) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.fail_after = Some(state.writes + allowed);
        Ok(())
    }

    /// Clears a pending failure injection.
    pub fn clear_failure(&self) -> StoreResult<()> {
        self.lock()?.fail_after = None;
        Ok(())
    }

    /// Number of successful write calls (insert/update/delete) so far.
    pub fn write_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.writes)
    }

    /// All records ordered by id.
    pub fn snapshot(&self) -> StoreResult<Vec<Node>> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl MemoryState {
    fn begin_write(&self, operation: &str) -> StoreResult<()> {
        match self.fail_after {
            Some(limit) if self.writes >= limit => Err(StoreError::Injected(format!(
                "{operation} rejected after {limit} writes"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn insert_records(&self, records: Vec<NewNode>) -> StoreResult<Vec<Node>> {
        let mut state = self.lock()?;
        state.begin_write("insert")?;

        let mut claimed = HashSet::new();
        for record in &records {
            if let Some(id) = record.id {
                if state.records.contains_key(&id) || !claimed.insert(id) {
                    return Err(StoreError::DuplicateId(id));
                }
            }
        }

        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let id = match record.id {
                Some(id) => id,
                None => {
                    let mut raw = state.next_raw_id;
                    while NodeId::new(raw).is_some_and(|id| claimed.contains(&id)) {
                        raw += 1;
                    }
                    NodeId::new(raw).ok_or_else(|| {
                        StoreError::InvalidData(format!("id counter produced `{raw}`"))
                    })?
                }
            };
            state.next_raw_id = state.next_raw_id.max(id.get() + 1);
            let node = record.into_node(id);
            state.records.insert(id, node.clone());
            inserted.push(node);
        }

        state.writes += 1;
        Ok(inserted)
    }

    async fn select_where(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|node| filter.matches(node))
            .cloned()
            .collect())
    }

    async fn update_where(&self, id: NodeId, patch: &NodePatch) -> StoreResult<u64> {
        let mut state = self.lock()?;
        state.begin_write("update")?;
        let changed = match state.records.get_mut(&id) {
            Some(node) => {
                patch.apply_to(node);
                1
            }
            None => 0,
        };
        state.writes += 1;
        Ok(changed)
    }

    async fn delete_where(&self, ids: &[NodeId]) -> StoreResult<u64> {
        let mut state = self.lock()?;
        state.begin_write("delete")?;
        let mut removed = 0;
        for id in ids {
            if state.records.remove(id).is_some() {
                removed += 1;
            }
        }
        state.writes += 1;
        Ok(removed)
    }
}
