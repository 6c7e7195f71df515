//! Record store adapter consumed by the tree engine.
//!
//! # Responsibility
//! - Define the four-call collection contract (insert/select/update/delete).
//! - Host the in-memory and SQLite implementations.
//!
//! # Invariants
//! - Every call commits on its own; there is no multi-call transaction.
//! - `select_where` results are unordered; order lives in the sibling links.

use crate::db::DbError;
use crate::model::node::{NewNode, Node, NodeId, NodePatch};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryNodeStore;
pub use sqlite::SqliteNodeStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Insert carried an id that already exists.
    DuplicateId(NodeId),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection mutex was poisoned by a panicking writer.
    LockPoisoned,
    /// Failure produced on purpose by `MemoryNodeStore::fail_after_writes`.
    Injected(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "node id already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid node data: {message}"),
            Self::LockPoisoned => write!(f, "node store lock poisoned"),
            Self::Injected(message) => write!(f, "injected store failure: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Equality predicate over record fields. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub id: Option<NodeId>,
    pub parent_id: Option<Option<NodeId>>,
    pub prev_id: Option<Option<NodeId>>,
    pub next_id: Option<Option<NodeId>>,
}

impl NodeFilter {
    pub fn by_id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// All records whose `parent_id` equals `parent_id`.
    pub fn children_of(parent_id: NodeId) -> Self {
        Self {
            parent_id: Some(Some(parent_id)),
            ..Self::default()
        }
    }

    /// Records with no parent (the distinguished root, normally one).
    pub fn roots() -> Self {
        Self {
            parent_id: Some(None),
            ..Self::default()
        }
    }

    pub fn with_prev(mut self, link: Option<NodeId>) -> Self {
        self.prev_id = Some(link);
        self
    }

    pub fn with_next(mut self, link: Option<NodeId>) -> Self {
        self.next_id = Some(link);
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.id.map_or(true, |id| node.id == id)
            && self.parent_id.map_or(true, |link| node.parent_id == link)
            && self.prev_id.map_or(true, |link| node.prev_id == link)
            && self.next_id.map_or(true, |link| node.next_id == link)
    }
}

/// Collection of node records keyed by a store-assigned id.
///
/// Implementations must be `Send + Sync` so one store can back an engine
/// shared across tasks.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Inserts records and returns them with assigned ids, in input order.
    ///
    /// Records carrying `id = Some(_)` keep that id; an existing id fails
    /// with `StoreError::DuplicateId` before anything is written.
    async fn insert_records(&self, records: Vec<NewNode>) -> StoreResult<Vec<Node>>;

    /// Returns every record matching `filter`, in no particular order.
    async fn select_where(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>>;

    /// Applies `patch` to the record with `id`. Returns the updated count.
    async fn update_where(&self, id: NodeId, patch: &NodePatch) -> StoreResult<u64>;

    /// Deletes every record whose id is in `ids`. Returns the deleted count.
    async fn delete_where(&self, ids: &[NodeId]) -> StoreResult<u64>;
}
