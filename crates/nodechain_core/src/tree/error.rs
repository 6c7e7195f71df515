//! Tree engine error taxonomy.

use crate::model::node::{NodeId, NodeType};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TreeResult<T> = Result<T, TreeError>;

/// Why a destination (parent plus splice point) was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    /// Destination parent is the root slot (`parent_id = None`).
    Root,
    /// `prev_id` or `next_id` is one of the nodes being moved.
    SplicePointInSelection(NodeId),
    /// Splice point lives under a different parent.
    ForeignSibling { sibling: NodeId, parent: NodeId },
    /// `prev_id` and `next_id` are not neighbours in the destination chain.
    NotAdjacent {
        prev: Option<NodeId>,
        next: Option<NodeId>,
    },
    /// Destination parent is a moved node or one of its descendants.
    Cycle { node: NodeId, parent: NodeId },
    /// A root record has no chain to leave.
    MovingRoot(NodeId),
}

impl Display for DestinationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root is not a valid destination"),
            Self::SplicePointInSelection(id) => {
                write!(f, "splice point {id} is part of the moving selection")
            }
            Self::ForeignSibling { sibling, parent } => {
                write!(f, "splice point {sibling} is not a child of {parent}")
            }
            Self::NotAdjacent { prev, next } => write!(
                f,
                "splice points prev={} next={} are not adjacent",
                NodeId::to_wire(*prev),
                NodeId::to_wire(*next)
            ),
            Self::Cycle { node, parent } => {
                write!(f, "moving {node} under {parent} would create a cycle")
            }
            Self::MovingRoot(id) => write!(f, "root {id} cannot be moved"),
        }
    }
}

/// Why a sibling chain walk or check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    /// Children exist but none has `prev_id = None`.
    MissingHead,
    /// More than one child claims to be head.
    MultipleHeads(Vec<NodeId>),
    /// `next_id` points at a record absent from the sibling set.
    DanglingNext { from: NodeId, missing: NodeId },
    /// `a.next_id = b` but `b.prev_id != a`.
    AsymmetricLink { from: NodeId, to: NodeId },
    /// The walk revisited a node.
    Cycle(NodeId),
    /// The walk ended before visiting every sibling.
    Unreached(Vec<NodeId>),
}

impl Display for ChainFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHead => write!(f, "no head"),
            Self::MultipleHeads(ids) => write!(f, "multiple heads {ids:?}"),
            Self::DanglingNext { from, missing } => {
                write!(f, "{from}.next_id points at missing sibling {missing}")
            }
            Self::AsymmetricLink { from, to } => {
                write!(f, "{from}.next_id = {to} but {to}.prev_id != {from}")
            }
            Self::Cycle(id) => write!(f, "walk revisited {id}"),
            Self::Unreached(ids) => write!(f, "siblings {ids:?} not reachable from head"),
        }
    }
}

/// Errors from tree engine operations.
#[derive(Debug)]
pub enum TreeError {
    /// Child type is not allowed under the parent type.
    PlacementViolation {
        child_type: NodeType,
        parent_type: NodeType,
    },
    /// A move batch spans several types or several parents.
    HeterogeneousSelection,
    /// Destination parent or splice point is not acceptable.
    InvalidDestination(DestinationError),
    /// Sibling chain under `parent_id` is inconsistent.
    BrokenChain {
        parent_id: NodeId,
        fault: ChainFault,
    },
    /// A store call failed; the mutation stopped where it was.
    StorageFailure(StoreError),
    NodeNotFound(NodeId),
    EmptySelection,
    /// Type is not part of the configured enumeration.
    UnknownType(NodeType),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlacementViolation {
                child_type,
                parent_type,
            } => write!(
                f,
                "node of type `{child_type}` cannot be placed under `{parent_type}`"
            ),
            Self::HeterogeneousSelection => {
                write!(f, "moved nodes must share one parent and one type")
            }
            Self::InvalidDestination(reason) => write!(f, "invalid destination: {reason}"),
            Self::BrokenChain { parent_id, fault } => {
                write!(f, "broken sibling chain under {parent_id}: {fault}")
            }
            Self::StorageFailure(err) => write!(f, "storage failure: {err}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::EmptySelection => write!(f, "no nodes selected"),
            Self::UnknownType(node_type) => write!(f, "unknown node type `{node_type}`"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(value: StoreError) -> Self {
        Self::StorageFailure(value)
    }
}

impl From<DestinationError> for TreeError {
    fn from(value: DestinationError) -> Self {
        Self::InvalidDestination(value)
    }
}

impl TreeError {
    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PlacementViolation { .. } => "placement_violation",
            Self::HeterogeneousSelection => "heterogeneous_selection",
            Self::InvalidDestination(_) => "invalid_destination",
            Self::BrokenChain { .. } => "broken_chain",
            Self::StorageFailure(_) => "storage_failure",
            Self::NodeNotFound(_) => "node_not_found",
            Self::EmptySelection => "empty_selection",
            Self::UnknownType(_) => "unknown_type",
        }
    }
}
