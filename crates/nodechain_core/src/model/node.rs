//! Node record model.
//!
//! # Responsibility
//! - Define the single persisted entity of the tree and its insert/patch shapes.
//! - Keep "distinguished root" and "no sibling link" as separate concepts.
//!
//! # Invariants
//! - `NodeId` is always positive; `0` only exists on the storage wire.
//! - `parent_id = None` marks the distinguished root, never "unlinked".
//! - `prev_id`/`next_id = None` mark the head/tail of a sibling chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Store-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    /// Wraps a raw id. Returns `None` for the `0` sentinel and negative values.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Raw integer value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Decodes a wire link column where `0` means "no link".
    pub fn from_wire(raw: i64) -> Option<Self> {
        Self::new(raw)
    }

    /// Encodes an optional link for the wire, mapping `None` to `0`.
    pub fn to_wire(link: Option<NodeId>) -> i64 {
        link.map_or(0, NodeId::get)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type name drawn from the configured enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeType(String);

impl NodeType {
    pub const TASK: &'static str = "task";
    pub const DOCUMENT: &'static str = "document";
    pub const PAGE: &'static str = "page";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn task() -> Self {
        Self::new(Self::TASK)
    }

    pub fn document() -> Self {
        Self::new(Self::DOCUMENT)
    }

    pub fn page() -> Self {
        Self::new(Self::PAGE)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Persisted node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Containing node. `None` only for the distinguished root.
    pub parent_id: Option<NodeId>,
    /// Serialized as `type` to match the record layout.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: Option<String>,
    pub content: Option<String>,
    pub context: Option<Value>,
    pub external_id: Option<i64>,
    pub prev_id: Option<NodeId>,
    pub next_id: Option<NodeId>,
}

impl Node {
    pub fn is_head(&self) -> bool {
        self.prev_id.is_none()
    }

    pub fn is_tail(&self) -> bool {
        self.next_id.is_none()
    }

    /// Full-record copy used by the replace path (delete then re-insert).
    pub fn to_new_node(&self) -> NewNode {
        NewNode {
            id: Some(self.id),
            parent_id: self.parent_id,
            node_type: self.node_type.clone(),
            name: self.name.clone(),
            content: self.content.clone(),
            context: self.context.clone(),
            external_id: self.external_id,
            prev_id: self.prev_id,
            next_id: self.next_id,
        }
    }
}

/// Insert payload.
///
/// `id` is normally `None` so the store assigns one; the relink paths of move
/// and sort pass the existing id back to re-insert a full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub external_id: Option<i64>,
    #[serde(default)]
    pub prev_id: Option<NodeId>,
    #[serde(default)]
    pub next_id: Option<NodeId>,
}

impl NewNode {
    /// Creates an unplaced payload of the given type with empty fields.
    pub fn new(node_type: impl Into<NodeType>) -> Self {
        Self {
            id: None,
            parent_id: None,
            node_type: node_type.into(),
            name: None,
            content: None,
            context: None,
            external_id: None,
            prev_id: None,
            next_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_external_id(mut self, external_id: i64) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn under(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn after(mut self, prev_id: NodeId) -> Self {
        self.prev_id = Some(prev_id);
        self
    }

    pub fn before(mut self, next_id: NodeId) -> Self {
        self.next_id = Some(next_id);
        self
    }

    /// Materializes a stored record once the store picked an id.
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            parent_id: self.parent_id,
            node_type: self.node_type,
            name: self.name,
            content: self.content,
            context: self.context,
            external_id: self.external_id,
            prev_id: self.prev_id,
            next_id: self.next_id,
        }
    }
}

/// Partial update. `None` leaves a field unchanged.
///
/// Link fields are doubly optional: `Some(None)` clears the link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub parent_id: Option<Option<NodeId>>,
    pub prev_id: Option<Option<NodeId>>,
    pub next_id: Option<Option<NodeId>>,
    pub name: Option<Option<String>>,
    pub content: Option<Option<String>>,
    pub context: Option<Option<Value>>,
    pub external_id: Option<Option<i64>>,
}

impl NodePatch {
    pub fn prev(link: Option<NodeId>) -> Self {
        Self {
            prev_id: Some(link),
            ..Self::default()
        }
    }

    pub fn next(link: Option<NodeId>) -> Self {
        Self {
            next_id: Some(link),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch to an in-memory record.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(value) = self.parent_id {
            node.parent_id = value;
        }
        if let Some(value) = self.prev_id {
            node.prev_id = value;
        }
        if let Some(value) = self.next_id {
            node.next_id = value;
        }
        if let Some(value) = &self.name {
            node.name = value.clone();
        }
        if let Some(value) = &self.content {
            node.content = value.clone();
        }
        if let Some(value) = &self.context {
            node.context = value.clone();
        }
        if let Some(value) = self.external_id {
            node.external_id = value;
        }
    }
}

/// Payload-only update accepted by the engine; links are never exposed here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFieldsUpdate {
    pub name: Option<Option<String>>,
    pub content: Option<Option<String>>,
    pub context: Option<Option<Value>>,
    pub external_id: Option<Option<i64>>,
}

impl From<NodeFieldsUpdate> for NodePatch {
    fn from(value: NodeFieldsUpdate) -> Self {
        Self {
            name: value.name,
            content: value.content,
            context: value.context,
            external_id: value.external_id,
            ..Self::default()
        }
    }
}

/// Nested tree value produced by assembly and sort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Child ids in order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children.iter().map(TreeNode::id).collect()
    }

    /// Depth-first, parent-before-children ids of the whole tree.
    pub fn preorder_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            ids.push(current.id());
            stack.extend(current.children.iter().rev());
        }
        ids
    }

    /// Finds a subtree by id.
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if current.id() == id {
                return Some(current);
            }
            stack.extend(current.children.iter());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{NewNode, Node, NodeId, NodePatch, NodeType, TreeNode};

    fn id(raw: i64) -> NodeId {
        NodeId::new(raw).unwrap()
    }

    #[test]
    fn node_id_rejects_zero_sentinel() {
        assert!(NodeId::new(0).is_none());
        assert!(NodeId::new(-3).is_none());
        assert_eq!(NodeId::new(7).map(NodeId::get), Some(7));
    }

    #[test]
    fn wire_links_map_zero_to_none() {
        assert_eq!(NodeId::from_wire(0), None);
        assert_eq!(NodeId::to_wire(None), 0);
        assert_eq!(NodeId::to_wire(Some(id(12))), 12);
    }

    #[test]
    fn patch_clears_and_sets_links() {
        let mut node = NewNode::new(NodeType::task()).after(id(2)).into_node(id(5));
        NodePatch::prev(None).apply_to(&mut node);
        NodePatch::next(Some(id(9))).apply_to(&mut node);
        assert_eq!(node.prev_id, None);
        assert_eq!(node.next_id, Some(id(9)));
        assert!(NodePatch::default().is_empty());
    }

    #[test]
    fn node_serializes_with_type_key() {
        let node: Node = NewNode::new(NodeType::page()).under(id(1)).into_node(id(3));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "page");
        assert_eq!(json["parentId"], 1);
        assert!(json["prevId"].is_null());
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let leaf = |raw| TreeNode::leaf(NewNode::new(NodeType::page()).into_node(id(raw)));
        let tree = TreeNode {
            node: NewNode::new(NodeType::task()).into_node(id(1)),
            children: vec![
                TreeNode {
                    node: NewNode::new(NodeType::task()).into_node(id(2)),
                    children: vec![leaf(4)],
                },
                leaf(3),
            ],
        };
        assert_eq!(tree.preorder_ids(), vec![id(1), id(2), id(4), id(3)]);
        assert_eq!(tree.find(id(4)).map(TreeNode::id), Some(id(4)));
    }
}
