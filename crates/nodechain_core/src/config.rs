//! Node type enumeration and placement table.
//!
//! # Responsibility
//! - Describe which node types exist and under which parent types each may live.
//! - Describe the type priority used by subtree sort.
//!
//! # Invariants
//! - The direction table is total: every type has an entry, possibly empty.
//! - Every type named anywhere in the config is part of `types`.
//! - `sort_priority` is a permutation of `types`.

use crate::model::node::NodeType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid type name regex"));

/// Configuration loading and validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    NoTypes,
    InvalidTypeName(String),
    DuplicateType(NodeType),
    /// A type has no entry in the direction table.
    MissingDirections(NodeType),
    /// A type name appears in the table or priority but not in `types`.
    UnknownType(NodeType),
    /// `sort_priority` does not list every type exactly once.
    InvalidSortPriority,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read tree config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse tree config: {err}"),
            Self::NoTypes => write!(f, "tree config must declare at least one type"),
            Self::InvalidTypeName(name) => write!(f, "invalid node type name `{name}`"),
            Self::DuplicateType(node_type) => write!(f, "duplicate node type `{node_type}`"),
            Self::MissingDirections(node_type) => {
                write!(f, "node type `{node_type}` has no allowed_parents entry")
            }
            Self::UnknownType(node_type) => write!(f, "unknown node type `{node_type}`"),
            Self::InvalidSortPriority => {
                write!(f, "sort_priority must list every node type exactly once")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Type enumeration, direction table and sort priority.
///
/// JSON shape:
/// ```json
/// {
///   "types": ["task", "document", "page"],
///   "allowed_parents": {
///     "task": ["task"],
///     "document": ["task"],
///     "page": ["task", "document"]
///   },
///   "sort_priority": ["task", "document", "page"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub types: Vec<NodeType>,
    /// Child type -> parent types it may be placed under.
    pub allowed_parents: BTreeMap<NodeType, Vec<NodeType>>,
    /// Defaults to `types` order when omitted.
    #[serde(default)]
    pub sort_priority: Vec<NodeType>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        let task = NodeType::task();
        let document = NodeType::document();
        let page = NodeType::page();
        let allowed_parents = BTreeMap::from([
            (task.clone(), vec![task.clone()]),
            (document.clone(), vec![task.clone()]),
            (page.clone(), vec![task.clone(), document.clone()]),
        ]);
        Self {
            types: vec![task.clone(), document.clone(), page.clone()],
            allowed_parents,
            sort_priority: vec![task, document, page],
        }
    }
}

impl TreeConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(text)?;
        if config.sort_priority.is_empty() {
            config.sort_priority = config.types.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks totality and consistency of the tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.types.is_empty() {
            return Err(ConfigError::NoTypes);
        }

        let mut declared = BTreeSet::new();
        for node_type in &self.types {
            if !TYPE_NAME_RE.is_match(node_type.as_str()) {
                return Err(ConfigError::InvalidTypeName(node_type.to_string()));
            }
            if !declared.insert(node_type) {
                return Err(ConfigError::DuplicateType(node_type.clone()));
            }
        }

        for node_type in &self.types {
            if !self.allowed_parents.contains_key(node_type) {
                return Err(ConfigError::MissingDirections(node_type.clone()));
            }
        }
        for (child, parents) in &self.allowed_parents {
            if !declared.contains(child) {
                return Err(ConfigError::UnknownType(child.clone()));
            }
            if let Some(unknown) = parents.iter().find(|parent| !declared.contains(parent)) {
                return Err(ConfigError::UnknownType(unknown.clone()));
            }
        }

        let priority: BTreeSet<&NodeType> = self.sort_priority.iter().collect();
        if let Some(unknown) = self
            .sort_priority
            .iter()
            .find(|node_type| !declared.contains(node_type))
        {
            return Err(ConfigError::UnknownType(unknown.clone()));
        }
        if priority.len() != self.sort_priority.len() || priority.len() != declared.len() {
            return Err(ConfigError::InvalidSortPriority);
        }

        Ok(())
    }

    pub fn is_known(&self, node_type: &NodeType) -> bool {
        self.types.contains(node_type)
    }

    /// Parent types `child` may be placed under.
    pub fn allowed_parents_of(&self, child: &NodeType) -> &[NodeType] {
        self.allowed_parents
            .get(child)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A leaf type is one that no type may be placed under.
    pub fn is_leaf(&self, node_type: &NodeType) -> bool {
        !self
            .allowed_parents
            .values()
            .any(|parents| parents.contains(node_type))
    }

    /// Position of `node_type` in the sort priority; unknown types sort last.
    pub fn sort_rank(&self, node_type: &NodeType) -> usize {
        self.sort_priority
            .iter()
            .position(|candidate| candidate == node_type)
            .unwrap_or(self.sort_priority.len())
    }
}
