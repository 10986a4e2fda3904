//! Tree Node Data Structure
//!
//! A `TreeNode` is the unit the hierarchical store keeps: a stable identity,
//! a display name, and the mutable [`Path`] that places it in the forest.
//! The path is the only field the tree engine ever rewrites.

use crate::models::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted node and its current position
///
/// # Examples
///
/// ```rust
/// use pathtree_core::models::{Label, Path, TreeNode};
///
/// let root = TreeNode::new("Animal", Path::root(Label::new(1_000_000_000).unwrap()));
/// assert!(root.is_root());
/// assert_eq!(root.path.render(), "000000001000000000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique identifier (UUID v4), independent of position
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Position in the tree; doubles as the sort key
    pub path: Path,

    /// Timestamp when the node was created
    pub created_at: DateTime<Utc>,
}

impl TreeNode {
    /// Create a node with a generated UUID
    pub fn new(name: impl Into<String>, path: Path) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), name, path)
    }

    /// Create a node with a caller-chosen identifier
    pub fn new_with_id(id: impl Into<String>, name: impl Into<String>, path: Path) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path,
            created_at: Utc::now(),
        }
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }
}
