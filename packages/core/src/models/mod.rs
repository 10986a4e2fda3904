//! Data Models
//!
//! This module contains the value types the tree engine computes with:
//!
//! - `Path` / `Label` - Fixed-width, sortable materialized paths
//! - `TreeNode` - A persisted node (identity, name, path)

pub mod path;
mod tree_node;

pub use path::{Label, Path, PathError, LABEL_SPACE, PAD_LENGTH, SEPARATOR};
pub use tree_node::TreeNode;
