//! Error types for the tree operations layer
//!
//! This module defines the errors raised while allocating labels, planning
//! moves and rewriting subtrees. Caller-contract violations are reported
//! synchronously and never silently corrected.

use crate::db::DatabaseError;
use crate::models::{Label, PathError};
use thiserror::Error;

/// Errors that can occur during tree operations
///
/// # Examples
///
/// ```rust
/// use pathtree_core::operations::TreeOperationError;
///
/// let err = TreeOperationError::MissingAnchor;
/// assert_eq!(err.to_string(), "Relocate needs at least one of 'after' or 'before'");
/// ```
#[derive(Error, Debug)]
pub enum TreeOperationError {
    /// Path parsing or path arithmetic failed (malformed path, root has no
    /// parent, label overflow)
    #[error(transparent)]
    Path(#[from] PathError),

    /// The target parent has no path yet
    #[error("Parent must be saved before receiving children")]
    ParentNotPersisted,

    /// A move was requested for a node that has no path yet
    #[error("Node must be saved before it can be moved")]
    NodeNotPersisted,

    /// Relocate was called with neither `after` nor `before`
    #[error("Relocate needs at least one of 'after' or 'before'")]
    MissingAnchor,

    /// The resolved `after` / `before` anchors have different parents
    #[error("Before and after nodes aren't actually siblings: '{after}' and '{before}'")]
    NotSiblings { after: String, before: String },

    /// No integer label lies strictly between two adjacent siblings
    #[error("No gap available between labels {prev:?} and {next}")]
    NoGapAvailable { prev: Option<Label>, next: Label },

    /// The move would place a node inside its own subtree
    #[error("Cannot move '{path}' under itself or its own descendant '{target}'")]
    CycleDetected { path: String, target: String },

    /// An anchor cannot be used for this relocation
    #[error("Invalid relocation anchor: {reason}")]
    InvalidAnchor { reason: String },

    /// Store operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl TreeOperationError {
    /// Create a not-siblings error
    pub fn not_siblings(after: impl Into<String>, before: impl Into<String>) -> Self {
        Self::NotSiblings {
            after: after.into(),
            before: before.into(),
        }
    }

    /// Create a cycle detected error
    pub fn cycle_detected(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self::CycleDetected {
            path: path.into(),
            target: target.into(),
        }
    }

    /// Create an invalid anchor error
    pub fn invalid_anchor(reason: impl Into<String>) -> Self {
        Self::InvalidAnchor {
            reason: reason.into(),
        }
    }

    /// Whether the failure was a racing writer taking the same path
    pub fn is_duplicate_path(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_duplicate_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_path_detection() {
        let err = TreeOperationError::from(DatabaseError::duplicate_path("000000001000000000"));
        assert!(err.is_duplicate_path());
        assert!(!TreeOperationError::MissingAnchor.is_duplicate_path());
    }

    #[test]
    fn test_no_gap_message() {
        let err = TreeOperationError::NoGapAvailable {
            prev: Some(Label::new(4).unwrap()),
            next: Label::new(5).unwrap(),
        };
        assert!(err.to_string().contains("000000000000000005"));
    }
}
