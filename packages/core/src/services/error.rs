//! Service Layer Error Types
//!
//! Errors surfaced by [`TreeService`](crate::services::TreeService). Lower
//! layers keep their own enums; this one adds the failures only the
//! orchestration layer can see (missing ids, exhausted retries, failed moves).

use crate::db::DatabaseError;
use crate::models::PathError;
use crate::operations::TreeOperationError;
use thiserror::Error;

/// Tree service errors
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Every allocation attempt lost a race for the same path
    #[error("Could not allocate a path under {parent} after {attempts} attempts")]
    AllocationRetriesExhausted { parent: String, attempts: usize },

    /// The subtree rewrite failed and was rolled back; no state changed
    #[error("Move of node {node_id} failed: {source}")]
    MoveFailed {
        node_id: String,
        #[source]
        source: TreeOperationError,
    },

    /// Configuration rejected by `TreeConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Planning or precondition failure (no state changed)
    #[error(transparent)]
    Operation(#[from] TreeOperationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl TreeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a retries exhausted error
    pub fn allocation_retries_exhausted(parent: impl Into<String>, attempts: usize) -> Self {
        Self::AllocationRetriesExhausted {
            parent: parent.into(),
            attempts,
        }
    }

    /// Create a move failed error
    pub fn move_failed(node_id: impl Into<String>, source: TreeOperationError) -> Self {
        Self::MoveFailed {
            node_id: node_id.into(),
            source,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the failure was a racing writer taking the same path
    pub fn is_duplicate_path(&self) -> bool {
        match self {
            Self::MoveFailed { source, .. } | Self::Operation(source) => source.is_duplicate_path(),
            Self::DatabaseError(e) => e.is_duplicate_path(),
            _ => false,
        }
    }
}
