//! Database Error Types
//!
//! This module defines error types for hierarchical store operations,
//! covering connection, initialization, constraint and query failures.

use crate::models::PathError;
use std::path::PathBuf;
use thiserror::Error;

/// Store operation errors
///
/// Covers all error cases for store connection, initialization, and path
/// persistence. Caller-contract errors are handled by the operations layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// Another live node already holds this path (uniqueness constraint)
    #[error("Path already exists: {path}")]
    DuplicatePath { path: String },

    /// Another live node already holds this id
    #[error("Node id already exists: {id}")]
    DuplicateId { id: String },

    /// Write targeted a node that does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// A stored path value could not be parsed
    #[error("Stored path for node {id} is corrupt: {source}")]
    CorruptPath { id: String, source: PathError },

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// Transaction control (begin/commit/rollback) failed
    #[error("Transaction failed: {context}")]
    TransactionFailed { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a duplicate path error
    pub fn duplicate_path(path: impl Into<String>) -> Self {
        Self::DuplicatePath { path: path.into() }
    }

    /// Create a duplicate id error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a corrupt path error
    pub fn corrupt_path(id: impl Into<String>, source: PathError) -> Self {
        Self::CorruptPath {
            id: id.into(),
            source,
        }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a transaction failed error
    pub fn transaction_failed(context: impl Into<String>) -> Self {
        Self::TransactionFailed {
            context: context.into(),
        }
    }

    /// Whether a racing writer took the path first (retry with a fresh read)
    pub fn is_duplicate_path(&self) -> bool {
        matches!(self, Self::DuplicatePath { .. })
    }
}
