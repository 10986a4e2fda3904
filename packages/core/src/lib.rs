//! PathTree Core
//!
//! A materialized-path tree engine: every node stores its full position as a
//! dotted sequence of zero-padded numeric labels, so ancestry, subtree and
//! sibling questions become prefix queries and tree order is plain string
//! order.
//!
//! # Architecture
//!
//! - **Sparse labels**: siblings are spaced `GAP` apart, inserts between
//!   neighbours bisect the gap
//! - **Late planning**: moves are recorded as intents and resolved to concrete
//!   paths inside the transaction that writes them
//! - **Atomic subtree rewrite**: a move rewrites the node and every
//!   descendant's prefix in one transaction
//!
//! # Modules
//!
//! - [`models`] - `Path`, `Label` and `TreeNode` value types
//! - [`operations`] - label allocation, move planning, subtree rewrite, relation queries
//! - [`db`] - the hierarchical store seam with memory and libsql backends
//! - [`services`] - `TreeService`, the orchestration surface
//! - [`config`] - `TreeConfig`

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::TreeConfig;
pub use models::*;
pub use services::*;
