//! Database Layer
//!
//! This module holds the hierarchical store: the collaborator that persists
//! one path per node and answers prefix predicates.
//!
//! - [`TreeStore`] / [`StoreTransaction`] - the abstraction the engine talks to
//! - [`MemoryStore`] - in-process backend (`BTreeMap` + exclusive transactions)
//! - [`LibsqlStore`] - embedded SQLite backend via libsql
//! - [`TreeEvent`] - domain events published after commits

mod error;
pub mod events;
mod libsql_store;
mod memory_store;
pub mod tree_store;

pub use error::DatabaseError;
pub use events::TreeEvent;
pub use libsql_store::{LibsqlStore, LibsqlTransaction, DEFAULT_BUSY_TIMEOUT_MS};
pub use memory_store::{MemoryStore, MemoryTransaction};
pub use tree_store::{PathPredicate, PathQuery, SortOrder, StoreTransaction, TreeStore};
