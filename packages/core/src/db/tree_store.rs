//! TreeStore Trait - Hierarchical Store Abstraction
//!
//! This module defines the `TreeStore` and `StoreTransaction` traits: the seam
//! between the tree engine (allocation, move planning, subtree rewrite) and the
//! backend that persists one path per node.
//!
//! # Contract
//!
//! A backend must:
//!
//! 1. Enforce uniqueness of `path` across live nodes (`DuplicatePath`)
//! 2. Answer prefix predicates ([`PathPredicate`]) ordered by path
//! 3. Apply `bulk_replace_prefix` as one statement inside the enclosing transaction
//! 4. Hide uncommitted transaction state from every other reader
//! 5. Discard all staged writes when a transaction is rolled back or dropped
//!
//! [`PathPredicate::matches`] is the reference semantics for every predicate;
//! backends that translate predicates into their own query language must agree
//! with it.
//!
//! # Examples
//!
//! ```rust
//! use pathtree_core::db::{MemoryStore, PathPredicate, PathQuery, TreeStore};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = MemoryStore::new();
//! let roots = store.query(&PathQuery::new(PathPredicate::ChildOf(None))).await?;
//! assert!(roots.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::db::DatabaseError;
use crate::models::{Label, Path, TreeNode};
use async_trait::async_trait;

/// Path predicate understood by every store backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPredicate {
    /// Every node
    All,

    /// Path equals the given path
    Equals(Path),

    /// Path is a strict prefix of the given path (the given path's ancestors)
    AncestorOf(Path),

    /// Path is strictly prefixed by the given path (its descendants)
    DescendantOf(Path),

    /// Path is the given prefix plus exactly one label; `None` selects roots
    ChildOf(Option<Path>),

    /// Union of the inner predicates
    AnyOf(Vec<PathPredicate>),
}

impl PathPredicate {
    /// Evaluate the predicate against a single path
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Equals(target) => path == target,
            Self::AncestorOf(target) => path.is_ancestor_of(target),
            Self::DescendantOf(target) => path.is_descendant_of(target),
            Self::ChildOf(None) => path.is_root(),
            Self::ChildOf(Some(parent)) => {
                path.depth() == parent.depth() + 1 && path.starts_with(parent)
            }
            Self::AnyOf(inner) => inner.iter().any(|p| p.matches(path)),
        }
    }
}

/// Sort direction over rendered paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Tree order (pre-order, siblings by label)
    #[default]
    Ascending,
    Descending,
}

/// A predicate plus exclusion, strict bounds, ordering and limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    pub predicate: PathPredicate,

    /// Node id to leave out of the result (e.g. self for siblings)
    pub exclude_id: Option<String>,

    /// Only paths strictly greater than this one
    pub after: Option<Path>,

    /// Only paths strictly less than this one
    pub before: Option<Path>,

    pub order: SortOrder,

    pub limit: Option<usize>,
}

impl PathQuery {
    pub fn new(predicate: PathPredicate) -> Self {
        Self {
            predicate,
            exclude_id: None,
            after: None,
            before: None,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    pub fn after(mut self, path: Path) -> Self {
        self.after = Some(path);
        self
    }

    pub fn before(mut self, path: Path) -> Self {
        self.before = Some(path);
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a node passes predicate, exclusion and bounds (not the limit)
    pub fn matches(&self, node: &TreeNode) -> bool {
        if self.exclude_id.as_deref() == Some(node.id.as_str()) {
            return false;
        }
        if self.after.as_ref().is_some_and(|after| &node.path <= after) {
            return false;
        }
        if self.before.as_ref().is_some_and(|before| &node.path >= before) {
            return false;
        }
        self.predicate.matches(&node.path)
    }
}

/// Abstraction over the hierarchical store
///
/// Reads on the store itself observe committed state only. All writes go
/// through a [`StoreTransaction`] obtained from [`TreeStore::begin`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single store can be shared
/// behind an `Arc` across tasks.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Open a transaction with exclusive write access until commit/rollback
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError>;

    /// Get node by ID (`Ok(None)` if it doesn't exist)
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError>;

    /// Run a path query against committed state
    async fn query(&self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError>;

    /// Greatest label among the direct children of `prefix` (roots if `None`)
    async fn max_label_under(&self, prefix: Option<&Path>) -> Result<Option<Label>, DatabaseError>;

    /// Number of live nodes
    async fn count(&self) -> Result<u64, DatabaseError>;
}

/// A unit of work over the store
///
/// Reads inside the transaction observe its own staged writes. Dropping a
/// transaction without calling [`StoreTransaction::commit`] discards every
/// staged write.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a new node; fails with `DuplicatePath` / `DuplicateId`
    async fn insert(&mut self, node: &TreeNode) -> Result<(), DatabaseError>;

    /// Overwrite one node's path; fails with `NodeNotFound` or `DuplicatePath`
    async fn update_path(&mut self, id: &str, path: &Path) -> Result<(), DatabaseError>;

    /// Replace `old_prefix` with `new_prefix` on every strict descendant of
    /// `old_prefix`, in one statement. Returns the number of rows rewritten.
    async fn bulk_replace_prefix(
        &mut self,
        old_prefix: &Path,
        new_prefix: &Path,
    ) -> Result<u64, DatabaseError>;

    async fn get_node(&mut self, id: &str) -> Result<Option<TreeNode>, DatabaseError>;

    async fn query(&mut self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError>;

    async fn max_label_under(
        &mut self,
        prefix: Option<&Path>,
    ) -> Result<Option<Label>, DatabaseError>;

    /// Publish every staged write atomically
    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    /// Discard every staged write
    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(values: &[u64]) -> Path {
        Path::from_labels(values.iter().map(|v| Label::new(*v).unwrap()).collect()).unwrap()
    }

    #[test]
    fn test_child_of_requires_exactly_one_extra_label() {
        let pred = PathPredicate::ChildOf(Some(path(&[1])));
        assert!(pred.matches(&path(&[1, 2])));
        assert!(!pred.matches(&path(&[1])));
        assert!(!pred.matches(&path(&[1, 2, 3])));
        assert!(!pred.matches(&path(&[2, 2])));
    }

    #[test]
    fn test_child_of_none_selects_roots() {
        let pred = PathPredicate::ChildOf(None);
        assert!(pred.matches(&path(&[9])));
        assert!(!pred.matches(&path(&[9, 1])));
    }

    #[test]
    fn test_ancestor_and_descendant_exclude_self() {
        let p = path(&[1, 2]);
        assert!(!PathPredicate::AncestorOf(p.clone()).matches(&p));
        assert!(!PathPredicate::DescendantOf(p.clone()).matches(&p));
        assert!(PathPredicate::AncestorOf(p.clone()).matches(&path(&[1])));
        assert!(PathPredicate::DescendantOf(p).matches(&path(&[1, 2, 5])));
    }

    #[test]
    fn test_any_of_is_a_union() {
        let pred = PathPredicate::AnyOf(vec![
            PathPredicate::Equals(path(&[1])),
            PathPredicate::Equals(path(&[2])),
        ]);
        assert!(pred.matches(&path(&[2])));
        assert!(!pred.matches(&path(&[3])));
        assert!(!PathPredicate::AnyOf(vec![]).matches(&path(&[3])));
    }

    #[test]
    fn test_query_bounds_are_strict() {
        let node = TreeNode::new_with_id("x", "x", path(&[1, 5]));
        let base = PathQuery::new(PathPredicate::All);
        assert!(!base.clone().after(path(&[1, 5])).matches(&node));
        assert!(base.clone().after(path(&[1, 4])).matches(&node));
        assert!(!base.clone().before(path(&[1, 5])).matches(&node));
        assert!(base.clone().before(path(&[1, 6])).matches(&node));
        assert!(!base.excluding("x").matches(&node));
    }
}
