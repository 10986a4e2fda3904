//! MemoryStore - In-Process TreeStore Implementation
//!
//! Keeps the forest in a `BTreeMap` keyed by [`Path`], so iteration order is
//! tree order for free. A single `tokio::sync::Mutex` guards the map:
//!
//! - A transaction holds the lock from `begin()` until it is committed,
//!   rolled back or dropped, and works on a staged copy of the map.
//! - `commit()` swaps the staged copy in; anything else throws it away.
//! - Store-level reads wait on the same lock, so they only ever see
//!   committed state and can never observe a half-moved subtree.
//!
//! Writers are fully serialized, which is stronger than the read-committed
//! isolation the engine requires.

use crate::db::tree_store::{PathPredicate, PathQuery, SortOrder, StoreTransaction, TreeStore};
use crate::db::DatabaseError;
use crate::models::{Label, Path, TreeNode};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct ForestState {
    by_path: BTreeMap<Path, TreeNode>,
    path_by_id: HashMap<String, Path>,
}

impl ForestState {
    fn get(&self, id: &str) -> Option<TreeNode> {
        self.path_by_id
            .get(id)
            .and_then(|path| self.by_path.get(path))
            .cloned()
    }

    fn query(&self, query: &PathQuery) -> Vec<TreeNode> {
        let matching = self.by_path.values().filter(|node| query.matches(node));
        let limit = query.limit.unwrap_or(usize::MAX);
        match query.order {
            SortOrder::Ascending => matching.take(limit).cloned().collect(),
            SortOrder::Descending => {
                let mut all: Vec<TreeNode> = matching.cloned().collect();
                all.reverse();
                all.truncate(limit);
                all
            }
        }
    }

    fn max_label_under(&self, prefix: Option<&Path>) -> Option<Label> {
        let predicate = PathPredicate::ChildOf(prefix.cloned());
        self.by_path
            .keys()
            .rev()
            .find(|path| predicate.matches(path))
            .map(Path::last_label)
    }

    fn insert(&mut self, node: &TreeNode) -> Result<(), DatabaseError> {
        if self.path_by_id.contains_key(&node.id) {
            return Err(DatabaseError::duplicate_id(&node.id));
        }
        if self.by_path.contains_key(&node.path) {
            return Err(DatabaseError::duplicate_path(node.path.render()));
        }
        self.path_by_id.insert(node.id.clone(), node.path.clone());
        self.by_path.insert(node.path.clone(), node.clone());
        Ok(())
    }

    fn update_path(&mut self, id: &str, path: &Path) -> Result<(), DatabaseError> {
        let current = self
            .path_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| DatabaseError::node_not_found(id))?;
        if &current == path {
            return Ok(());
        }
        if self.by_path.contains_key(path) {
            return Err(DatabaseError::duplicate_path(path.render()));
        }
        let mut node = self
            .by_path
            .remove(&current)
            .ok_or_else(|| DatabaseError::node_not_found(id))?;
        node.path = path.clone();
        self.path_by_id.insert(id.to_string(), path.clone());
        self.by_path.insert(path.clone(), node);
        Ok(())
    }

    fn bulk_replace_prefix(&mut self, old_prefix: &Path, new_prefix: &Path) -> Result<u64, DatabaseError> {
        let descendants: Vec<Path> = self
            .by_path
            .keys()
            .filter(|path| path.is_descendant_of(old_prefix))
            .cloned()
            .collect();

        let mut moved = Vec::with_capacity(descendants.len());
        for old_path in descendants {
            if let Some(node) = self.by_path.remove(&old_path) {
                moved.push(node);
            }
        }

        let count = moved.len() as u64;
        for mut node in moved {
            // Every key came from the descendant filter, so the prefix matches
            let new_path = node
                .path
                .with_prefix_replaced(old_prefix, new_prefix)
                .ok_or_else(|| {
                    DatabaseError::sql_execution(format!(
                        "path {} is not under {}",
                        node.path, old_prefix
                    ))
                })?;
            if self.by_path.contains_key(&new_path) {
                return Err(DatabaseError::duplicate_path(new_path.render()));
            }
            node.path = new_path.clone();
            self.path_by_id.insert(node.id.clone(), new_path.clone());
            self.by_path.insert(new_path, node);
        }
        Ok(count)
    }
}

/// In-process hierarchical store
///
/// Cloning yields another handle to the same forest.
///
/// # Examples
///
/// ```rust
/// use pathtree_core::db::{MemoryStore, TreeStore};
/// use pathtree_core::models::{Label, Path, TreeNode};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let store = MemoryStore::new();
/// let mut tx = store.begin().await?;
/// let node = TreeNode::new("Animal", Path::root(Label::new(1_000_000_000)?));
/// tx.insert(&node).await?;
/// tx.commit().await?;
/// assert_eq!(store.count().await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<ForestState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = ForestState::clone(&guard);
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        Ok(self.state.lock().await.get(id))
    }

    async fn query(&self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError> {
        Ok(self.state.lock().await.query(query))
    }

    async fn max_label_under(&self, prefix: Option<&Path>) -> Result<Option<Label>, DatabaseError> {
        Ok(self.state.lock().await.max_label_under(prefix))
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        Ok(self.state.lock().await.by_path.len() as u64)
    }
}

/// Transaction over a [`MemoryStore`]
///
/// Holds the store lock for its whole lifetime.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<ForestState>,
    staged: ForestState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert(&mut self, node: &TreeNode) -> Result<(), DatabaseError> {
        self.staged.insert(node)
    }

    async fn update_path(&mut self, id: &str, path: &Path) -> Result<(), DatabaseError> {
        self.staged.update_path(id, path)
    }

    async fn bulk_replace_prefix(
        &mut self,
        old_prefix: &Path,
        new_prefix: &Path,
    ) -> Result<u64, DatabaseError> {
        self.staged.bulk_replace_prefix(old_prefix, new_prefix)
    }

    async fn get_node(&mut self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        Ok(self.staged.get(id))
    }

    async fn query(&mut self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError> {
        Ok(self.staged.query(query))
    }

    async fn max_label_under(
        &mut self,
        prefix: Option<&Path>,
    ) -> Result<Option<Label>, DatabaseError> {
        Ok(self.staged.max_label_under(prefix))
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        // Dropping the staged copy with the guard discards it
        Ok(())
    }
}
