//! Tree Service - Path Tree Orchestration
//!
//! `TreeService` is the surface applications talk to. Each write runs in its
//! own store transaction:
//!
//! 1. Read the nodes involved (by id) inside the transaction
//! 2. Build the node's [`PathState`] and record the requested move
//! 3. Let [`MovePlanner`] compute the concrete path (allocating labels)
//! 4. Let [`SubtreeRewriter`] write the node and all of its descendants
//! 5. Commit, then publish a [`TreeEvent`]
//!
//! A failure anywhere rolls the transaction back, so callers observe either
//! the whole move or none of it.
//!
//! # Retries
//!
//! Two writers allocating under the same parent can compute the same label.
//! The store's unique-path constraint rejects the loser with `DuplicatePath`;
//! the service then retries from a fresh read with exponential backoff
//! (10ms, 20ms, 40ms, ... by default) up to
//! [`TreeConfig::max_allocation_retries`] times.

use crate::config::TreeConfig;
use crate::db::{
    LibsqlStore, MemoryStore, PathPredicate, PathQuery, StoreTransaction, TreeEvent, TreeStore,
};
use crate::models::{Path, TreeNode};
use crate::operations::{
    settle, MovePlanner, PathState, Relation, RelationQuery, RewriteOutcome, SubtreeRewriter,
};
use crate::services::TreeServiceError;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A write the service knows how to retry
#[derive(Debug, Clone, Copy)]
enum WriteRequest<'a> {
    Create {
        parent_id: Option<&'a str>,
        name: &'a str,
    },
    Reparent {
        node_id: &'a str,
        parent_id: Option<&'a str>,
    },
    Relocate {
        node_id: &'a str,
        after_id: Option<&'a str>,
        before_id: Option<&'a str>,
    },
}

impl WriteRequest<'_> {
    /// Where the write lands, for log and error messages
    fn target(&self) -> String {
        match self {
            Self::Create {
                parent_id: Some(parent),
                ..
            }
            | Self::Reparent {
                parent_id: Some(parent),
                ..
            } => format!("'{}'", parent),
            Self::Create { parent_id: None, .. } | Self::Reparent { parent_id: None, .. } => {
                "the root level".to_string()
            }
            Self::Relocate {
                after_id, before_id, ..
            } => format!(
                "after {:?} / before {:?}",
                after_id.unwrap_or("-"),
                before_id.unwrap_or("-")
            ),
        }
    }
}

/// A committed write: the node as it now stands and what was rewritten
struct Written {
    node: TreeNode,
    outcome: RewriteOutcome,
}

/// Orchestrates path allocation, moves and relation reads over a [`TreeStore`]
///
/// # Examples
///
/// ```rust
/// use pathtree_core::services::TreeService;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let service = TreeService::in_memory();
/// let animal = service.create_root("Animal").await?;
/// let mammal = service.create_child(&animal.id, "Mammal").await?;
/// assert!(mammal.path.is_descendant_of(&animal.path));
/// assert_eq!(service.descendants(&animal.id).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TreeService {
    store: Arc<dyn TreeStore>,
    config: TreeConfig,

    /// Broadcast channel for tree events
    event_tx: broadcast::Sender<TreeEvent>,
}

impl TreeService {
    /// Create a service over `store` with default configuration
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        let config = TreeConfig::default();
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            store,
            config,
            event_tx,
        }
    }

    /// Create a service over `store` with explicit configuration
    pub fn with_config(
        store: Arc<dyn TreeStore>,
        config: TreeConfig,
    ) -> Result<Self, TreeServiceError> {
        config.validate().map_err(TreeServiceError::invalid_config)?;
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Ok(Self {
            store,
            config,
            event_tx,
        })
    }

    /// Service over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Build the store `config` describes and wrap it
    ///
    /// A `database_path` opens (or creates) a libsql file; without one the
    /// forest lives in memory.
    pub async fn open(config: TreeConfig) -> Result<Self, TreeServiceError> {
        config.validate().map_err(TreeServiceError::invalid_config)?;
        let store: Arc<dyn TreeStore> = match &config.database_path {
            Some(path) => {
                Arc::new(LibsqlStore::with_busy_timeout(path.clone(), config.busy_timeout_ms).await?)
            }
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_config(store, config)
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Subscribe to tree events
    ///
    /// Events are sent only after the corresponding transaction committed.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores errors if no subscribers
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create a new root appended after the current last root
    pub async fn create_root(&self, name: &str) -> Result<TreeNode, TreeServiceError> {
        let written = self
            .write_with_retry(WriteRequest::Create {
                parent_id: None,
                name,
            })
            .await?;
        Ok(written.node)
    }

    /// Create a new node appended after the last child of `parent_id`
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if the parent doesn't exist
    /// - `AllocationRetriesExhausted` if concurrent writers kept taking the label
    pub async fn create_child(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<TreeNode, TreeServiceError> {
        let written = self
            .write_with_retry(WriteRequest::Create {
                parent_id: Some(parent_id),
                name,
            })
            .await?;
        Ok(written.node)
    }

    /// Move `node_id` and its subtree to the end of `new_parent_id`'s children
    ///
    /// Reparenting onto the current parent moves the node to the end of its
    /// sibling list.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` for either id
    /// - `Operation(CycleDetected)` if the new parent is the node or inside its subtree
    /// - `MoveFailed` if the rewrite failed (nothing changed)
    pub async fn reparent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<RewriteOutcome, TreeServiceError> {
        let written = self
            .write_with_retry(WriteRequest::Reparent {
                node_id,
                parent_id: Some(new_parent_id),
            })
            .await?;
        Ok(written.outcome)
    }

    /// Make `node_id` a root, appended after the current last root
    pub async fn move_to_root(&self, node_id: &str) -> Result<RewriteOutcome, TreeServiceError> {
        let written = self
            .write_with_retry(WriteRequest::Reparent {
                node_id,
                parent_id: None,
            })
            .await?;
        Ok(written.outcome)
    }

    /// Move `node_id` between sibling anchors
    ///
    /// The node lands under the anchors' parent, which need not be its
    /// current one. With only `after_id` and no sibling following it, the
    /// node is appended to `after_id`'s parent.
    ///
    /// # Errors
    ///
    /// - `Operation(MissingAnchor)` with neither anchor
    /// - `Operation(NotSiblings)` / `Operation(InvalidAnchor)` for unusable anchors
    /// - `Operation(NoGapAvailable)` when the neighbours' labels are adjacent;
    ///   [`TreeService::renumber_children`] restores the spacing
    pub async fn relocate(
        &self,
        node_id: &str,
        after_id: Option<&str>,
        before_id: Option<&str>,
    ) -> Result<RewriteOutcome, TreeServiceError> {
        let written = self
            .write_with_retry(WriteRequest::Relocate {
                node_id,
                after_id,
                before_id,
            })
            .await?;
        Ok(written.outcome)
    }

    /// Respace the children of `parent_id` (roots if `None`) to `GAP`
    /// multiples, keeping their order
    pub async fn renumber_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<RewriteOutcome>, TreeServiceError> {
        let mut tx = self.store.begin().await?;
        let result = Self::renumber_in(tx.as_mut(), parent_id).await;
        let (parent_path, outcomes) = settle(tx, result).await?;

        info!(
            "Renumbered {} children under {:?}",
            outcomes.len(),
            parent_path.as_ref().map(Path::render)
        );
        self.emit_event(TreeEvent::ChildrenRenumbered {
            parent_path,
            children: outcomes.len(),
        });
        Ok(outcomes)
    }

    async fn renumber_in(
        tx: &mut dyn StoreTransaction,
        parent_id: Option<&str>,
    ) -> Result<(Option<Path>, Vec<RewriteOutcome>), TreeServiceError> {
        let parent_path = match parent_id {
            Some(id) => Some(Self::require_in(tx, id).await?.path),
            None => None,
        };
        let outcomes = SubtreeRewriter::renumber_children(tx, parent_path.as_ref()).await?;
        Ok((parent_path, outcomes))
    }

    /// Exponential backoff before retry `attempt + 1`: 10ms, 20ms, 40ms, ...
    ///
    /// Saturates instead of overflowing for large attempts.
    fn backoff(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(factor))
    }

    async fn write_with_retry(
        &self,
        request: WriteRequest<'_>,
    ) -> Result<Written, TreeServiceError> {
        let max_retries = self.config.max_allocation_retries;
        let mut attempt = 0;

        loop {
            let mut tx = self.store.begin().await?;
            let result = Self::write_in(tx.as_mut(), request).await;

            match settle(tx, result).await {
                Ok(written) => {
                    if attempt > 0 {
                        debug!(
                            "Write at {} succeeded after {} retry(ies)",
                            request.target(),
                            attempt
                        );
                    }
                    self.publish(&written);
                    return Ok(written);
                }

                Err(e) if e.is_duplicate_path() && attempt < max_retries => {
                    warn!(
                        "Path taken on attempt {}/{} at {}: {}. Retrying...",
                        attempt + 1,
                        max_retries + 1,
                        request.target(),
                        e
                    );

                    tokio::time::sleep(self.backoff(attempt)).await;

                    attempt += 1;
                }

                Err(e) if e.is_duplicate_path() => {
                    warn!(
                        "Max retries ({}) exceeded for write at {}",
                        max_retries,
                        request.target()
                    );
                    return Err(TreeServiceError::allocation_retries_exhausted(
                        request.target(),
                        attempt + 1,
                    ));
                }

                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt of `request` inside `tx`, without committing
    async fn write_in(
        tx: &mut dyn StoreTransaction,
        request: WriteRequest<'_>,
    ) -> Result<Written, TreeServiceError> {
        match request {
            WriteRequest::Create { parent_id, name } => {
                let parent = match parent_id {
                    Some(id) => Some(PathState::assigned(Self::require_in(tx, id).await?.path)),
                    None => None,
                };
                let id = Uuid::new_v4().to_string();
                let plan = MovePlanner::plan_create(tx, &id, parent.as_ref()).await?;
                let node = TreeNode::new_with_id(id, name, plan.new_path);
                let outcome = SubtreeRewriter::insert_new(tx, &node).await?;
                Ok(Written { node, outcome })
            }

            WriteRequest::Reparent { node_id, parent_id } => {
                let mut node = Self::require_in(tx, node_id).await?;
                let mut state = PathState::assigned(node.path.clone());
                match parent_id {
                    Some(id) => {
                        let parent = Self::require_in(tx, id).await?;
                        state.request_reparent(&PathState::assigned(parent.path))?;
                    }
                    None => state.request_move_to_root()?,
                }
                let outcome = Self::apply(tx, node_id, &state).await?;
                node.path = outcome.new_path.clone();
                Ok(Written { node, outcome })
            }

            WriteRequest::Relocate {
                node_id,
                after_id,
                before_id,
            } => {
                let mut node = Self::require_in(tx, node_id).await?;
                let after = match after_id {
                    Some(id) => Some(Self::require_in(tx, id).await?),
                    None => None,
                };
                let before = match before_id {
                    Some(id) => Some(Self::require_in(tx, id).await?),
                    None => None,
                };
                let pending = MovePlanner::resolve_relocation(
                    tx,
                    node_id,
                    &node.path,
                    after.as_ref(),
                    before.as_ref(),
                )
                .await?;
                let mut state = PathState::assigned(node.path.clone());
                state.set_pending(pending)?;
                let outcome = Self::apply(tx, node_id, &state).await?;
                node.path = outcome.new_path.clone();
                Ok(Written { node, outcome })
            }
        }
    }

    /// Plan and rewrite; rewrite-phase failures become `MoveFailed`
    async fn apply(
        tx: &mut dyn StoreTransaction,
        node_id: &str,
        state: &PathState,
    ) -> Result<RewriteOutcome, TreeServiceError> {
        let plan = MovePlanner::plan(tx, node_id, state).await?;
        SubtreeRewriter::rewrite(tx, &plan)
            .await
            .map_err(|e| TreeServiceError::move_failed(node_id, e))
    }

    fn publish(&self, written: &Written) {
        let outcome = &written.outcome;
        match &outcome.old_path {
            None => {
                info!("Created node '{}' at {}", written.node.id, written.node.path);
                self.emit_event(TreeEvent::NodeCreated {
                    node: written.node.clone(),
                });
            }
            Some(old_path) if outcome.changed() => {
                info!(
                    "Moved '{}' {} -> {} with {} descendants",
                    outcome.node_id, old_path, outcome.new_path, outcome.descendants_moved
                );
                self.emit_event(TreeEvent::SubtreeMoved {
                    node_id: outcome.node_id.clone(),
                    old_path: old_path.clone(),
                    new_path: outcome.new_path.clone(),
                    descendants: outcome.descendants_moved,
                });
            }
            Some(_) => debug!("Node '{}' did not move", outcome.node_id),
        }
    }

    async fn require_in(
        tx: &mut dyn StoreTransaction,
        id: &str,
    ) -> Result<TreeNode, TreeServiceError> {
        tx.get_node(id)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(id))
    }

    // ------------------------------------------------------------------
    // Reads (committed state)
    // ------------------------------------------------------------------

    pub async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, TreeServiceError> {
        Ok(self.store.get_node(id).await?)
    }

    async fn require(&self, id: &str) -> Result<TreeNode, TreeServiceError> {
        self.get_node(id)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(id))
    }

    /// Direct parent, or `None` for a root
    pub async fn parent(&self, id: &str) -> Result<Option<TreeNode>, TreeServiceError> {
        let node = self.require(id).await?;
        let Some(parent_path) = node.path.parent_prefix() else {
            return Ok(None);
        };
        let query = PathQuery::new(PathPredicate::Equals(parent_path)).limit(1);
        Ok(self.store.query(&query).await?.into_iter().next())
    }

    /// Nodes related to `id` by `relation`, in tree order
    pub async fn related(
        &self,
        id: &str,
        relation: Relation,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        let node = self.require(id).await?;
        Ok(self
            .store
            .query(&RelationQuery::build(relation, &node))
            .await?)
    }

    /// Root first
    pub async fn ancestors(&self, id: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.related(id, Relation::Ancestors).await
    }

    /// Whole subtree below `id` in pre-order
    pub async fn descendants(&self, id: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.related(id, Relation::Descendants).await
    }

    pub async fn children(&self, id: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.related(id, Relation::Children).await
    }

    pub async fn siblings(&self, id: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.related(id, Relation::Siblings).await
    }

    /// Ancestors and descendants of `id`, without `id` itself
    pub async fn family(&self, id: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.related(id, Relation::Family).await
    }

    pub async fn roots(&self) -> Result<Vec<TreeNode>, TreeServiceError> {
        Ok(self.store.query(&RelationQuery::roots()).await?)
    }

    /// The whole forest in tree order
    pub async fn all(&self) -> Result<Vec<TreeNode>, TreeServiceError> {
        Ok(self.store.query(&RelationQuery::forest()).await?)
    }

    pub async fn count(&self) -> Result<u64, TreeServiceError> {
        Ok(self.store.count().await?)
    }
}
