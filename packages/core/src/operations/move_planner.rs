//! Move planning
//!
//! A node's position lives in a [`PathState`]. Requests to move it are first
//! recorded as a [`PendingMove`] and only turned into a concrete
//! [`MovePlan`] when the write is about to happen, inside the transaction
//! that will apply it. Computing the target path late means the "last
//! sibling" read and the write see the same store state.

use crate::db::StoreTransaction;
use crate::models::{Path, TreeNode};
use crate::operations::{LabelAllocator, RelationQuery, TreeOperationError};
use tracing::debug;

/// A requested but not yet applied move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMove {
    /// Append under `new_parent` (root level when `None`) using the next free label
    Reparent { new_parent: Option<Path> },

    /// Take this exact path (computed by midpoint relocation)
    Relocate { new_path: Path },
}

/// Path lifecycle of a single node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PathState {
    /// Never saved; has no path yet
    #[default]
    Unassigned,

    /// Saved at `current`, optionally with a move waiting to be applied
    Assigned {
        current: Path,
        pending: Option<PendingMove>,
    },
}

impl PathState {
    /// State of a node already persisted at `path`
    pub fn assigned(path: Path) -> Self {
        Self::Assigned {
            current: path,
            pending: None,
        }
    }

    pub fn current(&self) -> Option<&Path> {
        match self {
            Self::Unassigned => None,
            Self::Assigned { current, .. } => Some(current),
        }
    }

    pub fn pending(&self) -> Option<&PendingMove> {
        match self {
            Self::Unassigned => None,
            Self::Assigned { pending, .. } => pending.as_ref(),
        }
    }

    /// Record a request to move this node under `new_parent`
    ///
    /// Nothing is allocated yet; the target label is computed when the move
    /// is planned. Rejects moves under the node itself or its descendants.
    pub fn request_reparent(&mut self, new_parent: &PathState) -> Result<(), TreeOperationError> {
        let parent_path = new_parent
            .current()
            .ok_or(TreeOperationError::ParentNotPersisted)?
            .clone();
        let current = self.current().ok_or(TreeOperationError::NodeNotPersisted)?;
        if parent_path == *current || parent_path.is_descendant_of(current) {
            return Err(TreeOperationError::cycle_detected(
                current.to_string(),
                parent_path.to_string(),
            ));
        }
        self.set_pending(PendingMove::Reparent {
            new_parent: Some(parent_path),
        })
    }

    /// Record a request to make this node a root
    pub fn request_move_to_root(&mut self) -> Result<(), TreeOperationError> {
        self.set_pending(PendingMove::Reparent { new_parent: None })
    }

    /// Record an already resolved move
    pub fn set_pending(&mut self, next: PendingMove) -> Result<(), TreeOperationError> {
        match self {
            Self::Unassigned => Err(TreeOperationError::NodeNotPersisted),
            Self::Assigned { pending, .. } => {
                *pending = Some(next);
                Ok(())
            }
        }
    }
}

/// Concrete old and new path for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub node_id: String,

    /// `None` for a node being created
    pub old_path: Option<Path>,

    pub new_path: Path,
}

impl MovePlan {
    pub fn is_creation(&self) -> bool {
        self.old_path.is_none()
    }

    /// Whether applying the plan would change nothing
    pub fn is_noop(&self) -> bool {
        self.old_path.as_ref() == Some(&self.new_path)
    }
}

/// Turns path states and relocation anchors into move plans
pub struct MovePlanner;

impl MovePlanner {
    /// Plan the first path of a new node under `parent` (root level if `None`)
    ///
    /// The parent's path is taken from its persisted state; an unsaved
    /// parent cannot receive children.
    pub async fn plan_create(
        tx: &mut dyn StoreTransaction,
        node_id: &str,
        parent: Option<&PathState>,
    ) -> Result<MovePlan, TreeOperationError> {
        let parent_path = match parent {
            Some(state) => Some(
                state
                    .current()
                    .ok_or(TreeOperationError::ParentNotPersisted)?
                    .clone(),
            ),
            None => None,
        };
        let new_path = LabelAllocator::allocate_under(tx, parent_path.as_ref()).await?;
        Ok(MovePlan {
            node_id: node_id.to_string(),
            old_path: None,
            new_path,
        })
    }

    /// Resolve a relocation relative to sibling anchors into a pending move
    ///
    /// - `after` only: between `after` and its next sibling, or appended to
    ///   `after`'s parent when `after` is the last sibling
    /// - `before` only: between `before` and its previous sibling, or at the
    ///   front of the list
    /// - both: between the two, which must be adjacent siblings in that order
    ///
    /// The node being moved is ignored when looking for neighbours.
    pub async fn resolve_relocation(
        tx: &mut dyn StoreTransaction,
        node_id: &str,
        current: &Path,
        after: Option<&TreeNode>,
        before: Option<&TreeNode>,
    ) -> Result<PendingMove, TreeOperationError> {
        for anchor in after.iter().chain(before.iter()) {
            Self::check_anchor(node_id, current, anchor)?;
        }

        let (prev, next) = match (after, before) {
            (None, None) => return Err(TreeOperationError::MissingAnchor),
            (Some(after), None) => {
                let query = RelationQuery::next_sibling(&after.path, node_id);
                match tx.query(&query).await?.into_iter().next() {
                    Some(next) => (Some(after.path.clone()), next.path),
                    None => {
                        debug!("'{}' is the last sibling, appending after it", after.id);
                        return Ok(PendingMove::Reparent {
                            new_parent: after.path.parent_prefix(),
                        });
                    }
                }
            }
            (None, Some(before)) => {
                let query = RelationQuery::previous_sibling(&before.path, node_id);
                let prev = tx.query(&query).await?.into_iter().next();
                (prev.map(|n| n.path), before.path.clone())
            }
            (Some(after), Some(before)) => {
                if !after.path.is_sibling_of(&before.path) {
                    return Err(TreeOperationError::not_siblings(
                        after.path.to_string(),
                        before.path.to_string(),
                    ));
                }
                if after.path >= before.path {
                    return Err(TreeOperationError::invalid_anchor(format!(
                        "'{}' does not come before '{}'",
                        after.id, before.id
                    )));
                }
                let query = RelationQuery::between(&after.path, &before.path, node_id);
                if let Some(between) = tx.query(&query).await?.into_iter().next() {
                    return Err(TreeOperationError::invalid_anchor(format!(
                        "'{}' and '{}' are not adjacent ('{}' lies between them)",
                        after.id, before.id, between.id
                    )));
                }
                (Some(after.path.clone()), before.path.clone())
            }
        };

        if let Some(prev) = &prev {
            if !prev.is_sibling_of(&next) {
                return Err(TreeOperationError::not_siblings(
                    prev.to_string(),
                    next.to_string(),
                ));
            }
        }
        let label =
            LabelAllocator::midpoint_label(prev.as_ref().map(Path::last_label), next.last_label())?;
        Ok(PendingMove::Relocate {
            new_path: next.with_last_label(label),
        })
    }

    /// Concrete plan for a persisted node, allocating any label it needs
    pub async fn plan(
        tx: &mut dyn StoreTransaction,
        node_id: &str,
        state: &PathState,
    ) -> Result<MovePlan, TreeOperationError> {
        let (current, pending) = match state {
            PathState::Unassigned => return Err(TreeOperationError::NodeNotPersisted),
            PathState::Assigned { current, pending } => (current, pending),
        };

        let new_path = match pending {
            None => current.clone(),
            Some(PendingMove::Reparent { new_parent }) => {
                if let Some(parent) = new_parent {
                    if parent == current || parent.is_descendant_of(current) {
                        return Err(TreeOperationError::cycle_detected(
                            current.to_string(),
                            parent.to_string(),
                        ));
                    }
                }
                LabelAllocator::allocate_under(tx, new_parent.as_ref()).await?
            }
            Some(PendingMove::Relocate { new_path }) => {
                if new_path.is_descendant_of(current) {
                    return Err(TreeOperationError::cycle_detected(
                        current.to_string(),
                        new_path.to_string(),
                    ));
                }
                new_path.clone()
            }
        };

        debug!("Planned move of '{}': {} -> {}", node_id, current, new_path);
        Ok(MovePlan {
            node_id: node_id.to_string(),
            old_path: Some(current.clone()),
            new_path,
        })
    }

    fn check_anchor(node_id: &str, current: &Path, anchor: &TreeNode) -> Result<(), TreeOperationError> {
        if anchor.id == node_id {
            return Err(TreeOperationError::invalid_anchor(format!(
                "'{}' cannot be positioned relative to itself",
                node_id
            )));
        }
        if anchor.path.is_descendant_of(current) {
            return Err(TreeOperationError::cycle_detected(
                current.to_string(),
                anchor.path.to_string(),
            ));
        }
        Ok(())
    }
}
