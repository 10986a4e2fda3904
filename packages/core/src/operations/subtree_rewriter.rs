//! Subtree rewriting
//!
//! Applies a [`MovePlan`] to the store: the moved node's own path is
//! overwritten, then every descendant has the old prefix swapped for the new
//! one in a single bulk statement. Both writes share the caller's
//! transaction, so readers see either the whole subtree at its old location
//! or the whole subtree at its new one.

use crate::db::{DatabaseError, StoreTransaction};
use crate::models::{Path, TreeNode};
use crate::operations::{LabelAllocator, MovePlan, RelationQuery, TreeOperationError};
use tracing::{debug, warn};

/// Result of applying one move plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub node_id: String,
    pub old_path: Option<Path>,
    pub new_path: Path,

    /// Number of descendant rows whose prefix was rewritten
    pub descendants_moved: u64,
}

impl RewriteOutcome {
    /// Whether any row changed
    pub fn changed(&self) -> bool {
        self.old_path.as_ref() != Some(&self.new_path)
    }
}

/// Writes planned paths into the store
pub struct SubtreeRewriter;

impl SubtreeRewriter {
    /// Write a brand-new node; there are no descendants to migrate
    pub async fn insert_new(
        tx: &mut dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<RewriteOutcome, TreeOperationError> {
        tx.insert(node).await?;
        Ok(RewriteOutcome {
            node_id: node.id.clone(),
            old_path: None,
            new_path: node.path.clone(),
            descendants_moved: 0,
        })
    }

    /// Apply a move plan for a persisted node inside `tx`
    ///
    /// Depth offsets inside the subtree are preserved: a descendant `k`
    /// levels below the moved node stays `k` levels below it.
    pub async fn rewrite(
        tx: &mut dyn StoreTransaction,
        plan: &MovePlan,
    ) -> Result<RewriteOutcome, TreeOperationError> {
        let old_path = plan
            .old_path
            .as_ref()
            .ok_or(TreeOperationError::NodeNotPersisted)?;

        if plan.is_noop() {
            debug!("Node '{}' already at {}, nothing to rewrite", plan.node_id, old_path);
            return Ok(RewriteOutcome {
                node_id: plan.node_id.clone(),
                old_path: Some(old_path.clone()),
                new_path: plan.new_path.clone(),
                descendants_moved: 0,
            });
        }

        if plan.new_path.is_descendant_of(old_path) {
            return Err(TreeOperationError::cycle_detected(
                old_path.to_string(),
                plan.new_path.to_string(),
            ));
        }

        tx.update_path(&plan.node_id, &plan.new_path).await?;
        let descendants_moved = tx.bulk_replace_prefix(old_path, &plan.new_path).await?;

        debug!(
            "Rewrote '{}' {} -> {} ({} descendants)",
            plan.node_id, old_path, plan.new_path, descendants_moved
        );
        Ok(RewriteOutcome {
            node_id: plan.node_id.clone(),
            old_path: Some(old_path.clone()),
            new_path: plan.new_path.clone(),
            descendants_moved,
        })
    }

    /// Give every child of `parent` (roots if `None`) a fresh `GAP`-spaced
    /// label, keeping their order and moving their subtrees with them
    ///
    /// Runs in two phases inside `tx`: first every child is shifted above
    /// the current maximum label, then onto its final label. No intermediate
    /// state ever needs two children on the same path.
    pub async fn renumber_children(
        tx: &mut dyn StoreTransaction,
        parent: Option<&Path>,
    ) -> Result<Vec<RewriteOutcome>, TreeOperationError> {
        let query = match parent {
            Some(parent) => RelationQuery::children(parent),
            None => RelationQuery::roots(),
        };
        let children = tx.query(&query).await?;
        if children.is_empty() {
            return Ok(Vec::new());
        }

        let max = children
            .iter()
            .map(|child| child.path.last_label().value())
            .max()
            .unwrap_or(0);
        let staging = LabelAllocator::spaced_labels_from(max, children.len())?;
        let finals = LabelAllocator::spaced_labels(children.len())?;

        let mut staged = Vec::with_capacity(children.len());
        for (child, label) in children.iter().zip(staging) {
            let plan = MovePlan {
                node_id: child.id.clone(),
                old_path: Some(child.path.clone()),
                new_path: child.path.with_last_label(label),
            };
            Self::rewrite(tx, &plan).await?;
            staged.push(plan.new_path);
        }

        let mut outcomes = Vec::with_capacity(children.len());
        for ((child, staged_path), label) in children.iter().zip(staged).zip(finals) {
            let plan = MovePlan {
                node_id: child.id.clone(),
                old_path: Some(staged_path),
                new_path: child.path.with_last_label(label),
            };
            let mut outcome = Self::rewrite(tx, &plan).await?;
            outcome.old_path = Some(child.path.clone());
            outcomes.push(outcome);
        }

        debug!(
            "Renumbered {} children under {:?}",
            outcomes.len(),
            parent.map(Path::render)
        );
        Ok(outcomes)
    }
}

/// Commit `tx` if `result` is `Ok`, roll it back otherwise
///
/// A failed rollback is logged and the original error is returned.
pub async fn settle<T, E>(tx: Box<dyn StoreTransaction>, result: Result<T, E>) -> Result<T, E>
where
    E: From<DatabaseError> + std::fmt::Display,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after '{}': {}", e, rollback_err);
            }
            Err(e)
        }
    }
}
