//! Sparse label allocation
//!
//! New siblings are appended `GAP` past the current last sibling, leaving a
//! wide numeric hole between neighbours. Inserting between two existing
//! siblings bisects that hole, so a node can always gain a sibling without
//! renumbering anything else until two neighbours become numerically
//! adjacent.
//!
//! # Concurrency
//!
//! [`LabelAllocator::allocate_under`] reads "last sibling" and the caller
//! writes a row with the computed label in the same transaction. Two writers
//! racing on the same parent are resolved by the store's unique-path
//! constraint; the loser retries with a fresh read.

use crate::db::StoreTransaction;
use crate::models::{Label, Path, PathError};
use crate::operations::TreeOperationError;

/// Spacing between freshly allocated sibling labels
pub const GAP: u64 = 1_000_000_000;

/// Computes sibling labels by gap arithmetic and bisection
pub struct LabelAllocator;

impl LabelAllocator {
    /// Label for a node appended after `last_sibling`
    ///
    /// Returns `GAP` when there is no sibling yet.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pathtree_core::operations::{LabelAllocator, GAP};
    ///
    /// let first = LabelAllocator::next_label(None).unwrap();
    /// assert_eq!(first.value(), GAP);
    /// let second = LabelAllocator::next_label(Some(first)).unwrap();
    /// assert_eq!(second.value(), 2 * GAP);
    /// ```
    pub fn next_label(last_sibling: Option<Label>) -> Result<Label, TreeOperationError> {
        let base = last_sibling.map(Label::value).unwrap_or(0);
        // Label::MAX + GAP still fits in u64
        Ok(Label::new(base + GAP)?)
    }

    /// Label strictly between `prev` and `next`
    ///
    /// With `prev` absent the node goes to the front of the list and the
    /// label is `next / 2`, which must stay above zero.
    ///
    /// # Errors
    ///
    /// `NoGapAvailable` when no integer lies strictly between the two
    /// neighbours. `InvalidAnchor` when `prev` is not below `next`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pathtree_core::models::Label;
    /// use pathtree_core::operations::LabelAllocator;
    ///
    /// let prev = Label::new(1_000_000_000).unwrap();
    /// let next = Label::new(2_000_000_000).unwrap();
    /// let mid = LabelAllocator::midpoint_label(Some(prev), next).unwrap();
    /// assert_eq!(mid.value(), 1_500_000_000);
    /// assert!(LabelAllocator::midpoint_label(Some(prev), Label::new(1_000_000_001).unwrap()).is_err());
    /// ```
    pub fn midpoint_label(prev: Option<Label>, next: Label) -> Result<Label, TreeOperationError> {
        let next_value = next.value();
        let value = match prev {
            None => next_value / 2,
            Some(prev) => {
                let prev_value = prev.value();
                if prev_value >= next_value {
                    return Err(TreeOperationError::invalid_anchor(format!(
                        "label {} does not precede {}",
                        prev, next
                    )));
                }
                if next_value - prev_value <= 1 {
                    return Err(TreeOperationError::NoGapAvailable {
                        prev: Some(prev),
                        next,
                    });
                }
                prev_value + (next_value - prev_value) / 2
            }
        };
        if value == 0 {
            return Err(TreeOperationError::NoGapAvailable { prev, next });
        }
        Ok(Label::new(value)?)
    }

    /// `GAP`-spaced labels for a sibling list of `count` nodes
    pub fn spaced_labels(count: usize) -> Result<Vec<Label>, PathError> {
        Self::spaced_labels_from(0, count)
    }

    /// `count` labels at `base + GAP`, `base + 2*GAP`, ...
    pub fn spaced_labels_from(base: u64, count: usize) -> Result<Vec<Label>, PathError> {
        (1..=count as u128)
            .map(|i| {
                let value = u128::from(base) + i * u128::from(GAP);
                u64::try_from(value)
                    .map_err(|_| PathError::LabelOverflow { value })
                    .and_then(Label::new)
            })
            .collect()
    }

    /// Next free path under `parent` (at root level if `None`)
    ///
    /// Reads the current last sibling through the transaction so the caller's
    /// insert or move lands in the same unit of work.
    pub async fn allocate_under(
        tx: &mut dyn StoreTransaction,
        parent: Option<&Path>,
    ) -> Result<Path, TreeOperationError> {
        let last = tx.max_label_under(parent).await?;
        let label = Self::next_label(last)?;
        let path = match parent {
            Some(parent) => parent.child(label),
            None => Path::root(label),
        };
        tracing::debug!(
            "Allocated {} after last sibling {:?}",
            path,
            last.map(|l| l.to_string())
        );
        Ok(path)
    }
}
