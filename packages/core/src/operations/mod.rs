//! Tree Operations
//!
//! The engine that keeps materialized paths consistent:
//!
//! - [`LabelAllocator`] - gap allocation and midpoint bisection of sibling labels
//! - [`MovePlanner`] - turns reparent / relocate requests into concrete paths
//! - [`SubtreeRewriter`] - applies a plan to a node and all of its descendants
//! - [`RelationQuery`] - maps tree relations onto store prefix queries
//!
//! Every function that writes takes a `&mut dyn StoreTransaction`; callers own
//! the transaction and decide when to commit (see [`settle`]).

pub mod error;
pub mod label_allocator;
pub mod move_planner;
pub mod relation_query;
pub mod subtree_rewriter;

pub use error::TreeOperationError;
pub use label_allocator::{LabelAllocator, GAP};
pub use move_planner::{MovePlan, MovePlanner, PathState, PendingMove};
pub use relation_query::{Relation, RelationQuery};
pub use subtree_rewriter::{settle, RewriteOutcome, SubtreeRewriter};
