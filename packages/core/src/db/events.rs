//! Domain Events for the Tree Engine
//!
//! `TreeService` emits a [`TreeEvent`] after every committed write. Events
//! follow the observer pattern: subscribers receive them through a tokio
//! broadcast channel and never couple to the store implementation.
//!
//! # Event Flow
//!
//! 1. The service commits a transaction (create, move, renumber)
//! 2. The matching event is sent on the broadcast channel
//! 3. Every live subscriber receives it asynchronously
//!
//! Events are only emitted after commit, so a subscriber never hears about
//! a move that was rolled back.

use crate::models::{Path, TreeNode};
use serde::{Deserialize, Serialize};

/// Domain events emitted by `TreeService`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeEvent {
    /// A new node was inserted
    #[serde(rename = "node:created")]
    NodeCreated { node: TreeNode },

    /// A node and its whole subtree moved from `old_path` to `new_path`
    #[serde(rename = "subtree:moved", rename_all = "camelCase")]
    SubtreeMoved {
        node_id: String,
        old_path: Path,
        new_path: Path,
        descendants: u64,
    },

    /// Every child of `parent_path` (roots if `None`) received fresh labels
    #[serde(rename = "children:renumbered", rename_all = "camelCase")]
    ChildrenRenumbered {
        parent_path: Option<Path>,
        children: usize,
    },
}

impl TreeEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeCreated { .. } => "node:created",
            TreeEvent::SubtreeMoved { .. } => "subtree:moved",
            TreeEvent::ChildrenRenumbered { .. } => "children:renumbered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;

    /// Contract test: internally-tagged, camelCase, paths as dotted strings
    #[test]
    fn test_subtree_moved_serialization_contract() {
        let old_path = Path::root(Label::new(1_000_000_000).unwrap());
        let new_path = Path::root(Label::new(2_000_000_000).unwrap());
        let event = TreeEvent::SubtreeMoved {
            node_id: "node-1".to_string(),
            old_path,
            new_path,
            descendants: 3,
        };

        let parsed: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(parsed.get("type").unwrap(), "subtree:moved");
        assert_eq!(parsed.get("nodeId").unwrap(), "node-1");
        assert_eq!(parsed.get("oldPath").unwrap(), "000000001000000000");
        assert_eq!(parsed.get("newPath").unwrap(), "000000002000000000");
        assert_eq!(parsed.get("descendants").unwrap(), 3);
        assert_eq!(event.event_type(), "subtree:moved");
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = TreeEvent::ChildrenRenumbered {
            parent_path: None,
            children: 2,
        };
        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed.get("type").unwrap(), event.event_type());
        assert!(parsed.get("parentPath").unwrap().is_null());
    }
}
