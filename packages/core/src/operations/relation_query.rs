//! Relation queries
//!
//! Translates semantic tree relations into [`PathQuery`] values the store
//! can answer with prefix predicates. Every query defaults to ascending path
//! order, which is pre-order traversal with siblings ordered by label.
//!
//! | Relation      | Predicate                                   |
//! |---------------|---------------------------------------------|
//! | ancestors     | `AncestorOf(P)`                             |
//! | descendants   | `DescendantOf(P)`                           |
//! | children      | `ChildOf(P)`                                |
//! | siblings      | `ChildOf(parent(P))` excluding self         |
//! | family        | `AncestorOf(P) ∪ DescendantOf(P)`           |
//! | roots         | `ChildOf(None)`                             |

use crate::db::{PathPredicate, PathQuery};
use crate::models::{Path, TreeNode};

/// Semantic relation to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Ancestors,
    Descendants,
    Children,
    Siblings,
    Family,
}

/// Builds store queries for tree relations
pub struct RelationQuery;

impl RelationQuery {
    /// Query for `relation` relative to `node`
    pub fn build(relation: Relation, node: &TreeNode) -> PathQuery {
        match relation {
            Relation::Ancestors => Self::ancestors(&node.path),
            Relation::Descendants => Self::descendants(&node.path),
            Relation::Children => Self::children(&node.path),
            Relation::Siblings => Self::siblings(node),
            Relation::Family => Self::family(&node.path),
        }
    }

    /// Strict prefixes of `path`, root first
    pub fn ancestors(path: &Path) -> PathQuery {
        PathQuery::new(PathPredicate::AncestorOf(path.clone()))
    }

    /// Everything strictly below `path`, in pre-order
    pub fn descendants(path: &Path) -> PathQuery {
        PathQuery::new(PathPredicate::DescendantOf(path.clone()))
    }

    /// Direct children of `path`, by label
    pub fn children(path: &Path) -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(Some(path.clone())))
    }

    /// Other nodes with the same parent prefix and depth
    pub fn siblings(node: &TreeNode) -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(node.path.parent_prefix())).excluding(&node.id)
    }

    /// Ancestors and descendants together (self excluded)
    pub fn family(path: &Path) -> PathQuery {
        PathQuery::new(PathPredicate::AnyOf(vec![
            PathPredicate::AncestorOf(path.clone()),
            PathPredicate::DescendantOf(path.clone()),
        ]))
    }

    /// Single-label paths
    pub fn roots() -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(None))
    }

    /// The whole forest in tree order
    pub fn forest() -> PathQuery {
        PathQuery::new(PathPredicate::All)
    }

    /// Nearest sibling of `anchor` strictly after it, skipping `moving_id`
    pub fn next_sibling(anchor: &Path, moving_id: &str) -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(anchor.parent_prefix()))
            .excluding(moving_id)
            .after(anchor.clone())
            .limit(1)
    }

    /// Nearest sibling of `anchor` strictly before it, skipping `moving_id`
    pub fn previous_sibling(anchor: &Path, moving_id: &str) -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(anchor.parent_prefix()))
            .excluding(moving_id)
            .before(anchor.clone())
            .descending()
            .limit(1)
    }

    /// Siblings strictly between `after` and `before`, skipping `moving_id`
    pub fn between(after: &Path, before: &Path, moving_id: &str) -> PathQuery {
        PathQuery::new(PathPredicate::ChildOf(after.parent_prefix()))
            .excluding(moving_id)
            .after(after.clone())
            .before(before.clone())
            .limit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;

    fn path(values: &[u64]) -> Path {
        Path::from_labels(values.iter().map(|v| Label::new(*v).unwrap()).collect()).unwrap()
    }

    fn node(id: &str, values: &[u64]) -> TreeNode {
        TreeNode::new_with_id(id, id, path(values))
    }

    /// Animal(1) > Mammal(1.1) > Cat(1.1.1), Dog(1.1.2); Marsupial(1.2) > Koala(1.2.1); Plant(2)
    fn forest() -> Vec<TreeNode> {
        vec![
            node("animal", &[1]),
            node("mammal", &[1, 1]),
            node("cat", &[1, 1, 1]),
            node("dog", &[1, 1, 2]),
            node("marsupial", &[1, 2]),
            node("koala", &[1, 2, 1]),
            node("plant", &[2]),
        ]
    }

    fn run(query: &PathQuery) -> Vec<String> {
        let mut all = forest();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        all.into_iter()
            .filter(|n| query.matches(n))
            .map(|n| n.id)
            .collect()
    }

    #[test]
    fn test_relations_on_fixture() {
        let mammal = node("mammal", &[1, 1]);
        assert_eq!(run(&RelationQuery::build(Relation::Ancestors, &mammal)), vec!["animal"]);
        assert_eq!(
            run(&RelationQuery::build(Relation::Descendants, &mammal)),
            vec!["cat", "dog"]
        );
        assert_eq!(
            run(&RelationQuery::build(Relation::Children, &node("animal", &[1]))),
            vec!["mammal", "marsupial"]
        );
        assert_eq!(
            run(&RelationQuery::build(Relation::Siblings, &mammal)),
            vec!["marsupial"]
        );
        assert_eq!(
            run(&RelationQuery::build(Relation::Family, &mammal)),
            vec!["animal", "cat", "dog"]
        );
        assert_eq!(run(&RelationQuery::roots()), vec!["animal", "plant"]);
        assert_eq!(run(&RelationQuery::forest()).len(), 7);
    }

    #[test]
    fn test_root_siblings_are_other_roots() {
        assert_eq!(
            run(&RelationQuery::siblings(&node("plant", &[2]))),
            vec!["animal"]
        );
    }

    #[test]
    fn test_neighbour_queries_skip_moving_node() {
        let next = RelationQuery::next_sibling(&path(&[1, 1, 1]), "dog");
        assert!(run(&next).is_empty());
        let prev = RelationQuery::previous_sibling(&path(&[1, 1, 2]), "nobody");
        assert_eq!(prev.order, crate::db::SortOrder::Descending);
        assert_eq!(run(&prev), vec!["cat"]);
    }
}
