//! LibsqlStore Integration Tests
//!
//! Exercises the SQL translation of every path predicate, uniqueness
//! enforcement, transaction rollback and handling of corrupt rows.

#[cfg(test)]
mod libsql_store_tests {
    use anyhow::Result;
    use pathtree_core::db::{
        DatabaseError, LibsqlStore, PathPredicate, PathQuery, TreeStore,
    };
    use pathtree_core::models::{Label, Path, TreeNode};
    use tempfile::TempDir;

    fn path(values: &[u64]) -> Path {
        Path::from_labels(values.iter().map(|v| Label::new(*v).unwrap()).collect()).unwrap()
    }

    /// Helper to create test database
    async fn create_test_store() -> Result<(LibsqlStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_file = temp_dir.path().join("test.db");
        let store = LibsqlStore::new(db_file.clone()).await?;
        assert_eq!(store.db_path(), db_file.as_path());
        Ok((store, temp_dir))
    }

    /// a(1) > b(1.1) > c(1.1.1); a > d(1.2); e(2); f(10)
    async fn seed(store: &LibsqlStore) -> Result<()> {
        let mut tx = store.begin().await?;
        for (id, labels) in [
            ("a", vec![1]),
            ("b", vec![1, 1]),
            ("c", vec![1, 1, 1]),
            ("d", vec![1, 2]),
            ("e", vec![2]),
            ("f", vec![10]),
        ] {
            tx.insert(&TreeNode::new_with_id(id, id, path(&labels))).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ids(store: &LibsqlStore, query: PathQuery) -> Result<Vec<String>> {
        Ok(store.query(&query).await?.into_iter().map(|n| n.id).collect())
    }

    #[tokio::test]
    async fn test_predicates_match_reference_semantics() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;
        let all = store.query(&PathQuery::new(PathPredicate::All)).await?;
        assert_eq!(all.len(), 6);

        let predicates = vec![
            PathPredicate::Equals(path(&[1, 1])),
            PathPredicate::AncestorOf(path(&[1, 1, 1])),
            PathPredicate::AncestorOf(path(&[1])),
            PathPredicate::DescendantOf(path(&[1])),
            PathPredicate::DescendantOf(path(&[2])),
            PathPredicate::ChildOf(Some(path(&[1]))),
            PathPredicate::ChildOf(None),
            PathPredicate::AnyOf(vec![
                PathPredicate::AncestorOf(path(&[1, 1])),
                PathPredicate::DescendantOf(path(&[1, 1])),
            ]),
            PathPredicate::AnyOf(vec![]),
        ];

        for predicate in predicates {
            let expected: Vec<String> = all
                .iter()
                .filter(|n| predicate.matches(&n.path))
                .map(|n| n.id.clone())
                .collect();
            let actual = ids(&store, PathQuery::new(predicate.clone())).await?;
            assert_eq!(actual, expected, "predicate {:?}", predicate);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_descendant_range_excludes_numeric_neighbours() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;
        // "f" (label 10) renders with the same leading digits as "a" (label 1)
        assert_eq!(
            ids(&store, PathQuery::new(PathPredicate::DescendantOf(path(&[1])))).await?,
            vec!["b", "c", "d"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_bounds_order_and_limit() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        let roots = PathQuery::new(PathPredicate::ChildOf(None));
        assert_eq!(
            ids(&store, roots.clone().after(path(&[1])).limit(1)).await?,
            vec!["e"]
        );
        assert_eq!(
            ids(&store, roots.clone().before(path(&[10])).descending().limit(1)).await?,
            vec!["e"]
        );
        assert_eq!(
            ids(&store, roots.clone().excluding("e")).await?,
            vec!["a", "f"]
        );
        assert_eq!(store.max_label_under(None).await?, Some(Label::new(10)?));
        assert_eq!(
            store.max_label_under(Some(&path(&[1]))).await?,
            Some(Label::new(2)?)
        );
        assert_eq!(store.max_label_under(Some(&path(&[2]))).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_constraints() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        let mut tx = store.begin().await?;
        let err = tx
            .insert(&TreeNode::new_with_id("z", "z", path(&[1, 1])))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_path(), "got {}", err);

        let err = tx
            .insert(&TreeNode::new_with_id("a", "a", path(&[7])))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateId { .. }), "got {}", err);

        let err = tx.update_path("b", &path(&[2])).await.unwrap_err();
        assert!(err.is_duplicate_path());

        let err = tx.update_path("missing", &path(&[3])).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NodeNotFound { .. }));
        tx.rollback().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_replace_prefix_moves_subtree() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        let mut tx = store.begin().await?;
        tx.update_path("b", &path(&[2, 5])).await?;
        let moved = tx.bulk_replace_prefix(&path(&[1, 1]), &path(&[2, 5])).await?;
        assert_eq!(moved, 1);

        // Own writes are visible inside the transaction only
        assert_eq!(tx.get_node("c").await?.unwrap().path, path(&[2, 5, 1]));
        assert_eq!(store.get_node("c").await?.unwrap().path, path(&[1, 1, 1]));
        tx.commit().await?;

        let c = store.get_node("c").await?.unwrap();
        assert_eq!(c.path, path(&[2, 5, 1]));
        assert_eq!(
            ids(&store, PathQuery::new(PathPredicate::ChildOf(Some(path(&[2]))))).await?,
            vec!["b"]
        );
        // depth column follows the move
        assert_eq!(
            ids(&store, PathQuery::new(PathPredicate::ChildOf(Some(path(&[2, 5]))))).await?,
            vec!["c"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_replace_collision_reports_duplicate_path() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        let mut tx = store.begin().await?;
        tx.insert(&TreeNode::new_with_id("squatter", "squatter", path(&[2, 5, 1])))
            .await?;
        tx.update_path("b", &path(&[2, 5])).await?;
        let err = tx
            .bulk_replace_prefix(&path(&[1, 1]), &path(&[2, 5]))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_path(), "got {}", err);
        assert!(!matches!(err, DatabaseError::DuplicateId { .. }));
        tx.rollback().await?;

        assert_eq!(store.get_node("c").await?.unwrap().path, path(&[1, 1, 1]));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        {
            let mut tx = store.begin().await?;
            tx.update_path("a", &path(&[3])).await?;
            tx.bulk_replace_prefix(&path(&[1]), &path(&[3])).await?;
        }

        assert_eq!(store.get_node("a").await?.unwrap().path, path(&[1]));
        assert_eq!(store.get_node("c").await?.unwrap().path, path(&[1, 1, 1]));
        assert_eq!(store.count().await?, 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped_in_lists() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        seed(&store).await?;

        let conn = store.connect().await?;
        conn.execute(
            "INSERT INTO tree_nodes (id, name, path, depth) VALUES (?, ?, ?, ?)",
            ("bad", "bad", "not-a-path", 1i64),
        )
        .await?;

        let all = store.query(&PathQuery::new(PathPredicate::All)).await?;
        assert_eq!(all.len(), 6);
        assert!(all.iter().all(|n| n.id != "bad"));

        let err = store.get_node("bad").await.unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptPath { .. }));
        Ok(())
    }
}
