//! LibsqlStore - TreeStore Implementation for libsql (embedded SQLite)
//!
//! Persists one row per node in `tree_nodes`, with the rendered path in a
//! `UNIQUE` text column. Because every label is fixed-width and the separator
//! sorts below every digit, byte order over the `path` column is tree order,
//! and every prefix predicate becomes an indexable range or `IN` list.
//!
//! # Predicate translation
//!
//! | Predicate           | SQL                                          |
//! |---------------------|----------------------------------------------|
//! | `Equals(P)`         | `path = 'P'`                                 |
//! | `AncestorOf(P)`     | `path IN (<proper prefixes of P>)`           |
//! | `DescendantOf(P)`   | `path > 'P.' AND path < 'P/'`                |
//! | `ChildOf(Some(P))`  | descendant range `AND depth = depth(P) + 1`  |
//! | `ChildOf(None)`     | `depth = 1`                                  |
//!
//! # Transactions
//!
//! Transactions start with `BEGIN IMMEDIATE`, taking the write lock up front
//! so concurrent movers serialize instead of failing at commit. Readers on
//! other connections see the last committed state (WAL mode). A transaction
//! owns its connection; dropping it without commit closes the connection and
//! SQLite rolls the work back.
//!
//! # Connection pattern
//!
//! Always obtain connections through [`LibsqlStore::connect`], which applies
//! the busy timeout so concurrent operations wait instead of failing with
//! `SQLITE_BUSY`.

use crate::db::tree_store::{PathPredicate, PathQuery, SortOrder, StoreTransaction, TreeStore};
use crate::db::DatabaseError;
use crate::models::{Label, Path, TreeNode, SEPARATOR};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Builder, Connection, Database, Row, TransactionBehavior, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Default busy timeout for every connection (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

const SELECT_COLUMNS: &str = "SELECT id, name, path, created_at FROM tree_nodes";

/// libsql-backed hierarchical store
///
/// # Examples
///
/// ```no_run
/// use pathtree_core::db::{LibsqlStore, TreeStore};
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = LibsqlStore::new(PathBuf::from("./data/tree.db")).await?;
///     println!("{} nodes", store.count().await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LibsqlStore {
    db: Arc<Database>,
    db_path: PathBuf,
    busy_timeout_ms: u64,
}

impl LibsqlStore {
    /// Open (or create) the database file and initialize the schema
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Same as [`LibsqlStore::new`] with an explicit busy timeout
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let store = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };
        store.initialize_schema().await?;
        tracing::debug!("Opened tree store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Get a connection with the busy timeout configured
    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect()?;
        execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms)).await?;
        Ok(conn)
    }

    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;

        execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        // UNIQUE(path) doubles as the path index
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_nodes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                depth INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create tree_nodes table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tree_nodes_depth ON tree_nodes(depth)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_tree_nodes_depth': {}",
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl TreeStore for LibsqlStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let conn = self.connect().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::transaction_failed(format!("Failed to begin: {}", e)))?;
        Ok(Box::new(LibsqlTransaction { tx }))
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_node(&conn, id).await
    }

    async fn query(&self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_query(&conn, query).await
    }

    async fn max_label_under(&self, prefix: Option<&Path>) -> Result<Option<Label>, DatabaseError> {
        let conn = self.connect().await?;
        fetch_max_label(&conn, prefix).await
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM tree_nodes", ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count as u64)
    }
}

/// Transaction over a [`LibsqlStore`]
pub struct LibsqlTransaction {
    tx: libsql::Transaction,
}

#[async_trait]
impl StoreTransaction for LibsqlTransaction {
    async fn insert(&mut self, node: &TreeNode) -> Result<(), DatabaseError> {
        self.tx
            .execute(
                "INSERT INTO tree_nodes (id, name, path, depth, created_at) VALUES (?, ?, ?, ?, ?)",
                (
                    node.id.as_str(),
                    node.name.as_str(),
                    node.path.render(),
                    node.depth() as i64,
                    node.created_at.to_rfc3339(),
                ),
            )
            .await
            .map_err(|e| map_write_error(e, &node.path.render(), &node.id))?;
        Ok(())
    }

    async fn update_path(&mut self, id: &str, path: &Path) -> Result<(), DatabaseError> {
        let rendered = path.render();
        let affected = self
            .tx
            .execute(
                "UPDATE tree_nodes SET path = ?, depth = ? WHERE id = ?",
                (rendered.as_str(), path.depth() as i64, id),
            )
            .await
            .map_err(|e| map_write_error(e, &rendered, id))?;
        if affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }
        Ok(())
    }

    async fn bulk_replace_prefix(
        &mut self,
        old_prefix: &Path,
        new_prefix: &Path,
    ) -> Result<u64, DatabaseError> {
        let old_rendered = old_prefix.render();
        let new_rendered = new_prefix.render();
        let (lower, upper) = descendant_bounds(old_prefix);
        let depth_delta = new_prefix.depth() as i64 - old_prefix.depth() as i64;

        // substr() is 1-based; keep everything from the separator after the old prefix
        self.tx
            .execute(
                "UPDATE tree_nodes
                 SET path = ? || substr(path, ?), depth = depth + ?
                 WHERE path > ? AND path < ?",
                (
                    new_rendered.as_str(),
                    old_rendered.len() as i64 + 1,
                    depth_delta,
                    lower,
                    upper,
                ),
            )
            .await
            .map_err(|e| map_path_error(e, &new_rendered))
    }

    async fn get_node(&mut self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        fetch_node(&self.tx, id).await
    }

    async fn query(&mut self, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError> {
        fetch_query(&self.tx, query).await
    }

    async fn max_label_under(
        &mut self,
        prefix: Option<&Path>,
    ) -> Result<Option<Label>, DatabaseError> {
        fetch_max_label(&self.tx, prefix).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::transaction_failed(format!("Failed to commit: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::transaction_failed(format!("Failed to roll back: {}", e)))
    }
}

/// PRAGMA statements return rows, so they go through query() instead of execute()
async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(pragma).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
    })?;
    let _ = stmt.query(()).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
    })?;
    Ok(())
}

/// Half-open string range covering every strict descendant of `prefix`
///
/// The character after the separator bounds every `prefix.` continuation.
fn descendant_bounds(prefix: &Path) -> (String, String) {
    let rendered = prefix.render();
    let range_end = char::from(SEPARATOR as u8 + 1);
    (
        format!("{}{}", rendered, SEPARATOR),
        format!("{}{}", rendered, range_end),
    )
}

/// Append the SQL for `predicate` to `sql`, pushing its positional params
fn push_predicate(predicate: &PathPredicate, sql: &mut String, params: &mut Vec<Value>) {
    match predicate {
        PathPredicate::All => sql.push('1'),
        PathPredicate::Equals(path) => {
            sql.push_str("path = ?");
            params.push(Value::Text(path.render()));
        }
        PathPredicate::AncestorOf(path) => {
            let prefixes: Vec<Path> = path.proper_prefixes().collect();
            if prefixes.is_empty() {
                sql.push('0');
                return;
            }
            let placeholders = vec!["?"; prefixes.len()].join(", ");
            sql.push_str(&format!("path IN ({})", placeholders));
            params.extend(prefixes.iter().map(|p| Value::Text(p.render())));
        }
        PathPredicate::DescendantOf(path) => {
            let (lower, upper) = descendant_bounds(path);
            sql.push_str("(path > ? AND path < ?)");
            params.push(Value::Text(lower));
            params.push(Value::Text(upper));
        }
        PathPredicate::ChildOf(None) => sql.push_str("depth = 1"),
        PathPredicate::ChildOf(Some(parent)) => {
            let (lower, upper) = descendant_bounds(parent);
            sql.push_str("(path > ? AND path < ? AND depth = ?)");
            params.push(Value::Text(lower));
            params.push(Value::Text(upper));
            params.push(Value::Integer(parent.depth() as i64 + 1));
        }
        PathPredicate::AnyOf(inner) => {
            if inner.is_empty() {
                sql.push('0');
                return;
            }
            sql.push('(');
            for (i, predicate) in inner.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" OR ");
                }
                push_predicate(predicate, sql, params);
            }
            sql.push(')');
        }
    }
}

/// Render a [`PathQuery`] into SQL plus positional params
fn build_select(query: &PathQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{} WHERE ", SELECT_COLUMNS);
    let mut params = Vec::new();

    push_predicate(&query.predicate, &mut sql, &mut params);
    if let Some(id) = &query.exclude_id {
        sql.push_str(" AND id != ?");
        params.push(Value::Text(id.clone()));
    }
    if let Some(after) = &query.after {
        sql.push_str(" AND path > ?");
        params.push(Value::Text(after.render()));
    }
    if let Some(before) = &query.before {
        sql.push_str(" AND path < ?");
        params.push(Value::Text(before.render()));
    }
    sql.push_str(match query.order {
        SortOrder::Ascending => " ORDER BY path ASC",
        SortOrder::Descending => " ORDER BY path DESC",
    });
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(limit as i64));
    }
    (sql, params)
}

async fn fetch_node(conn: &Connection, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
    let mut rows = conn
        .query(&format!("{} WHERE id = ?", SELECT_COLUMNS), [id])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute get_node query: {}", e)))?;
    match rows.next().await? {
        Some(row) => row_to_node(&row).map(Some),
        None => Ok(None),
    }
}

/// Run a query; rows whose stored path is corrupt are skipped and logged
async fn fetch_query(conn: &Connection, query: &PathQuery) -> Result<Vec<TreeNode>, DatabaseError> {
    let (sql, params) = build_select(query);
    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute path query: {}", e)))?;

    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await? {
        match row_to_node(&row) {
            Ok(node) => nodes.push(node),
            Err(DatabaseError::CorruptPath { id, source }) => {
                tracing::warn!("Skipping node {} with corrupt path: {}", id, source);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(nodes)
}

/// Greatest child label under `prefix`; a corrupt sibling row fails the read
async fn fetch_max_label(
    conn: &Connection,
    prefix: Option<&Path>,
) -> Result<Option<Label>, DatabaseError> {
    let query = PathQuery::new(PathPredicate::ChildOf(prefix.cloned()))
        .descending()
        .limit(1);
    let (sql, params) = build_select(&query);
    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to read last sibling: {}", e)))?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_node(&row)?.path.last_label())),
        None => Ok(None),
    }
}

/// Convert a `tree_nodes` row (id, name, path, created_at) to a node
fn row_to_node(row: &Row) -> Result<TreeNode, DatabaseError> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let path_text: String = row.get(2)?;
    let created_at_text: Option<String> = row.get(3)?;

    let path = Path::parse(&path_text).map_err(|e| DatabaseError::corrupt_path(&id, e))?;
    let created_at = match created_at_text {
        Some(text) => parse_timestamp(&text)?,
        None => Utc::now(),
    };

    Ok(TreeNode {
        id,
        name,
        path,
        created_at,
    })
}

/// Parse a timestamp in either SQLite `CURRENT_TIMESTAMP` or RFC3339 format
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(DatabaseError::sql_execution(format!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    )))
}

/// Map UNIQUE violations to their domain errors
fn map_write_error(error: libsql::Error, path: &str, id: &str) -> DatabaseError {
    let message = error.to_string();
    if message.contains("UNIQUE constraint failed: tree_nodes.path") {
        DatabaseError::duplicate_path(path)
    } else if message.contains("UNIQUE constraint failed: tree_nodes.id") {
        DatabaseError::duplicate_id(id)
    } else {
        DatabaseError::sql_execution(format!("Write failed: {}", message))
    }
}

/// Errors from statements that rewrite paths but never assign ids
fn map_path_error(error: libsql::Error, path: &str) -> DatabaseError {
    let message = error.to_string();
    if message.contains("UNIQUE constraint failed: tree_nodes.path") {
        DatabaseError::duplicate_path(path)
    } else {
        DatabaseError::sql_execution(format!("Path rewrite failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(values: &[u64]) -> Path {
        Path::from_labels(values.iter().map(|v| Label::new(*v).unwrap()).collect()).unwrap()
    }

    #[test]
    fn test_descendant_bounds_bracket_children() {
        let (lower, upper) = descendant_bounds(&path(&[1]));
        let child = path(&[1, 2]).render();
        let sibling = path(&[2]).render();
        assert!(child.as_str() > lower.as_str() && child.as_str() < upper.as_str());
        assert!(sibling.as_str() > upper.as_str());
        assert!(path(&[1]).render().as_str() < lower.as_str());
    }

    #[test]
    fn test_build_select_orders_params_with_clauses() {
        let query = PathQuery::new(PathPredicate::ChildOf(Some(path(&[1]))))
            .excluding("me")
            .after(path(&[1, 5]))
            .descending()
            .limit(1);
        let (sql, params) = build_select(&query);
        assert!(sql.ends_with(
            "(path > ? AND path < ? AND depth = ?) AND id != ? AND path > ? ORDER BY path DESC LIMIT ?"
        ));
        assert_eq!(params.len(), 6);
        assert!(matches!(params[2], Value::Integer(2)));
        assert!(matches!(&params[3], Value::Text(id) if id == "me"));
        assert!(matches!(params[5], Value::Integer(1)));
    }

    #[test]
    fn test_ancestor_of_root_matches_nothing() {
        let (sql, params) = build_select(&PathQuery::new(PathPredicate::AncestorOf(path(&[1]))));
        assert!(sql.contains("WHERE 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-01-03 10:20:30").is_ok());
        assert!(parse_timestamp("2025-01-03T10:20:30Z").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
