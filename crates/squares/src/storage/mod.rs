//! Storage layer for squares.
//!
//! The [`SquareStore`] trait is the record store contract the session works
//! against. [`SqliteStore`] implements it as a document collection inside an
//! embedded `SQLite` database: each square is a JSON body keyed by an opaque
//! [`SquareId`], listed in insertion order.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::square::{Square, SquareFields, SquareId};

/// Persistence contract for square documents.
///
/// Update and delete report whether a document matched, so callers can tell
/// a successful write from a miss on an identifier that is already gone.
#[async_trait]
pub trait SquareStore: Send + Sync {
    /// Number of squares currently persisted.
    async fn count(&self) -> Result<u64>;

    /// Every square, in insertion order.
    async fn list_all(&self) -> Result<Vec<Square>>;

    /// Look up one square.
    async fn find_by_id(&self, id: &SquareId) -> Result<Option<Square>>;

    /// Create several squares at once. Either all are written or none are.
    async fn insert_many(&self, records: &[SquareFields]) -> Result<Vec<SquareId>>;

    /// Create a single square and return its new identifier.
    async fn insert_one(&self, record: &SquareFields) -> Result<SquareId>;

    /// Replace all five fields of a square. Returns `false` if no square matched.
    async fn update_by_id(&self, id: &SquareId, fields: &SquareFields) -> Result<bool>;

    /// Remove a square. Returns `false` if no square matched.
    async fn delete_by_id(&self, id: &SquareId) -> Result<bool>;
}

/// Document store backed by `SQLite`.
///
/// The connection sits behind a mutex and every call runs on tokio's blocking
/// pool, so the store can be shared across tasks.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Collection every query is scoped to.
    collection: String,
    /// Database connection.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a document database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets other processes read while the session writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        let collection = collection.into();
        info!(
            "Database opened at {} (collection '{}')",
            path.display(),
            collection
        );
        Ok(Self {
            path,
            collection,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(collection: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            collection: collection.into(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the collection name this store reads and writes.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Run `f` against the locked connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let collection = self.collection.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::internal("database connection lock poisoned"))?;
            f(&mut guard, &collection)
        })
        .await
        .map_err(|e| Error::internal(format!("database task failed: {e}")))?
    }

    fn insert_document(
        conn: &Connection,
        collection: &str,
        fields: &SquareFields,
    ) -> Result<SquareId> {
        let id = SquareId::generate();
        let body = serde_json::to_string(fields)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r"
            INSERT INTO documents (id, collection, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ",
            params![id.as_str(), collection, body, now],
        )?;
        Ok(id)
    }

    fn decode(id: String, body: &str) -> Result<Square> {
        let fields: SquareFields =
            serde_json::from_str(body).map_err(|source| Error::CorruptDocument {
                id: id.clone(),
                source,
            })?;
        Ok(Square::new(id.parse()?, fields))
    }
}

#[async_trait]
impl SquareStore for SqliteStore {
    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn, collection| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<Square>> {
        self.with_conn(|conn, collection| {
            let mut stmt = conn.prepare(
                "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([collection], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let squares = rows
                .into_iter()
                .map(|(id, body)| Self::decode(id, &body))
                .collect::<Result<Vec<_>>>()?;
            debug!("Listed {} squares", squares.len());
            Ok(squares)
        })
        .await
    }

    async fn find_by_id(&self, id: &SquareId) -> Result<Option<Square>> {
        let id = id.clone();
        self.with_conn(move |conn, collection| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE id = ?1 AND collection = ?2",
                    params![id.as_str(), collection],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|body| Self::decode(id.into(), &body)).transpose()
        })
        .await
    }

    async fn insert_many(&self, records: &[SquareFields]) -> Result<Vec<SquareId>> {
        for record in records {
            record.validate()?;
        }

        let records = records.to_vec();
        self.with_conn(move |conn, collection| {
            let tx = conn.transaction()?;
            let ids = records
                .iter()
                .map(|fields| Self::insert_document(&tx, collection, fields))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;

            debug!("Inserted {} squares", ids.len());
            Ok(ids)
        })
        .await
    }

    async fn insert_one(&self, record: &SquareFields) -> Result<SquareId> {
        record.validate()?;

        let record = record.clone();
        self.with_conn(move |conn, collection| {
            let id = Self::insert_document(conn, collection, &record)?;
            debug!("Inserted square {}", id);
            Ok(id)
        })
        .await
    }

    async fn update_by_id(&self, id: &SquareId, fields: &SquareFields) -> Result<bool> {
        fields.validate()?;

        let id = id.clone();
        let body = serde_json::to_string(fields)?;
        self.with_conn(move |conn, collection| {
            let affected = conn.execute(
                r"
                UPDATE documents SET body = ?1, updated_at = ?2
                WHERE id = ?3 AND collection = ?4
                ",
                params![body, Utc::now().to_rfc3339(), id.as_str(), collection],
            )?;
            debug!("Updated square {} (matched: {})", id, affected > 0);
            Ok(affected > 0)
        })
        .await
    }

    async fn delete_by_id(&self, id: &SquareId) -> Result<bool> {
        let id = id.clone();
        self.with_conn(move |conn, collection| {
            let affected = conn.execute(
                "DELETE FROM documents WHERE id = ?1 AND collection = ?2",
                params![id.as_str(), collection],
            )?;
            debug!("Deleted square {} (matched: {})", id, affected > 0);
            Ok(affected > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory("squares").expect("failed to create test store")
    }

    fn red() -> SquareFields {
        SquareFields::new(5, "red")
            .filled(true)
            .text("Square 1")
            .text_color("white")
    }

    fn blue() -> SquareFields {
        SquareFields::new(10, "blue").text("Square 2")
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
        assert_eq!(store.collection(), "squares");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_one_and_find() {
        let store = create_test_store();
        let id = store.insert_one(&red()).await.unwrap();

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.fields, red());
    }

    #[tokio::test]
    async fn test_find_missing() {
        let store = create_test_store();
        let id = SquareId::generate();
        assert!(store.find_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_in_insertion_order() {
        let store = create_test_store();
        let first = store.insert_one(&blue()).await.unwrap();
        let second = store.insert_one(&red()).await.unwrap();

        let squares = store.list_all().await.unwrap();
        let ids: Vec<_> = squares.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_insert_many() {
        let store = create_test_store();
        let ids = store.insert_many(&[red(), blue()]).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_many_is_all_or_nothing() {
        let store = create_test_store();
        let bad = SquareFields::new(1, "");

        let err = store.insert_many(&[red(), bad, blue()]).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_one_rejects_missing_color() {
        let store = create_test_store();
        let err = store
            .insert_one(&SquareFields::new(3, ""))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "color is required");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_all_fields() {
        let store = create_test_store();
        let id = store.insert_one(&red()).await.unwrap();
        let other = store.insert_one(&blue()).await.unwrap();

        let replacement = SquareFields::new(42, "gold").text("new").text_color("navy");
        assert!(store.update_by_id(&id, &replacement).await.unwrap());

        assert_eq!(
            store.find_by_id(&id).await.unwrap().unwrap().fields,
            replacement
        );
        assert_eq!(
            store.find_by_id(&other).await.unwrap().unwrap().fields,
            blue()
        );
    }

    #[tokio::test]
    async fn test_update_missing_reports_no_match() {
        let store = create_test_store();
        let matched = store
            .update_by_id(&SquareId::generate(), &red())
            .await
            .unwrap();
        assert!(!matched);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        let store = create_test_store();
        let id = store.insert_one(&red()).await.unwrap();

        let result = store
            .update_by_id(&id, &SquareFields::new(5, "red").text_color(" "))
            .await;
        assert!(result.is_err());
        assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().fields, red());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        let id = store.insert_one(&red()).await.unwrap();

        assert!(store.delete_by_id(&id).await.unwrap());
        assert!(store.find_by_id(&id).await.unwrap().is_none());
        assert!(!store.delete_by_id(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let squares = create_test_store();
        let shapes = SqliteStore {
            path: squares.path.clone(),
            collection: "shapes".to_string(),
            conn: Arc::clone(&squares.conn),
        };

        squares.insert_one(&red()).await.unwrap();
        let id = shapes.insert_one(&blue()).await.unwrap();

        assert_eq!(squares.count().await.unwrap(), 1);
        assert_eq!(shapes.count().await.unwrap(), 1);
        assert!(!squares.delete_by_id(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let store = create_test_store();
        let id = SquareId::generate();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO documents (id, collection, body, created_at, updated_at)
                 VALUES (?1, 'squares', '{\"color\": \"red\"}', 'now', 'now')",
                [id.as_str()],
            )
            .unwrap();
        }

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, Error::CorruptDocument { .. }));
        assert!(err.to_string().contains(id.as_str()));
    }

    #[tokio::test]
    async fn test_documents_keep_defaults_on_disk() {
        let store = create_test_store();
        let id = store.insert_one(&SquareFields::new(8, "purple")).await.unwrap();

        let body: String = {
            let conn = store.conn.lock().unwrap();
            conn.query_row(
                "SELECT body FROM documents WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .unwrap()
        };
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["isFilled"], false);
        assert_eq!(json["text"], "");
        assert_eq!(json["textColor"], "black");
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let db_path = std::env::temp_dir().join(format!(
            "squares_store_test_{}.db",
            std::process::id()
        ));

        let id = {
            let store = SqliteStore::open(&db_path, "squares").unwrap();
            store.insert_one(&red()).await.unwrap()
        };

        let reopened = SqliteStore::open(&db_path, "squares").unwrap();
        assert_eq!(reopened.path(), db_path);
        assert_eq!(reopened.find_by_id(&id).await.unwrap().unwrap().fields, red());

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("squares_test_{}", std::process::id()));
        let nested_path = root.join("nested/db.sqlite");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path, "squares").unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }
}
