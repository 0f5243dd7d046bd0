use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use tracing::{debug, info};

use crate::core::strong_types::DocId;
use crate::core::time::current_time_millis;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    Document, DocumentStore, Filter, SortOrder, StoredDocument,
};

const SELECT_COLUMNS: &str =
    "SELECT id, time_created, time_updated, version, data FROM documents";

/// SQLite implementation of the document store. Every collection shares one
/// table; document bodies are JSON text.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let in_memory = url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                AppError::ConfigurationError(format!("Invalid database url {}: {}", url, e))
            })?
            .create_if_missing(true);

        // An in-memory database lives as long as its single connection does
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e))
        })?;

        let store = Self { pool };
        store.initialize().await?;
        info!("Document store ready at {}", url);
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                collection TEXT NOT NULL,
                time_created INTEGER NOT NULL,
                time_updated INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create documents table: {}", e)))?;

        // Files written before documents were versioned lack the column
        let versioned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('documents') WHERE name = 'version'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to inspect documents table: {}", e)))?;
        if versioned == 0 {
            sqlx::query("ALTER TABLE documents ADD COLUMN version INTEGER NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to add version column: {}", e))
                })?;
            info!("Added version column to documents table");
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create collection index: {}", e))
        })?;

        Ok(())
    }

    fn row_to_document(row: SqliteRow) -> AppResult<StoredDocument> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| AppError::DatabaseError(format!("Failed to read id column: {}", e)))?;
        let raw: String = row.try_get("data").map_err(|e| {
            AppError::DatabaseError(format!("Failed to read data of document {}: {}", id, e))
        })?;
        let data: Document = serde_json::from_str(&raw).map_err(|e| {
            AppError::SerializationError(format!("Document {} is not a JSON object: {}", id, e))
        })?;

        Ok(StoredDocument {
            id: DocId(id),
            created_time: row.try_get::<i64, _>("time_created").unwrap_or_default(),
            updated_time: row.try_get::<i64, _>("time_updated").unwrap_or_default(),
            version: row.try_get::<i64, _>("version").unwrap_or_default(),
            data,
        })
    }

    /// Scan a collection in `order`, stopping after `limit` matches
    async fn scan(
        &self,
        collection: &str,
        filter: &Filter,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<StoredDocument>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        qb.push(" WHERE collection = ");
        qb.push_bind(collection);
        if let Some(id) = filter.pinned_id() {
            qb.push(" AND id = ");
            qb.push_bind(id.value());
        }
        match order {
            SortOrder::Inserted => qb.push(" ORDER BY id ASC"),
            SortOrder::RecentlyUpdated => qb.push(" ORDER BY time_updated DESC, id DESC"),
        };

        let mut rows = qb.build().fetch(&self.pool);
        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to scan collection {}: {}", collection, e))
        })? {
            let doc = Self::row_to_document(row)?;
            if filter.matches(&doc) {
                matches.push(doc);
                if limit.is_some_and(|limit| matches.len() >= limit) {
                    break;
                }
            }
        }

        debug!("{} documents of {} matched {:?}", matches.len(), collection, filter);
        Ok(matches)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, id: DocId, data: Document) -> AppResult<()> {
        let now = current_time_millis();
        let body = serde_json::to_string(&data)?;
        sqlx::query(
            "INSERT INTO documents (id, collection, time_created, time_updated, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.value())
        .bind(collection)
        .bind(now)
        .bind(now)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create document {} in {}: {}", id, collection, e))
        })?;
        Ok(())
    }

    async fn read_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> AppResult<Option<StoredDocument>> {
        Ok(self
            .scan(collection, filter, SortOrder::Inserted, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn read_many(
        &self,
        collection: &str,
        filter: &Filter,
        order: SortOrder,
    ) -> AppResult<Vec<StoredDocument>> {
        self.scan(collection, filter, order, None).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
    ) -> AppResult<bool> {
        let Some(target) = self.read_one(collection, filter).await? else {
            return Ok(false);
        };

        // json_patch merges top-level keys in one statement, so the write is
        // atomic for this document
        let result = sqlx::query(
            "UPDATE documents SET data = json_patch(data, ?), time_updated = ?, version = version + 1 WHERE collection = ? AND id = ?",
        )
        .bind(serde_json::to_string(&patch)?)
        .bind(current_time_millis())
        .bind(collection)
        .bind(target.id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to update document {}: {}", target.id, e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: DocId,
        version: i64,
        patch: Document,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET data = json_patch(data, ?), time_updated = ?, version = version + 1 WHERE collection = ? AND id = ? AND version = ?",
        )
        .bind(serde_json::to_string(&patch)?)
        .bind(current_time_millis())
        .bind(collection)
        .bind(id.value())
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update document {}: {}", id, e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> AppResult<bool> {
        let Some(target) = self.read_one(collection, filter).await? else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(target.id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete document {}: {}", target.id, e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        let targets = self.read_many(collection, filter, SortOrder::Inserted).await?;
        if targets.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM documents WHERE collection = ");
        qb.push_bind(collection);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(",");
        for doc in &targets {
            separated.push_bind(doc.id.value());
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to delete documents from {}: {}", collection, e))
        })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn body(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let store = SqliteDocumentStore::new_in_memory().await.unwrap();
        store
            .create("posts", DocId(1), body(json!({"content": "hi", "author": 5})))
            .await
            .unwrap();

        let found = store
            .read_one("posts", &Filter::by_id(DocId(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.data["content"], "hi");

        // collections are separate namespaces
        let other = store.read_one("events", &Filter::by_id(DocId(1))).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_patch_merges_top_level_fields() {
        let store = SqliteDocumentStore::new_in_memory().await.unwrap();
        store
            .create("profiles", DocId(1), body(json!({"name": "a", "bio": "b", "interests": ["x"]})))
            .await
            .unwrap();

        let updated = store
            .update_one("profiles", &Filter::by_id(DocId(1)), body(json!({"bio": "c", "interests": []})))
            .await
            .unwrap();
        assert!(updated);

        let doc = store.read_one("profiles", &Filter::new()).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "a");
        assert_eq!(doc.data["bio"], "c");
        assert_eq!(doc.data["interests"], json!([]));

        let missing = store
            .update_one("profiles", &Filter::by_id(DocId(2)), body(json!({"bio": "d"})))
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_read_many_orders() {
        let store = SqliteDocumentStore::new_in_memory().await.unwrap();
        for id in 1..=3 {
            store
                .create("posts", DocId(id), body(json!({"n": id})))
                .await
                .unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .update_one("posts", &Filter::by_id(DocId(1)), body(json!({"n": 10})))
            .await
            .unwrap();

        let inserted = store
            .read_many("posts", &Filter::new(), SortOrder::Inserted)
            .await
            .unwrap();
        let ids: Vec<i64> = inserted.iter().map(|d| d.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let recent = store
            .read_many("posts", &Filter::new(), SortOrder::RecentlyUpdated)
            .await
            .unwrap();
        assert_eq!(recent[0].id, DocId(1));

        let filtered = store
            .read_many("posts", &Filter::new().gte("n", 3), SortOrder::Inserted)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_versioned_update_rejects_stale_reads() {
        let store = SqliteDocumentStore::new_in_memory().await.unwrap();
        store
            .create("events", DocId(1), body(json!({"interested": []})))
            .await
            .unwrap();

        let read = store.read_one("events", &Filter::by_id(DocId(1))).await.unwrap().unwrap();
        assert_eq!(read.version, 0);

        assert!(store
            .update_if_version("events", DocId(1), read.version, body(json!({"interested": ["2"]})))
            .await
            .unwrap());
        // a second writer holding the same read loses
        assert!(!store
            .update_if_version("events", DocId(1), read.version, body(json!({"interested": ["3"]})))
            .await
            .unwrap());

        let now = store.read_one("events", &Filter::by_id(DocId(1))).await.unwrap().unwrap();
        assert_eq!(now.version, 1);
        assert_eq!(now.data["interested"], json!(["2"]));

        store
            .update_one("events", &Filter::by_id(DocId(1)), body(json!({"title": "x"})))
            .await
            .unwrap();
        let now = store.read_one("events", &Filter::by_id(DocId(1))).await.unwrap().unwrap();
        assert_eq!(now.version, 2);
        assert!(!store
            .update_if_version("events", DocId(9), 0, body(json!({"title": "y"})))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let store = SqliteDocumentStore::new_in_memory().await.unwrap();
        for id in 1..=4 {
            let kind = if id % 2 == 0 { "even" } else { "odd" };
            store
                .create("locations", DocId(id), body(json!({"kind": kind})))
                .await
                .unwrap();
        }

        assert!(store.delete_one("locations", &Filter::by_id(DocId(1))).await.unwrap());
        assert!(!store.delete_one("locations", &Filter::by_id(DocId(1))).await.unwrap());

        let removed = store
            .delete_many("locations", &Filter::new().eq("kind", "even"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let left = store
            .read_many("locations", &Filter::new(), SortOrder::Inserted)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, DocId(3));
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let url = format!("sqlite://{}", path.display());

        {
            let store = SqliteDocumentStore::connect(&url, 2).await.unwrap();
            store
                .create("users", DocId(77), body(json!({"username": "ada"})))
                .await
                .unwrap();
        }

        let reopened = SqliteDocumentStore::connect(&url, 2).await.unwrap();
        let doc = reopened
            .read_one("users", &Filter::new().eq("username", "ada"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.id, DocId(77));
    }
}
