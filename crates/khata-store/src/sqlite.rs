//! # SQLite Store
//!
//! The production `DocumentStore`, backed by a single `documents` table.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Document Store                              │
//! │                                                                         │
//! │  StoreConfig::new(path) ← pool settings, builder style                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteStore::connect(config).await ← pool + migrations                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  documents (collection, id, payload, version, created_at)               │
//! │                                                                         │
//! │  get/insert/remove   → keyed on (collection, id)                        │
//! │  update              → CAS: WHERE version = ? , rows_affected tells     │
//! │  find/count          → filters compile to json_extract(payload, '$.f')  │
//! │                        except created_at, which hits the indexed column │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! WAL journal mode is enabled: readers don't block writers and report
//! queries can run beside the coordinator's writes.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::{debug, info};

use crate::document::{format_timestamp, parse_timestamp, Document, NewDocument, Query, SortOrder};
use crate::error::{StoreError, StoreResult};
use crate::migrations;
use crate::store::DocumentStore;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/path/to/khata.db").max_connections(5);
/// let store = SqliteStore::connect(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file. Created if missing.
    pub database_path: PathBuf,

    /// Maximum pool size. Default: 5, plenty for a single-shop deployment.
    pub max_connections: u32,

    /// Minimum connections kept alive. Default: 1.
    pub min_connections: u32,

    /// Acquire timeout. Default: 30 seconds.
    pub connect_timeout: Duration,

    /// Whether to run migrations on connect. Default: true.
    pub run_migrations: bool,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// In-memory database for tests. Single connection, or each pooled
    /// connection would see its own empty database.
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// SqliteStore
// =============================================================================

/// SQLite-backed document store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and runs migrations.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        info!(path = %config.database_path.display(), "opening document store");

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "store pool created");

        let store = SqliteStore { pool };
        if config.run_migrations {
            migrations::run_migrations(&store.pool).await?;
        }
        Ok(store)
    }

    /// The underlying pool, for diagnostics.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Closes the pool. Operations fail afterwards.
    pub async fn close(&self) {
        info!("closing store pool");
        self.pool.close().await;
    }

    fn row_to_document(row: &SqliteRow) -> StoreResult<Document> {
        let collection: String = row.try_get("collection").map_err(StoreError::from)?;
        let id: String = row.try_get("id").map_err(StoreError::from)?;
        let payload_raw: String = row.try_get("payload").map_err(StoreError::from)?;
        let version: i64 = row.try_get("version").map_err(StoreError::from)?;
        let created_raw: String = row.try_get("created_at").map_err(StoreError::from)?;

        let payload: Value = serde_json::from_str(&payload_raw)?;
        let created_at = parse_timestamp(&collection, &id, &created_raw)?;

        Ok(Document {
            collection,
            id,
            payload,
            version,
            created_at,
        })
    }
}

/// Appends the WHERE predicates of a query. The caller has already written
/// `WHERE collection = ?`.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, sqlx::Sqlite>, query: &'a Query) {
    for filter in &query.filters {
        if filter.field == "created_at" {
            qb.push(" AND created_at ");
        } else {
            qb.push(" AND json_extract(payload, ");
            qb.push_bind(format!("$.{}", filter.field));
            qb.push(") ");
        }
        qb.push(filter.op.sql());
        qb.push(" ");
        push_bind_value(qb, &filter.value);
    }
}

/// Binds a JSON scalar as the closest SQLite type.
fn push_bind_value(qb: &mut QueryBuilder<'_, sqlx::Sqlite>, value: &Value) {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else {
                qb.push_bind(n.as_f64().unwrap_or(0.0));
            }
        }
        Value::Bool(b) => {
            qb.push_bind(*b as i64);
        }
        // Non-scalar filter values never match anything
        _ => {
            qb.push_bind(Option::<String>::None);
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT collection, id, payload, version, created_at
             FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn insert(&self, doc: NewDocument) -> StoreResult<Document> {
        let payload_raw = serde_json::to_string(&doc.payload)?;
        let created_raw = format_timestamp(doc.created_at);

        let result = sqlx::query(
            "INSERT INTO documents (collection, id, payload, version, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&doc.collection)
        .bind(&doc.id)
        .bind(&payload_raw)
        .bind(&created_raw)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(collection = %doc.collection, id = %doc.id, "document inserted");
                Ok(Document {
                    collection: doc.collection,
                    id: doc.id,
                    payload: doc.payload,
                    version: 1,
                    created_at: doc.created_at,
                })
            }
            Err(sqlx::Error::Database(db_err))
                if db_err.message().contains("UNIQUE constraint failed")
                    || db_err.message().contains("PRIMARY KEY constraint failed") =>
            {
                Err(StoreError::already_exists(&doc.collection, &doc.id))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: Value,
        expected_version: Option<i64>,
    ) -> StoreResult<Document> {
        let payload_raw = serde_json::to_string(&payload)?;

        let result = match expected_version {
            Some(expected) => {
                sqlx::query(
                    "UPDATE documents SET payload = ?, version = version + 1
                     WHERE collection = ? AND id = ? AND version = ?",
                )
                .bind(&payload_raw)
                .bind(collection)
                .bind(id)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE documents SET payload = ?, version = version + 1
                     WHERE collection = ? AND id = ?",
                )
                .bind(&payload_raw)
                .bind(collection)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            // Distinguish a missing document from a lost race
            return match self.get(collection, id).await? {
                None => Err(StoreError::not_found(collection, id)),
                Some(_) => Err(StoreError::VersionConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected: expected_version.unwrap_or(0),
                }),
            };
        }

        let updated = self
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        debug!(collection, id, version = updated.version, "document updated");
        Ok(updated)
    }

    async fn remove(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(collection, id, "document removed");
        }
        Ok(removed)
    }

    async fn remove_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("DELETE FROM documents WHERE collection = ");
        qb.push_bind(collection);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        debug!(collection, removed = result.rows_affected(), "batch delete");
        Ok(result.rows_affected())
    }

    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT collection, id, payload, version, created_at
             FROM documents WHERE collection = ",
        );
        qb.push_bind(&query.collection);
        push_filters(&mut qb, query);

        match query.order {
            SortOrder::CreatedAtAsc => qb.push(" ORDER BY created_at ASC, id ASC"),
            SortOrder::CreatedAtDesc => qb.push(" ORDER BY created_at DESC, id DESC"),
        };

        // SQLite needs a LIMIT clause to accept an OFFSET; -1 means unbounded
        if query.limit.is_some() || query.offset.is_some() {
            qb.push(" LIMIT ");
            qb.push_bind(query.limit.map(|l| l as i64).unwrap_or(-1));
            if let Some(offset) = query.offset {
                qb.push(" OFFSET ");
                qb.push_bind(offset as i64);
            }
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: &Query) -> StoreResult<u64> {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) AS n FROM documents WHERE collection = ");
        qb.push_bind(&query.collection);
        push_filters(&mut qb, query);

        let row = qb.build().fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n").map_err(StoreError::from)?;
        Ok(n as u64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect(StoreConfig::in_memory()).await.unwrap()
    }

    fn doc(collection: &str, id: &str, payload: Value) -> NewDocument {
        NewDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_connect_and_health() {
        let store = memory_store().await;
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let store = memory_store().await;
        store
            .insert(doc("products", "p1", json!({"name": "Rice", "stock": 5000})))
            .await
            .unwrap();

        let fetched = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.payload["stock"], 5000);
        assert!(store.get("products", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_maps_to_already_exists() {
        let store = memory_store().await;
        store.insert(doc("sales", "s1", json!({}))).await.unwrap();
        let err = store.insert(doc("sales", "s1", json!({}))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // Same id in a different collection is a different document
        store.insert(doc("payments", "s1", json!({}))).await.unwrap();
    }

    #[tokio::test]
    async fn test_cas_update_detects_race() {
        let store = memory_store().await;
        store
            .insert(doc("customers", "c1", json!({"total_due": 0})))
            .await
            .unwrap();

        let updated = store
            .update("customers", "c1", json!({"total_due": 100}), Some(1))
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.payload["total_due"], 100);

        let err = store
            .update("customers", "c1", json!({"total_due": 999}), Some(1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = store
            .update("customers", "ghost", json!({}), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_with_json_extract_filter() {
        let store = memory_store().await;
        for (id, cust) in [("a", "c1"), ("b", "c2"), ("c", "c1")] {
            store
                .insert(doc("payments", id, json!({"customer_id": cust, "amount": 100})))
                .await
                .unwrap();
        }

        let q = Query::new("payments")
            .filter(crate::document::Filter::eq("customer_id", json!("c1")));
        let found = store.find(&q).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.count(&q).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_many_skips_missing() {
        let store = memory_store().await;
        store.insert(doc("sale_items", "s1:0", json!({}))).await.unwrap();
        store.insert(doc("sale_items", "s1:1", json!({}))).await.unwrap();

        let removed = store
            .remove_many(
                "sale_items",
                &["s1:0".to_string(), "s1:1".to_string(), "ghost".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("khata.db");

        {
            let store = SqliteStore::connect(StoreConfig::new(&path)).await.unwrap();
            store
                .insert(doc("products", "p1", json!({"name": "Rice"})))
                .await
                .unwrap();
            store.close().await;
        }

        // Reopen: data intact, migrations are a no-op the second time
        let store = SqliteStore::connect(StoreConfig::new(&path)).await.unwrap();
        let fetched = store.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(fetched.payload["name"], "Rice");
    }

    #[tokio::test]
    async fn test_offset_pagination() {
        let store = memory_store().await;
        for i in 0..5 {
            let mut d = doc("sales", &format!("s{i}"), json!({"n": i}));
            d.created_at = Utc::now() + chrono::Duration::seconds(i);
            store.insert(d).await.unwrap();
        }

        let q = Query::new("sales")
            .order(SortOrder::CreatedAtDesc)
            .limit(2)
            .offset(2);
        let page = store.find(&q).await.unwrap();
        assert_eq!(
            page.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["s2", "s1"]
        );
    }
}
