//! # Store Error Types
//!
//! Error types for document store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds collection/id context                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError (khata-ledger) ← NotFound / Conflict / PartialFailure     │
//! │                                                                         │
//! │  VersionConflict is NOT fatal up there: the ledger retries the CAS     │
//! │  a bounded number of times before surfacing a Conflict.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Document store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document not found.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Insert with an id that already exists in the collection.
    ///
    /// For deterministic ids (sale lines, stock markers) this is the
    /// idempotency signal, not a failure.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// Compare-and-set update lost a race: the document's version moved
    /// between read and write.
    #[error("version conflict on {collection}/{id}: expected version {expected}")]
    VersionConflict {
        collection: String,
        id: String,
        expected: i64,
    },

    /// Payload (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored timestamp could not be parsed.
    #[error("corrupt timestamp in {collection}/{id}: {raw}")]
    CorruptTimestamp {
        collection: String,
        id: String,
        raw: String,
    },

    /// Could not open or connect to the backing database.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Backend query failure (disk full, pool exhausted, corrupt db).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a NotFound error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error.
    pub fn already_exists(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// True when this error is a CAS loss the caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Convert sqlx errors to StoreError.
///
/// Constraint violations carry no collection/id context here; the insert
/// path maps those explicitly before this fallback applies.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                StoreError::Backend("connection pool exhausted".to_string())
            }
            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("pool is closed".to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
