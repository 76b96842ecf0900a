//! # DocumentStore Trait
//!
//! The persistence interface the whole ledger is written against.
//!
//! ## The Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  What the store PROMISES                                                │
//! │  - get-by-id, filtered/ordered/paginated query                          │
//! │  - insert is create-if-absent (AlreadyExists on duplicate id)           │
//! │  - update is CAS on the document version                                │
//! │  - remove is idempotent (returns whether anything was deleted)          │
//! │                                                                         │
//! │  What the store does NOT promise                                        │
//! │  - NO atomicity across documents. A sale touching five documents is     │
//! │    five independent writes. Consistency across them is khata-ledger's   │
//! │    problem, by construction.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::document::{Document, NewDocument, Query};
use crate::error::StoreResult;

/// Backend-agnostic document store.
///
/// Implemented by [`MemoryStore`](crate::memory::MemoryStore) for tests and
/// [`SqliteStore`](crate::sqlite::SqliteStore) for production.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Creates a document. Fails with `AlreadyExists` when the id is taken;
    /// the stored document gets version 1.
    async fn insert(&self, doc: NewDocument) -> StoreResult<Document>;

    /// Replaces a document's payload.
    ///
    /// With `expected_version = Some(v)` this is a compare-and-set: the
    /// write lands only if the stored version is still `v`, otherwise
    /// `VersionConflict`. With `None` the write is unconditional. Either
    /// way the version is bumped and `created_at` is preserved.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: serde_json::Value,
        expected_version: Option<i64>,
    ) -> StoreResult<Document>;

    /// Deletes a document. Returns whether it existed; deleting an absent
    /// document is not an error.
    async fn remove(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Best-effort batched delete. Returns how many documents were removed;
    /// ids that are already gone are skipped silently.
    async fn remove_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64>;

    /// Runs a filtered, ordered, paginated query.
    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Counts documents matching a query (limit/offset ignored).
    async fn count(&self, query: &Query) -> StoreResult<u64>;
}
