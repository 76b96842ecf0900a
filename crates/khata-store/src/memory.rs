//! # In-Memory Store
//!
//! A `DocumentStore` backed by maps, for tests and coordinator scenarios.
//!
//! ## Fidelity
//! The in-memory backend keeps the exact semantics the SQLite backend has —
//! create-if-absent, version CAS, (created_at, id) ordering — so every
//! consistency test that passes here holds against production too. It adds
//! no atomicity the real backend lacks.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Document, Filter, FilterOp, NewDocument, Query, SortOrder};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory document store. Cheap to create, fully isolated per instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// collection → (id → document). BTreeMap keeps iteration deterministic.
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn insert(&self, doc: NewDocument) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(doc.collection.clone()).or_default();

        if docs.contains_key(&doc.id) {
            return Err(StoreError::already_exists(&doc.collection, &doc.id));
        }

        let stored = Document {
            collection: doc.collection,
            id: doc.id,
            payload: doc.payload,
            version: 1,
            created_at: doc.created_at,
        };
        debug!(collection = %stored.collection, id = %stored.id, "document inserted");
        docs.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: Value,
        expected_version: Option<i64>,
    ) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        if let Some(expected) = expected_version {
            if doc.version != expected {
                return Err(StoreError::VersionConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                });
            }
        }

        doc.payload = payload;
        doc.version += 1;
        debug!(collection, id, version = doc.version, "document updated");
        Ok(doc.clone())
    }

    async fn remove(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            debug!(collection, id, "document removed");
        }
        Ok(removed)
    }

    async fn remove_many(&self, collection: &str, ids: &[String]) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut removed = 0;
        for id in ids {
            if docs.remove(id).is_some() {
                removed += 1;
            }
        }
        debug!(collection, removed, "batch delete");
        Ok(removed)
    }

    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .values()
            .filter(|doc| query.filters.iter().all(|f| filter_matches(doc, f)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let key_a = (a.created_at, a.id.as_str());
            let key_b = (b.created_at, b.id.as_str());
            match query.order {
                SortOrder::CreatedAtAsc => key_a.cmp(&key_b),
                SortOrder::CreatedAtDesc => key_b.cmp(&key_a),
            }
        });

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: &Query) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(0);
        };

        Ok(docs
            .values()
            .filter(|doc| query.filters.iter().all(|f| filter_matches(doc, f)))
            .count() as u64)
    }
}

// =============================================================================
// Filter Evaluation
// =============================================================================

/// Evaluates one filter against a document. `created_at` reads the document
/// field (as its stored text form), everything else reads the payload.
fn filter_matches(doc: &Document, filter: &Filter) -> bool {
    let actual: Value = if filter.field == "created_at" {
        Value::String(crate::document::format_timestamp(doc.created_at))
    } else {
        match doc.payload.get(&filter.field) {
            Some(v) => v.clone(),
            None => return false,
        }
    };

    let Some(ordering) = compare_values(&actual, &filter.value) else {
        return false;
    };

    match filter.op {
        FilterOp::Eq => ordering == std::cmp::Ordering::Equal,
        FilterOp::Lt => ordering == std::cmp::Ordering::Less,
        FilterOp::Le => ordering != std::cmp::Ordering::Greater,
        FilterOp::Gt => ordering == std::cmp::Ordering::Greater,
        FilterOp::Ge => ordering != std::cmp::Ordering::Less,
    }
}

/// Compares two JSON scalars. Mixed or non-scalar types do not compare,
/// matching SQLite's json_extract behaviour closely enough for our filters.
fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                Some(xi.cmp(&yi))
            } else {
                x.as_f64().partial_cmp(&y.as_f64())
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
