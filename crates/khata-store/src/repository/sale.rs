//! # Sale Repository
//!
//! The `sales` and `sale_items` collections.
//!
//! ## Two-Collection Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales/{sale_id}                  the sale header (totals, method)      │
//! │  sale_items/{sale_id}:{line_no}   one document per line                 │
//! │                                                                         │
//! │  Line ids are deterministic: a retried write of the same cart hits     │
//! │  the same documents (AlreadyExists = already converged), instead of    │
//! │  growing duplicates.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use khata_core::types::{Sale, SaleLine};
use serde_json::json;
use tracing::debug;

use crate::document::{collections, Filter, NewDocument, Query, SortOrder, Versioned};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct SaleRepository {
    store: Arc<dyn DocumentStore>,
}

impl SaleRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        SaleRepository { store }
    }

    // =========================================================================
    // Sale Headers
    // =========================================================================

    pub async fn insert(&self, sale: &Sale) -> StoreResult<()> {
        let doc = NewDocument::encode(collections::SALES, &sale.id, sale, sale.created_at)?;
        self.store.insert(doc).await?;
        debug!(sale_id = %sale.id, total = %sale.total, "sale created");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> StoreResult<Versioned<Sale>> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(collections::SALES, id))
    }

    pub async fn try_get(&self, id: &str) -> StoreResult<Option<Versioned<Sale>>> {
        let Some(doc) = self.store.get(collections::SALES, id).await? else {
            return Ok(None);
        };
        Ok(Some(Versioned::new(doc.decode()?, doc.version)))
    }

    pub async fn update(
        &self,
        sale: &Sale,
        expected_version: Option<i64>,
    ) -> StoreResult<Versioned<Sale>> {
        let payload = serde_json::to_value(sale)?;
        let doc = self
            .store
            .update(collections::SALES, &sale.id, payload, expected_version)
            .await?;
        Ok(Versioned::new(doc.decode()?, doc.version))
    }

    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        self.store.remove(collections::SALES, id).await
    }

    /// Sales in a half-open time window, newest first, paginated.
    pub async fn between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StoreResult<Vec<Sale>> {
        let mut query = Query::new(collections::SALES)
            .filter(Filter::created_at_from(start))
            .filter(Filter::created_before(end))
            .order(SortOrder::CreatedAtDesc);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }

        let docs = self.store.find(&query).await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Oldest sales strictly before the cutoff, bounded. Retention feed.
    pub async fn older_than(&self, cutoff: DateTime<Utc>, limit: u32) -> StoreResult<Vec<Sale>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::SALES)
                    .filter(Filter::created_before(cutoff))
                    .order(SortOrder::CreatedAtAsc)
                    .limit(limit),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    // =========================================================================
    // Line Items
    // =========================================================================

    /// Creates a line document. `AlreadyExists` means a previous attempt of
    /// the same sale already wrote it.
    pub async fn insert_line(&self, line: &SaleLine) -> StoreResult<()> {
        let doc = NewDocument::encode(collections::SALE_ITEMS, &line.id, line, line.created_at)?;
        self.store.insert(doc).await?;
        Ok(())
    }

    /// All lines of a sale, in line order (created together; ids tiebreak).
    pub async fn lines_for(&self, sale_id: &str) -> StoreResult<Vec<SaleLine>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::SALE_ITEMS)
                    .filter(Filter::eq("sale_id", json!(sale_id)))
                    .order(SortOrder::CreatedAtAsc),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Deletes all lines of a sale. Returns how many went.
    pub async fn remove_lines(&self, sale_id: &str) -> StoreResult<u64> {
        let lines = self.lines_for(sale_id).await?;
        let ids: Vec<String> = lines.into_iter().map(|l| l.id).collect();
        self.store.remove_many(collections::SALE_ITEMS, &ids).await
    }

    /// Orphan sweep feed: line documents older than the cutoff, bounded.
    /// Catches children whose parent sale was deleted before a crash.
    pub async fn lines_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<SaleLine>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::SALE_ITEMS)
                    .filter(Filter::created_before(cutoff))
                    .order(SortOrder::CreatedAtAsc)
                    .limit(limit),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Removes specific line documents by id.
    pub async fn remove_lines_by_id(&self, ids: &[String]) -> StoreResult<u64> {
        self.store.remove_many(collections::SALE_ITEMS, ids).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Duration;
    use khata_core::money::Money;
    use khata_core::quantity::Quantity;
    use khata_core::types::PaymentMethod;

    fn sale(id: &str, age_days: i64) -> Sale {
        let ts = Utc::now() - Duration::days(age_days);
        Sale {
            id: id.to_string(),
            customer_id: None,
            customer_name: None,
            subtotal: Money::from_taka(100),
            discount: Money::zero(),
            total: Money::from_taka(100),
            paid: Money::from_taka(100),
            due: Money::zero(),
            due_accrued: false,
            profit: Money::from_taka(10),
            method: PaymentMethod::Cash,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn line(sale_id: &str, n: usize) -> SaleLine {
        SaleLine {
            id: format!("{sale_id}:{n}"),
            sale_id: sale_id.to_string(),
            product_id: format!("p{n}"),
            product_name: "Rice".to_string(),
            quantity: Quantity::from_whole(1),
            unit_price: Money::from_taka(80),
            unit_cost: Money::from_taka(70),
            created_at: Utc::now(),
        }
    }

    fn repo() -> SaleRepository {
        SaleRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_lines_roundtrip_and_cleanup() {
        let repo = repo();
        repo.insert(&sale("s1", 0)).await.unwrap();
        repo.insert_line(&line("s1", 0)).await.unwrap();
        repo.insert_line(&line("s1", 1)).await.unwrap();

        assert_eq!(repo.lines_for("s1").await.unwrap().len(), 2);
        assert_eq!(repo.remove_lines("s1").await.unwrap(), 2);
        assert!(repo.lines_for("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_line_id_signals_convergence() {
        let repo = repo();
        repo.insert_line(&line("s1", 0)).await.unwrap();
        let err = repo.insert_line(&line("s1", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_older_than_returns_oldest_first() {
        let repo = repo();
        repo.insert(&sale("recent", 1)).await.unwrap();
        repo.insert(&sale("older", 45)).await.unwrap();
        repo.insert(&sale("oldest", 60)).await.unwrap();

        let cutoff = Utc::now() - Duration::days(40);
        let stale = repo.older_than(cutoff, 10).await.unwrap();
        assert_eq!(
            stale.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["oldest", "older"]
        );
    }

    #[tokio::test]
    async fn test_between_window_is_half_open() {
        let repo = repo();
        repo.insert(&sale("in", 1)).await.unwrap();
        repo.insert(&sale("out", 5)).await.unwrap();

        let start = Utc::now() - Duration::days(2);
        let end = Utc::now();
        let found = repo.between(start, end, None, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "in");
    }
}
