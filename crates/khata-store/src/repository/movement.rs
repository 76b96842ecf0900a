//! # Stock Movement Repository
//!
//! The `stock_movements` collection: reservation markers keyed
//! `{sale_id}:{product_id}`.
//!
//! A marker is written BEFORE the stock decrement it describes. A retried
//! sale step that finds its marker already present knows the decrement was
//! applied (or is about to be by the attempt that won) and skips it.

use std::sync::Arc;

use khata_core::types::StockMovement;
use serde_json::json;
use tracing::debug;

use crate::document::{collections, Filter, NewDocument, Query, SortOrder};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct MovementRepository {
    store: Arc<dyn DocumentStore>,
}

impl MovementRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        MovementRepository { store }
    }

    /// Creates the marker if absent. Returns `true` when this call created
    /// it, `false` when it already existed (idempotent replay).
    pub async fn record(&self, movement: &StockMovement) -> StoreResult<bool> {
        let doc = NewDocument::encode(
            collections::STOCK_MOVEMENTS,
            &movement.id,
            movement,
            movement.created_at,
        )?;

        match self.store.insert(doc).await {
            Ok(_) => {
                debug!(marker = %movement.id, qty = %movement.quantity, "stock movement recorded");
                Ok(true)
            }
            Err(StoreError::AlreadyExists { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Writes a marker unconditionally, replacing an existing one. Sale
    /// edits use this to keep the marker's quantity equal to what the sale
    /// currently holds.
    pub async fn put(&self, movement: &StockMovement) -> StoreResult<()> {
        let doc = NewDocument::encode(
            collections::STOCK_MOVEMENTS,
            &movement.id,
            movement,
            movement.created_at,
        )?;

        match self.store.insert(doc).await {
            Ok(_) => Ok(()),
            Err(StoreError::AlreadyExists { .. }) => {
                let payload = serde_json::to_value(movement)?;
                self.store
                    .update(collections::STOCK_MOVEMENTS, &movement.id, payload, None)
                    .await?;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Fetches a marker by (sale, product).
    pub async fn get(&self, sale_id: &str, product_id: &str) -> StoreResult<Option<StockMovement>> {
        let id = StockMovement::marker_id(sale_id, product_id);
        let Some(doc) = self.store.get(collections::STOCK_MOVEMENTS, &id).await? else {
            return Ok(None);
        };
        Ok(Some(doc.decode()?))
    }

    /// All markers of one sale (delete-sale reversal walks these).
    pub async fn for_sale(&self, sale_id: &str) -> StoreResult<Vec<StockMovement>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::STOCK_MOVEMENTS)
                    .filter(Filter::eq("sale_id", json!(sale_id)))
                    .order(SortOrder::CreatedAtAsc),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Removes a marker. Idempotent.
    pub async fn remove(&self, sale_id: &str, product_id: &str) -> StoreResult<bool> {
        let id = StockMovement::marker_id(sale_id, product_id);
        self.store.remove(collections::STOCK_MOVEMENTS, &id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Utc;
    use khata_core::quantity::Quantity;

    fn marker(sale: &str, product: &str, qty: i64) -> StockMovement {
        StockMovement {
            id: StockMovement::marker_id(sale, product),
            sale_id: sale.to_string(),
            product_id: product.to_string(),
            quantity: Quantity::from_whole(qty),
            created_at: Utc::now(),
        }
    }

    fn repo() -> MovementRepository {
        MovementRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_record_is_create_if_absent() {
        let repo = repo();
        assert!(repo.record(&marker("s1", "p1", 2)).await.unwrap());
        assert!(!repo.record(&marker("s1", "p1", 2)).await.unwrap());

        let stored = repo.get("s1", "p1").await.unwrap().unwrap();
        assert_eq!(stored.quantity, Quantity::from_whole(2));
    }

    #[tokio::test]
    async fn test_for_sale_and_remove() {
        let repo = repo();
        repo.record(&marker("s1", "p1", 1)).await.unwrap();
        repo.record(&marker("s1", "p2", 3)).await.unwrap();
        repo.record(&marker("s2", "p1", 5)).await.unwrap();

        assert_eq!(repo.for_sale("s1").await.unwrap().len(), 2);
        assert!(repo.remove("s1", "p1").await.unwrap());
        assert!(!repo.remove("s1", "p1").await.unwrap());
        assert_eq!(repo.for_sale("s1").await.unwrap().len(), 1);
    }
}
