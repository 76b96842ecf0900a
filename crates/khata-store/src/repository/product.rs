//! # Product Repository
//!
//! CRUD over the `products` collection. Stock mutations go through versioned
//! updates; the inventory ledger above retries lost races.

use std::sync::Arc;

use khata_core::types::Product;
use tracing::debug;

use crate::document::{collections, NewDocument, Query, SortOrder, Versioned};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        ProductRepository { store }
    }

    /// Creates a product document.
    pub async fn insert(&self, product: &Product) -> StoreResult<()> {
        let doc = NewDocument::encode(
            collections::PRODUCTS,
            &product.id,
            product,
            product.created_at,
        )?;
        self.store.insert(doc).await?;
        debug!(product_id = %product.id, name = %product.name, "product created");
        Ok(())
    }

    /// Fetches a product with its CAS version. `NotFound` when absent.
    pub async fn get(&self, id: &str) -> StoreResult<Versioned<Product>> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(collections::PRODUCTS, id))
    }

    /// Fetches a product, `None` when absent.
    pub async fn try_get(&self, id: &str) -> StoreResult<Option<Versioned<Product>>> {
        let Some(doc) = self.store.get(collections::PRODUCTS, id).await? else {
            return Ok(None);
        };
        Ok(Some(Versioned::new(doc.decode()?, doc.version)))
    }

    /// Writes a product back. With `expected_version` this is the CAS write
    /// stock mutations depend on.
    pub async fn update(
        &self,
        product: &Product,
        expected_version: Option<i64>,
    ) -> StoreResult<Versioned<Product>> {
        let payload = serde_json::to_value(product)?;
        let doc = self
            .store
            .update(collections::PRODUCTS, &product.id, payload, expected_version)
            .await?;
        Ok(Versioned::new(doc.decode()?, doc.version))
    }

    /// All products, oldest first. Reports re-sort as needed.
    pub async fn all(&self) -> StoreResult<Vec<Product>> {
        let docs = self
            .store
            .find(&Query::new(collections::PRODUCTS).order(SortOrder::CreatedAtAsc))
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Deletes a product. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        self.store.remove(collections::PRODUCTS, id).await
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
    use khata_core::money::Money;
    use khata_core::quantity::Quantity;

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            buy_price: Money::from_taka(70),
            sell_price: Money::from_taka(80),
            stock: Quantity::from_whole(stock),
            low_stock_threshold: Quantity::from_whole(5),
            unit: "kg".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn repo() -> ProductRepository {
        ProductRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let repo = repo();
        repo.insert(&product("p1", 10)).await.unwrap();

        let mut fetched = repo.get("p1").await.unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.value.stock, Quantity::from_whole(10));

        fetched.value.stock = Quantity::from_whole(8);
        let updated = repo.update(&fetched.value, Some(fetched.version)).await.unwrap();
        assert_eq!(updated.version, 2);

        // Stale version now conflicts
        let err = repo.update(&fetched.value, Some(1)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = repo().get("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_all_lists_everything() {
        let repo = repo();
        repo.insert(&product("p1", 10)).await.unwrap();
        repo.insert(&product("p2", 3)).await.unwrap();
        assert_eq!(repo.all().await.unwrap().len(), 2);
    }
}
