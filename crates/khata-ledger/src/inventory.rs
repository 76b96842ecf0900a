//! # Inventory Ledger
//!
//! Stock mutations on the product aggregate.
//!
//! ## Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two sales hit the same product:                                        │
//! │                                                                         │
//! │  A: read stock=5 (v3)          B: read stock=5 (v3)                     │
//! │  A: write stock=3 (CAS v3) ✓   B: write stock=4 (CAS v3) ✗ conflict    │
//! │                                B: re-read stock=3 (v4)                  │
//! │                                B: write stock=2 (CAS v4) ✓              │
//! │                                                                         │
//! │  Per-product serialization comes from version conflicts, not locks.    │
//! │  Lost races retry up to the policy bound, then surface Conflict.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Oversell
//! Reserving more than the shelf holds floors the stock at zero instead of
//! rejecting the sale. The counter is the source of truth: if the goods
//! moved, the sale happened; the book count was simply wrong.

use chrono::Utc;
use khata_core::quantity::Quantity;
use khata_core::types::StockMovement;
use khata_store::{MovementRepository, ProductRepository, Store, StoreError};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::retry::RetryPolicy;

// =============================================================================
// InventoryLedger
// =============================================================================

#[derive(Clone)]
pub struct InventoryLedger {
    products: ProductRepository,
    movements: MovementRepository,
    retry: RetryPolicy,
}

impl InventoryLedger {
    pub fn new(store: &Store, retry: RetryPolicy) -> Self {
        InventoryLedger {
            products: store.products(),
            movements: store.movements(),
            retry,
        }
    }

    /// Decrements stock by `qty`, clamped at zero. Returns the new stock.
    pub async fn reserve(&self, product_id: &str, qty: Quantity) -> LedgerResult<Quantity> {
        self.mutate(product_id, |stock| stock.reserve(qty)).await
    }

    /// Increments stock by `qty` (edit/delete reversal). Returns new stock.
    pub async fn restore(&self, product_id: &str, qty: Quantity) -> LedgerResult<Quantity> {
        self.mutate(product_id, |stock| stock + qty).await
    }

    /// Applies a signed delta: positive reserves, negative restores.
    pub async fn apply_delta(&self, product_id: &str, delta: Quantity) -> LedgerResult<Quantity> {
        if delta.is_positive() {
            self.reserve(product_id, delta).await
        } else if delta.is_negative() {
            self.restore(product_id, -delta).await
        } else {
            Ok(self
                .products
                .get(product_id)
                .await
                .map_err(|e| LedgerError::from_store("product", e))?
                .value
                .stock)
        }
    }

    /// Sets the stock to an absolute level (manual correction).
    pub async fn adjust(&self, product_id: &str, new_stock: Quantity) -> LedgerResult<Quantity> {
        if new_stock.is_negative() {
            return Err(khata_core::error::ValidationError::MustBeNonNegative {
                field: "stock".to_string(),
            }
            .into());
        }
        info!(product_id, new_stock = %new_stock, "manual stock adjustment");
        self.mutate(product_id, |_| new_stock).await
    }

    /// Sale-keyed reservation, applied at most once per (sale, product).
    ///
    /// The marker document is written FIRST (create-if-absent). When the
    /// marker already exists a previous attempt owns the decrement and this
    /// call skips it. If the decrement then fails, the marker is removed
    /// best-effort so a later retry can reapply.
    ///
    /// Returns whether this call applied the decrement.
    pub async fn reserve_for_sale(
        &self,
        sale_id: &str,
        product_id: &str,
        qty: Quantity,
    ) -> LedgerResult<bool> {
        let marker = StockMovement {
            id: StockMovement::marker_id(sale_id, product_id),
            sale_id: sale_id.to_string(),
            product_id: product_id.to_string(),
            quantity: qty,
            created_at: Utc::now(),
        };

        if !self.movements.record(&marker).await? {
            debug!(sale_id, product_id, "stock already reserved, skipping");
            return Ok(false);
        }

        match self.reserve(product_id, qty).await {
            Ok(_) => Ok(true),
            Err(err) => {
                // Undo the claim so a retry is not permanently skipped
                if let Err(cleanup) = self.movements.remove(sale_id, product_id).await {
                    warn!(
                        sale_id,
                        product_id,
                        error = %cleanup,
                        "failed to remove stock marker after failed reserve"
                    );
                }
                Err(err)
            }
        }
    }

    /// Makes the (sale, product) marker reflect the quantity the sale now
    /// holds. Zero or negative removes the marker. Sale edits call this
    /// after applying the stock delta, so a later delete restores the
    /// edited quantity, not the original one.
    pub async fn sync_sale_marker(
        &self,
        sale_id: &str,
        product_id: &str,
        qty: Quantity,
    ) -> LedgerResult<()> {
        if qty.is_positive() {
            self.movements
                .put(&StockMovement {
                    id: StockMovement::marker_id(sale_id, product_id),
                    sale_id: sale_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity: qty,
                    created_at: Utc::now(),
                })
                .await?;
        } else {
            self.movements.remove(sale_id, product_id).await?;
        }
        Ok(())
    }

    /// Reverses every reservation of a sale, marker by marker. Returns how
    /// many were restored. Idempotent: each marker is removed after its
    /// restore lands, so a rerun only sees what is left.
    pub async fn restore_for_sale(&self, sale_id: &str) -> LedgerResult<u32> {
        let markers = self.movements.for_sale(sale_id).await?;
        let mut restored = 0;

        for marker in markers {
            match self.restore(&marker.product_id, marker.quantity).await {
                Ok(_) | Err(LedgerError::NotFound { .. }) => {
                    // A deleted product has no stock left to restore to
                }
                Err(other) => return Err(other),
            }
            self.movements.remove(sale_id, &marker.product_id).await?;
            restored += 1;
        }

        Ok(restored)
    }

    /// CAS read-modify-write with bounded retry.
    async fn mutate(
        &self,
        product_id: &str,
        f: impl Fn(Quantity) -> Quantity,
    ) -> LedgerResult<Quantity> {
        for attempt in 1..=self.retry.max_attempts {
            let mut versioned = self
                .products
                .get(product_id)
                .await
                .map_err(|e| LedgerError::from_store("product", e))?;

            let new_stock = f(versioned.value.stock);
            versioned.value.stock = new_stock;
            versioned.value.updated_at = Utc::now();

            match self
                .products
                .update(&versioned.value, Some(versioned.version))
                .await
            {
                Ok(_) => {
                    debug!(product_id, stock = %new_stock, "stock updated");
                    return Ok(new_stock);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(product_id, attempt, "stock write lost race, retrying");
                    self.retry.wait(attempt).await;
                }
                Err(other) => return Err(LedgerError::from_store("product", other)),
            }
        }

        Err(LedgerError::Conflict {
            entity: "product",
            id: product_id.to_string(),
            attempts: self.retry.max_attempts,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use khata_core::money::Money;
    use khata_core::types::Product;

    async fn store_with_product(id: &str, stock: i64) -> Store {
        let store = Store::memory();
        store
            .products()
            .insert(&Product {
                id: id.to_string(),
                name: "Rice".to_string(),
                buy_price: Money::from_taka(70),
                sell_price: Money::from_taka(80),
                stock: Quantity::from_whole(stock),
                low_stock_threshold: Quantity::from_whole(5),
                unit: "kg".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn ledger(store: &Store) -> InventoryLedger {
        InventoryLedger::new(store, RetryPolicy::immediate(5))
    }

    #[tokio::test]
    async fn test_reserve_and_restore() {
        let store = store_with_product("p1", 10).await;
        let inv = ledger(&store);

        assert_eq!(inv.reserve("p1", Quantity::from_whole(3)).await.unwrap(), Quantity::from_whole(7));
        assert_eq!(inv.restore("p1", Quantity::from_whole(2)).await.unwrap(), Quantity::from_whole(9));
    }

    #[tokio::test]
    async fn test_oversell_clamps_at_zero() {
        let store = store_with_product("p1", 2).await;
        let inv = ledger(&store);

        let stock = inv.reserve("p1", Quantity::from_whole(5)).await.unwrap();
        assert_eq!(stock, Quantity::zero());
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let store = Store::memory();
        let err = ledger(&store)
            .reserve("ghost", Quantity::from_whole(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn test_reserve_for_sale_applies_once() {
        let store = store_with_product("p1", 10).await;
        let inv = ledger(&store);

        assert!(inv.reserve_for_sale("s1", "p1", Quantity::from_whole(4)).await.unwrap());
        // Retry of the same step is a no-op
        assert!(!inv.reserve_for_sale("s1", "p1", Quantity::from_whole(4)).await.unwrap());

        let stock = store.products().get("p1").await.unwrap().value.stock;
        assert_eq!(stock, Quantity::from_whole(6));
    }

    #[tokio::test]
    async fn test_restore_for_sale_reverses_markers() {
        let store = store_with_product("p1", 10).await;
        let inv = ledger(&store);

        inv.reserve_for_sale("s1", "p1", Quantity::from_whole(4)).await.unwrap();
        assert_eq!(inv.restore_for_sale("s1").await.unwrap(), 1);

        let stock = store.products().get("p1").await.unwrap().value.stock;
        assert_eq!(stock, Quantity::from_whole(10));

        // Second reversal finds no markers
        assert_eq!(inv.restore_for_sale("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_reserve_releases_marker() {
        let store = Store::memory(); // no product
        let inv = ledger(&store);

        let err = inv
            .reserve_for_sale("s1", "ghost", Quantity::from_whole(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        // Marker was rolled back, so nothing to reverse
        assert!(store.movements().get("s1", "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_reserves_lose_no_update() {
        let store = store_with_product("p1", 100).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let inv = InventoryLedger::new(&store, RetryPolicy::immediate(50));
            handles.push(tokio::spawn(async move {
                inv.reserve("p1", Quantity::from_whole(1)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stock = store.products().get("p1").await.unwrap().value.stock;
        assert_eq!(stock, Quantity::from_whole(90));
    }

    #[tokio::test]
    async fn test_adjust_sets_absolute_level() {
        let store = store_with_product("p1", 3).await;
        let inv = ledger(&store);

        assert_eq!(
            inv.adjust("p1", Quantity::from_whole(50)).await.unwrap(),
            Quantity::from_whole(50)
        );
        assert!(inv.adjust("p1", Quantity::from_whole(-1)).await.is_err());
    }
}
