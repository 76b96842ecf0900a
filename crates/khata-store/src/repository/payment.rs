//! # Payment Repository
//!
//! The append-only `payments` journal. Entries are never edited; removal
//! happens only through sale-delete reversal and the retention cascade.

use std::sync::Arc;

use khata_core::types::Payment;
use serde_json::json;
use tracing::debug;

use crate::document::{collections, Filter, NewDocument, Query, SortOrder};
use crate::error::StoreResult;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct PaymentRepository {
    store: Arc<dyn DocumentStore>,
}

impl PaymentRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PaymentRepository { store }
    }

    /// Appends a journal entry. `AlreadyExists` on the deterministic
    /// `{sale_id}:payment` id means a retried sale already recorded it.
    pub async fn insert(&self, payment: &Payment) -> StoreResult<()> {
        let doc = NewDocument::encode(
            collections::PAYMENTS,
            &payment.id,
            payment,
            payment.created_at,
        )?;
        self.store.insert(doc).await?;
        debug!(
            payment_id = %payment.id,
            amount = %payment.amount,
            "payment recorded"
        );
        Ok(())
    }

    /// A customer's payment history, newest first, paginated.
    ///
    /// Restartable: the same (limit, offset) against unchanged data returns
    /// the same page.
    pub async fn list_by_customer(
        &self,
        customer_id: &str,
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<Payment>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::PAYMENTS)
                    .filter(Filter::eq("customer_id", json!(customer_id)))
                    .order(SortOrder::CreatedAtDesc)
                    .limit(limit)
                    .offset(offset),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Every payment linked to one sale (reversal and retention cascade).
    pub async fn for_sale(&self, sale_id: &str) -> StoreResult<Vec<Payment>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::PAYMENTS)
                    .filter(Filter::eq("sale_id", json!(sale_id)))
                    .order(SortOrder::CreatedAtAsc),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Best-effort batched delete.
    pub async fn remove_many(&self, ids: &[String]) -> StoreResult<u64> {
        self.store.remove_many(collections::PAYMENTS, ids).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
