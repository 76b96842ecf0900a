//! # Payment Journal
//!
//! Append-only record of money received. One entry per settlement: the paid
//! part of a sale, or a manual due collection.
//!
//! Entries are never edited. The only removals are the delete-sale reversal
//! and the retention cascade, both of which go through [`remove_for_sale`].
//!
//! [`remove_for_sale`]: PaymentJournal::remove_for_sale

use chrono::Utc;
use khata_core::money::Money;
use khata_core::types::{Payment, PaymentMethod};
use khata_core::validation::validate_positive_amount;
use khata_store::{PaymentRepository, Store, StoreError};
use tracing::info;

use crate::error::LedgerResult;

// =============================================================================
// PaymentJournal
// =============================================================================

#[derive(Clone)]
pub struct PaymentJournal {
    payments: PaymentRepository,
}

impl PaymentJournal {
    pub fn new(store: &Store) -> Self {
        PaymentJournal {
            payments: store.payments(),
        }
    }

    /// Appends an entry with a fresh id. Manual due collections come
    /// through here with `sale_id = None`.
    pub async fn record(
        &self,
        customer_id: Option<&str>,
        sale_id: Option<&str>,
        amount: Money,
        method: PaymentMethod,
    ) -> LedgerResult<String> {
        let id = khata_core::types::new_id();
        self.record_with_id(&id, customer_id, sale_id, amount, method)
            .await?;
        Ok(id)
    }

    /// Appends an entry under a caller-chosen id.
    ///
    /// The coordinator uses the deterministic id `{sale_id}:payment` so a
    /// retried sale converges on one journal entry; `AlreadyExists` from a
    /// replay is swallowed here as success.
    pub async fn record_with_id(
        &self,
        id: &str,
        customer_id: Option<&str>,
        sale_id: Option<&str>,
        amount: Money,
        method: PaymentMethod,
    ) -> LedgerResult<bool> {
        validate_positive_amount("payment amount", amount)?;

        let payment = Payment {
            id: id.to_string(),
            customer_id: customer_id.map(String::from),
            sale_id: sale_id.map(String::from),
            amount,
            method,
            created_at: Utc::now(),
        };

        match self.payments.insert(&payment).await {
            Ok(()) => {
                info!(payment_id = %payment.id, amount = %amount, "payment journaled");
                Ok(true)
            }
            Err(StoreError::AlreadyExists { .. }) => Ok(false),
            Err(other) => Err(other.into()),
        }
    }

    /// A customer's payments, newest first, paginated and restartable.
    pub async fn list_by_customer(
        &self,
        customer_id: &str,
        limit: u32,
        offset: u32,
    ) -> LedgerResult<Vec<Payment>> {
        Ok(self
            .payments
            .list_by_customer(customer_id, limit, offset)
            .await?)
    }

    /// All payments linked to one sale.
    pub async fn payments_for_sale(&self, sale_id: &str) -> LedgerResult<Vec<Payment>> {
        Ok(self.payments.for_sale(sale_id).await?)
    }

    /// Removes every payment linked to a sale (reversal / retention).
    /// Returns how many went.
    pub async fn remove_for_sale(&self, sale_id: &str) -> LedgerResult<u64> {
        let linked = self.payments.for_sale(sale_id).await?;
        let ids: Vec<String> = linked.into_iter().map(|p| p.id).collect();
        Ok(self.payments.remove_many(&ids).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
