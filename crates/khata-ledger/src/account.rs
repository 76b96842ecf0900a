//! # Customer Account
//!
//! Due-balance mutations on the customer aggregate.
//!
//! ## The Due Laws
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  accrue_due(amount)   due += amount     (no-op when amount ≤ 0)         │
//! │  reduce_due(amount)   due = max(0, due − amount)                        │
//! │                                                                         │
//! │  The stored balance NEVER goes negative. When a payment exceeds the    │
//! │  due, the excess is returned to the caller — realised as change or     │
//! │  profit there, never stored as credit-in-reverse.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Same optimistic-CAS discipline as stock: concurrent accruals on one
//! customer retry until both land, so no update is lost.

use chrono::Utc;
use khata_core::money::Money;
use khata_store::{CustomerRepository, Store, StoreError};
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::retry::RetryPolicy;

/// Outcome of a due reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueReduction {
    /// The balance after the reduction.
    pub new_due: Money,
    /// The part of the payment that exceeded the due. Zero when the payment
    /// fit; the caller decides what the excess means.
    pub excess: Money,
}

// =============================================================================
// CustomerAccount
// =============================================================================

#[derive(Clone)]
pub struct CustomerAccount {
    customers: CustomerRepository,
    retry: RetryPolicy,
}

impl CustomerAccount {
    pub fn new(store: &Store, retry: RetryPolicy) -> Self {
        CustomerAccount {
            customers: store.customers(),
            retry,
        }
    }

    /// Adds to the customer's due. Amounts ≤ 0 are a no-op, by design: the
    /// coordinator calls this unconditionally with whatever due a sale has.
    pub async fn accrue_due(&self, customer_id: &str, amount: Money) -> LedgerResult<Money> {
        if !amount.is_positive() {
            return Ok(self.current_due(customer_id).await?);
        }

        let (_, new_due) = self.mutate(customer_id, |due| due + amount).await?;
        debug!(customer_id, amount = %amount, new_due = %new_due, "due accrued");
        Ok(new_due)
    }

    /// Subtracts from the customer's due, floored at zero. Returns the new
    /// balance and any excess.
    pub async fn reduce_due(&self, customer_id: &str, amount: Money) -> LedgerResult<DueReduction> {
        if !amount.is_positive() {
            let due = self.current_due(customer_id).await?;
            return Ok(DueReduction {
                new_due: due,
                excess: Money::zero(),
            });
        }

        let (old_due, new_due) = self
            .mutate(customer_id, |due| (due - amount).clamped_non_negative())
            .await?;

        // What the balance actually absorbed is old − new; the rest of the
        // payment is excess
        let excess = (amount - (old_due - new_due)).clamped_non_negative();
        debug!(customer_id, amount = %amount, new_due = %new_due, excess = %excess, "due reduced");
        Ok(DueReduction { new_due, excess })
    }

    /// The customer's current due.
    pub async fn current_due(&self, customer_id: &str) -> LedgerResult<Money> {
        Ok(self
            .customers
            .get(customer_id)
            .await
            .map_err(|e| LedgerError::from_store("customer", e))?
            .value
            .total_due)
    }

    /// CAS read-modify-write. Returns (old due, new due) as of the write
    /// that actually landed.
    async fn mutate(
        &self,
        customer_id: &str,
        f: impl Fn(Money) -> Money,
    ) -> LedgerResult<(Money, Money)> {
        for attempt in 1..=self.retry.max_attempts {
            let mut versioned = self
                .customers
                .get(customer_id)
                .await
                .map_err(|e| LedgerError::from_store("customer", e))?;

            let old_due = versioned.value.total_due;
            let new_due = f(old_due);
            versioned.value.total_due = new_due;
            versioned.value.updated_at = Utc::now();

            match self
                .customers
                .update(&versioned.value, Some(versioned.version))
                .await
            {
                Ok(_) => return Ok((old_due, new_due)),
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(customer_id, attempt, "due write lost race, retrying");
                    self.retry.wait(attempt).await;
                }
                Err(other) => return Err(LedgerError::from_store("customer", other)),
            }
        }

        Err(LedgerError::Conflict {
            entity: "customer",
            id: customer_id.to_string(),
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
    use khata_core::types::Customer;

    async fn store_with_customer(id: &str, due: i64) -> Store {
        let store = Store::memory();
        store
            .customers()
            .insert(&Customer {
                id: id.to_string(),
                name: "Karim".to_string(),
                phone: None,
                address: None,
                notes: None,
                total_due: Money::from_taka(due),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn account(store: &Store) -> CustomerAccount {
        CustomerAccount::new(store, RetryPolicy::immediate(5))
    }

    #[tokio::test]
    async fn test_accrue_and_reduce() {
        let store = store_with_customer("c1", 0).await;
        let acct = account(&store);

        assert_eq!(acct.accrue_due("c1", Money::from_taka(120)).await.unwrap(), Money::from_taka(120));

        let reduction = acct.reduce_due("c1", Money::from_taka(50)).await.unwrap();
        assert_eq!(reduction.new_due, Money::from_taka(70));
        assert_eq!(reduction.excess, Money::zero());
    }

    #[tokio::test]
    async fn test_overpayment_floors_at_zero_and_reports_excess() {
        let store = store_with_customer("c1", 40).await;
        let acct = account(&store);

        let reduction = acct.reduce_due("c1", Money::from_taka(100)).await.unwrap();
        assert_eq!(reduction.new_due, Money::zero());
        assert_eq!(reduction.excess, Money::from_taka(60));
    }

    #[tokio::test]
    async fn test_non_positive_accrual_is_noop() {
        let store = store_with_customer("c1", 30).await;
        let acct = account(&store);

        assert_eq!(acct.accrue_due("c1", Money::zero()).await.unwrap(), Money::from_taka(30));
        assert_eq!(
            acct.accrue_due("c1", Money::from_taka(-10)).await.unwrap(),
            Money::from_taka(30)
        );
    }

    #[tokio::test]
    async fn test_missing_customer_is_not_found() {
        let store = Store::memory();
        let err = account(&store)
            .accrue_due("ghost", Money::from_taka(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "customer", .. }));
    }

    #[tokio::test]
    async fn test_concurrent_accruals_lose_nothing() {
        let store = store_with_customer("c1", 0).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let acct = CustomerAccount::new(&store, RetryPolicy::immediate(50));
            handles.push(tokio::spawn(async move {
                acct.accrue_due("c1", Money::from_taka(10)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let due = account(&store).current_due("c1").await.unwrap();
        assert_eq!(due, Money::from_taka(100));
    }
}
