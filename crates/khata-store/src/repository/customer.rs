//! # Customer Repository
//!
//! CRUD over the `customers` collection. `total_due` mutations go through
//! versioned updates, same discipline as product stock.

use std::sync::Arc;

use khata_core::types::Customer;
use serde_json::json;
use tracing::debug;

use crate::document::{collections, Filter, NewDocument, Query, SortOrder, Versioned};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct CustomerRepository {
    store: Arc<dyn DocumentStore>,
}

impl CustomerRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        CustomerRepository { store }
    }

    pub async fn insert(&self, customer: &Customer) -> StoreResult<()> {
        let doc = NewDocument::encode(
            collections::CUSTOMERS,
            &customer.id,
            customer,
            customer.created_at,
        )?;
        self.store.insert(doc).await?;
        debug!(customer_id = %customer.id, name = %customer.name, "customer created");
        Ok(())
    }

    /// Fetches a customer with its CAS version. `NotFound` when absent.
    pub async fn get(&self, id: &str) -> StoreResult<Versioned<Customer>> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(collections::CUSTOMERS, id))
    }

    pub async fn try_get(&self, id: &str) -> StoreResult<Option<Versioned<Customer>>> {
        let Some(doc) = self.store.get(collections::CUSTOMERS, id).await? else {
            return Ok(None);
        };
        Ok(Some(Versioned::new(doc.decode()?, doc.version)))
    }

    pub async fn update(
        &self,
        customer: &Customer,
        expected_version: Option<i64>,
    ) -> StoreResult<Versioned<Customer>> {
        let payload = serde_json::to_value(customer)?;
        let doc = self
            .store
            .update(
                collections::CUSTOMERS,
                &customer.id,
                payload,
                expected_version,
            )
            .await?;
        Ok(Versioned::new(doc.decode()?, doc.version))
    }

    pub async fn all(&self) -> StoreResult<Vec<Customer>> {
        let docs = self
            .store
            .find(&Query::new(collections::CUSTOMERS).order(SortOrder::CreatedAtAsc))
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Customers with a positive due balance. Unsorted; the due summary
    /// report orders by amount.
    pub async fn with_due(&self) -> StoreResult<Vec<Customer>> {
        let docs = self
            .store
            .find(&Query::new(collections::CUSTOMERS).filter(Filter::gt("total_due", json!(0))))
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        self.store.remove(collections::CUSTOMERS, id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
