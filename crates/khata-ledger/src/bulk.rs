//! # Bulk Import / Export
//!
//! Batch loading of customers and products, and full-list export for an
//! external renderer.
//!
//! Import is per-record: a record missing its required fields is skipped
//! and counted, never fatal to the rest of the batch. A shop migrating a
//! hand-kept register should not lose 400 good rows to one bad one.

use chrono::Utc;
use khata_core::money::Money;
use khata_core::quantity::Quantity;
use khata_core::types::{new_id, Customer, Product};
use khata_core::validation::{validate_name, validate_text};
use khata_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LedgerResult;

// =============================================================================
// Record Types
// =============================================================================

/// One incoming customer row. Only `name` is required.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CustomerRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Carried-over due from the old register, in poisha.
    #[serde(default)]
    pub total_due: Money,
}

/// One incoming product row. `name` and `unit` are required.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProductRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub buy_price: Money,
    #[serde(default)]
    pub sell_price: Money,
    #[serde(default)]
    pub stock: Quantity,
    #[serde(default)]
    pub low_stock_threshold: Quantity,
    #[serde(default)]
    pub unit: String,
}

/// What a batch import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOutcome {
    pub imported: u32,
    pub skipped: u32,
}

// =============================================================================
// BulkPort
// =============================================================================

#[derive(Clone)]
pub struct BulkPort {
    store: Store,
}

impl BulkPort {
    pub fn new(store: Store) -> Self {
        BulkPort { store }
    }

    /// Imports customers. Invalid records are skipped and counted.
    pub async fn import_customers(&self, records: &[CustomerRecord]) -> LedgerResult<ImportOutcome> {
        let mut outcome = ImportOutcome::default();

        for (row, record) in records.iter().enumerate() {
            if let Err(reason) = validate_customer_record(record) {
                warn!(row, %reason, "skipping customer record");
                outcome.skipped += 1;
                continue;
            }

            let now = Utc::now();
            self.store
                .customers()
                .insert(&Customer {
                    id: new_id(),
                    name: record.name.trim().to_string(),
                    phone: record.phone.clone(),
                    address: record.address.clone(),
                    notes: record.notes.clone(),
                    total_due: record.total_due.clamped_non_negative(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            outcome.imported += 1;
        }

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            "customer import finished"
        );
        Ok(outcome)
    }

    /// Imports products. Invalid records are skipped and counted.
    pub async fn import_products(&self, records: &[ProductRecord]) -> LedgerResult<ImportOutcome> {
        let mut outcome = ImportOutcome::default();

        for (row, record) in records.iter().enumerate() {
            if let Err(reason) = validate_product_record(record) {
                warn!(row, %reason, "skipping product record");
                outcome.skipped += 1;
                continue;
            }

            let now = Utc::now();
            self.store
                .products()
                .insert(&Product {
                    id: new_id(),
                    name: record.name.trim().to_string(),
                    buy_price: record.buy_price,
                    sell_price: record.sell_price,
                    stock: record.stock.clamped_non_negative(),
                    low_stock_threshold: record.low_stock_threshold.clamped_non_negative(),
                    unit: record.unit.trim().to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            outcome.imported += 1;
        }

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            "product import finished"
        );
        Ok(outcome)
    }

    /// Every customer, for an external renderer.
    pub async fn export_customers(&self) -> LedgerResult<Vec<Customer>> {
        Ok(self.store.customers().all().await?)
    }

    /// Every product, for an external renderer.
    pub async fn export_products(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.store.products().all().await?)
    }
}

fn validate_customer_record(record: &CustomerRecord) -> Result<(), khata_core::error::ValidationError> {
    validate_name(&record.name)?;
    if let Some(phone) = &record.phone {
        validate_text("phone", phone)?;
    }
    if let Some(address) = &record.address {
        validate_text("address", address)?;
    }
    Ok(())
}

fn validate_product_record(record: &ProductRecord) -> Result<(), khata_core::error::ValidationError> {
    validate_name(&record.name)?;
    if record.unit.trim().is_empty() {
        return Err(khata_core::error::ValidationError::Required {
            field: "unit".to_string(),
        });
    }
    if record.sell_price.is_negative() || record.buy_price.is_negative() {
        return Err(khata_core::error::ValidationError::MustBeNonNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_rows_skipped_good_rows_land() {
        let store = Store::memory();
        let bulk = BulkPort::new(store.clone());

        let records = vec![
            CustomerRecord {
                name: "Rahim".to_string(),
                total_due: Money::from_taka(120),
                ..CustomerRecord::default()
            },
            CustomerRecord::default(), // no name
            CustomerRecord {
                name: "Karim".to_string(),
                phone: Some("01711000000".to_string()),
                ..CustomerRecord::default()
            },
        ];

        let outcome = bulk.import_customers(&records).await.unwrap();
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(bulk.export_customers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_product_unit_required() {
        let store = Store::memory();
        let bulk = BulkPort::new(store);

        let records = vec![
            ProductRecord {
                name: "Rice".to_string(),
                unit: "kg".to_string(),
                buy_price: Money::from_taka(70),
                sell_price: Money::from_taka(80),
                stock: Quantity::from_whole(50),
                ..ProductRecord::default()
            },
            ProductRecord {
                name: "No Unit".to_string(),
                ..ProductRecord::default()
            },
        ];

        let outcome = bulk.import_products(&records).await.unwrap();
        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_negative_carryover_due_clamped() {
        let store = Store::memory();
        let bulk = BulkPort::new(store.clone());

        bulk.import_customers(&[CustomerRecord {
            name: "Salma".to_string(),
            total_due: Money::from_taka(-10),
            ..CustomerRecord::default()
        }])
        .await
        .unwrap();

        let exported = bulk.export_customers().await.unwrap();
        assert_eq!(exported[0].total_due, Money::zero());
    }
}
