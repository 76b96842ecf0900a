//! # Settings Repository
//!
//! The `settings` collection, currently holding one document: the commission
//! rate table. The document is replaced wholesale so a concurrent reader
//! sees either the old table or the new one, never a mix.

use std::sync::Arc;

use khata_core::types::CommissionTable;
use tracing::{debug, info};

use crate::document::{collections, NewDocument};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;

/// Fixed id of the commission table singleton.
pub const COMMISSION_RATES_ID: &str = "commission_rates";

#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn DocumentStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        SettingsRepository { store }
    }

    /// The current commission table. Falls back to the shipped defaults
    /// when nothing has been configured yet.
    pub async fn commission_rates(&self) -> StoreResult<CommissionTable> {
        match self
            .store
            .get(collections::SETTINGS, COMMISSION_RATES_ID)
            .await?
        {
            Some(doc) => doc.decode(),
            None => {
                debug!("commission table unconfigured, using defaults");
                Ok(CommissionTable::default())
            }
        }
    }

    /// Replaces the commission table in one write (insert or full update).
    pub async fn set_commission_rates(&self, table: &CommissionTable) -> StoreResult<()> {
        let doc = NewDocument::encode(
            collections::SETTINGS,
            COMMISSION_RATES_ID,
            table,
            chrono::Utc::now(),
        )?;

        match self.store.insert(doc).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                let payload = serde_json::to_value(table)?;
                self.store
                    .update(collections::SETTINGS, COMMISSION_RATES_ID, payload, None)
                    .await?;
            }
            Err(other) => return Err(other),
        }

        info!(operators = table.operators.len(), "commission table replaced");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use khata_core::types::{OperatorRates, TxnKind};

    fn repo() -> SettingsRepository {
        SettingsRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_defaults_when_unconfigured() {
        let table = repo().commission_rates().await.unwrap();
        assert_eq!(table.rate_for("bkash", TxnKind::CashOut).bps(), 185);
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let repo = repo();

        let mut table = CommissionTable::default();
        table
            .operators
            .insert("upay".to_string(), OperatorRates::new(90, 170, 140));
        repo.set_commission_rates(&table).await.unwrap();

        let read = repo.commission_rates().await.unwrap();
        assert_eq!(read.rate_for("upay", TxnKind::CashIn).bps(), 90);

        // A second replacement drops the operator again
        repo.set_commission_rates(&CommissionTable::default())
            .await
            .unwrap();
        assert!(repo
            .commission_rates()
            .await
            .unwrap()
            .rate_for("upay", TxnKind::CashIn)
            .is_zero());
    }
}
