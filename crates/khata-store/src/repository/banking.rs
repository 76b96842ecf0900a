//! # Banking Repository
//!
//! The `mobile_banking_logs` collection: the append-only balance chain.
//!
//! The repository only reads and appends; the chain invariant (each entry's
//! balance derived from its predecessor) is enforced by the ledger's single
//! writer lane, not here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use khata_core::types::MobileBankingTransaction;
use tracing::debug;

use crate::document::{collections, Filter, NewDocument, Query, SortOrder};
use crate::error::StoreResult;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct BankingRepository {
    store: Arc<dyn DocumentStore>,
}

impl BankingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        BankingRepository { store }
    }

    /// Appends one chain entry.
    pub async fn insert(&self, txn: &MobileBankingTransaction) -> StoreResult<()> {
        let doc = NewDocument::encode(collections::MOBILE_BANKING, &txn.id, txn, txn.created_at)?;
        self.store.insert(doc).await?;
        debug!(
            txn_id = %txn.id,
            kind = txn.kind.as_str(),
            operator = %txn.operator,
            balance_after = %txn.balance_after,
            "banking transaction appended"
        );
        Ok(())
    }

    /// The chain head: newest entry, `None` when the chain is empty.
    pub async fn latest(&self) -> StoreResult<Option<MobileBankingTransaction>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::MOBILE_BANKING)
                    .order(SortOrder::CreatedAtDesc)
                    .limit(1),
            )
            .await?;
        docs.first().map(|d| d.decode()).transpose()
    }

    /// History, newest first, paginated.
    pub async fn history(&self, limit: u32, offset: u32) -> StoreResult<Vec<MobileBankingTransaction>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::MOBILE_BANKING)
                    .order(SortOrder::CreatedAtDesc)
                    .limit(limit)
                    .offset(offset),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Entries in a half-open time window, oldest first. Report feed.
    pub async fn between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<MobileBankingTransaction>> {
        let docs = self
            .store
            .find(
                &Query::new(collections::MOBILE_BANKING)
                    .filter(Filter::created_at_from(start))
                    .filter(Filter::created_before(end))
                    .order(SortOrder::CreatedAtAsc),
            )
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// The whole chain in creation order. Chain verification walks this.
    pub async fn all_in_order(&self) -> StoreResult<Vec<MobileBankingTransaction>> {
        let docs = self
            .store
            .find(&Query::new(collections::MOBILE_BANKING).order(SortOrder::CreatedAtAsc))
            .await?;
        docs.iter().map(|d| d.decode()).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
