//! # Khata Ledger
//!
//! The consistency core of the shop ledger: keeps inventory, customer
//! dues, the payment journal and the mobile-banking balance chain mutually
//! consistent over a document store with no cross-record transactions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            khata-ledger                                 │
//! │                                                                         │
//! │  ┌────────────────────┐   coordinates    ┌──────────────────────────┐  │
//! │  │ TransactionCoord.  │─────────────────▶│ InventoryLedger (stock)  │  │
//! │  │  record_sale       │                  │ CustomerAccount (dues)   │  │
//! │  │  edit_sale         │                  │ PaymentJournal           │  │
//! │  │  collect_payment   │                  └──────────────────────────┘  │
//! │  │  delete_sale       │                                                │
//! │  └────────────────────┘   ┌──────────────────────┐  ┌───────────────┐  │
//! │                           │ MobileBankingLedger  │  │ ReportAggr.   │  │
//! │  ┌────────────────────┐   │  (balance chain)     │  │ (pure reads)  │  │
//! │  │ RetentionCleaner   │   └──────────────────────┘  └───────────────┘  │
//! │  │  (40-day window)   │   ┌──────────────────────┐  ┌───────────────┐  │
//! │  └────────────────────┘   │ CommissionSettings   │  │ BulkPort      │  │
//! │                           └──────────────────────┘  └───────────────┘  │
//! │                                                                         │
//! │                        ┌───────────────────┐                            │
//! │                        │   khata-store     │  one document at a time;   │
//! │                        │ (SQLite / memory) │  no multi-doc atomicity    │
//! │                        └───────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Model
//! - Per-product and per-customer writes serialize through optimistic CAS
//!   with bounded retry ([`RetryPolicy`]).
//! - Mobile-banking appends serialize through a single writer lane.
//! - Multi-document sale operations run as idempotent, sale-id-keyed steps;
//!   a midway failure surfaces [`LedgerError::PartialFailure`] and a retry
//!   of the same sale id converges without double effects.

pub mod account;
pub mod banking;
pub mod bulk;
pub mod coordinator;
pub mod error;
pub mod inventory;
pub mod journal;
pub mod reports;
pub mod retention;
pub mod retry;
pub mod settings;

pub use account::{CustomerAccount, DueReduction};
pub use banking::{ChainBreak, MobileBankingLedger};
pub use bulk::{BulkPort, CustomerRecord, ImportOutcome, ProductRecord};
pub use coordinator::TransactionCoordinator;
pub use error::{LedgerError, LedgerResult, SaleStep};
pub use inventory::InventoryLedger;
pub use journal::PaymentJournal;
pub use reports::{
    BankingSummary, DueEntry, PeriodReport, ReportAggregator, SalesSummary, StockEntry,
};
pub use retention::{CleanupStats, RetentionCleaner, RetentionConfig};
pub use retry::RetryPolicy;
pub use settings::CommissionSettings;

use khata_store::Store;

// =============================================================================
// Ledger Facade
// =============================================================================

/// One handle wiring every component to a shared [`Store`].
///
/// ## Example
/// ```no_run
/// # async fn demo() -> khata_ledger::LedgerResult<()> {
/// use khata_ledger::Ledger;
/// use khata_store::Store;
///
/// let ledger = Ledger::new(Store::memory());
/// let balance = ledger.banking().current_balance().await?;
/// # let _ = balance;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Ledger {
    store: Store,
    retry: RetryPolicy,
    /// Shared so every clone appends through the SAME writer lane.
    banking: MobileBankingLedger,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Ledger::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: Store, retry: RetryPolicy) -> Self {
        let banking = MobileBankingLedger::new(&store);
        Ledger {
            store,
            retry,
            banking,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn inventory(&self) -> InventoryLedger {
        InventoryLedger::new(&self.store, self.retry)
    }

    pub fn accounts(&self) -> CustomerAccount {
        CustomerAccount::new(&self.store, self.retry)
    }

    pub fn journal(&self) -> PaymentJournal {
        PaymentJournal::new(&self.store)
    }

    pub fn coordinator(&self) -> TransactionCoordinator {
        TransactionCoordinator::new(
            self.store.clone(),
            self.inventory(),
            self.accounts(),
            self.journal(),
        )
    }

    pub fn banking(&self) -> MobileBankingLedger {
        self.banking.clone()
    }

    pub fn commissions(&self) -> CommissionSettings {
        CommissionSettings::new(&self.store)
    }

    pub fn reports(&self) -> ReportAggregator {
        ReportAggregator::new(self.store.clone())
    }

    pub fn cleaner(&self, config: RetentionConfig) -> RetentionCleaner {
        RetentionCleaner::new(self.store.clone(), config)
    }

    pub fn bulk(&self) -> BulkPort {
        BulkPort::new(self.store.clone())
    }
}
