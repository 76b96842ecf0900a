//! # khata-store: Document Store Boundary for Khata
//!
//! This crate owns all persistence for the ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Khata Data Flow                                  │
//! │                                                                         │
//! │  khata-ledger (coordinator, reports, cleaner)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    khata-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │     Store     │    │  Repositories │    │  Backends    │  │   │
//! │  │   │   (handle)    │    │ (per aggr.)   │    │              │  │   │
//! │  │   │               │    │ ProductRepo   │    │ MemoryStore  │  │   │
//! │  │   │ products()    │◄───│ SaleRepo      │◄───│ SqliteStore  │  │   │
//! │  │   │ sales() ...   │    │ BankingRepo…  │    │ (WAL mode)   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ONE documents TABLE • NO CROSS-DOCUMENT ATOMICITY            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - The `DocumentStore` trait
//! - [`document`] - Document shape, query AST, collection names
//! - [`memory`] - In-memory backend (tests, scenarios)
//! - [`sqlite`] - SQLite backend (WAL, embedded migrations)
//! - [`migrations`] - Embedded migrations
//! - [`repository`] - One typed repository per aggregate
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use khata_store::{Store, StoreConfig};
//!
//! let store = Store::sqlite(StoreConfig::new("khata.db")).await?;
//! let customers = store.customers().with_due().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod sqlite;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use document::{collections, Document, Filter, FilterOp, NewDocument, Query, SortOrder, Versioned};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreConfig};
pub use store::DocumentStore;

pub use repository::banking::BankingRepository;
pub use repository::customer::CustomerRepository;
pub use repository::movement::MovementRepository;
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::settings::SettingsRepository;

use std::sync::Arc;

// =============================================================================
// Store Handle
// =============================================================================

/// Main store handle providing repository access over any backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
}

impl Store {
    /// Wraps an existing backend.
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Store { backend }
    }

    /// A fresh, isolated in-memory store.
    pub fn memory() -> Self {
        Store::new(Arc::new(MemoryStore::new()))
    }

    /// Opens the SQLite backend and runs migrations.
    pub async fn sqlite(config: StoreConfig) -> StoreResult<Self> {
        Ok(Store::new(Arc::new(SqliteStore::connect(config).await?)))
    }

    /// The raw backend, for queries no repository covers.
    pub fn raw(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.backend)
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(Arc::clone(&self.backend))
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(Arc::clone(&self.backend))
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(Arc::clone(&self.backend))
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(Arc::clone(&self.backend))
    }

    pub fn banking(&self) -> BankingRepository {
        BankingRepository::new(Arc::clone(&self.backend))
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(Arc::clone(&self.backend))
    }

    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(Arc::clone(&self.backend))
    }
}
