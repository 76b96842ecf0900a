//! # Repositories
//!
//! One typed repository per aggregate. Each one speaks `DocumentStore`
//! underneath, so every repository works identically against the in-memory
//! and SQLite backends.
//!
//! ## Repository Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductRepository        products          stock lives here (CAS)      │
//! │  CustomerRepository       customers         total_due lives here (CAS)  │
//! │  SaleRepository           sales, sale_items sale + line documents       │
//! │  PaymentRepository        payments          append-only journal         │
//! │  BankingRepository        mobile_banking_logs  the balance chain        │
//! │  SettingsRepository       settings          commission rate singleton   │
//! │  MovementRepository       stock_movements   reservation markers         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod banking;
pub mod customer;
pub mod movement;
pub mod payment;
pub mod product;
pub mod sale;
pub mod settings;
