//! # khata-core: Pure Business Logic for Khata
//!
//! This crate is the **heart** of the ledger core. It contains all business
//! arithmetic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Khata Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  khata-ledger (Consistency Core)                │   │
//! │  │   TransactionCoordinator ── MobileBankingLedger ── Reports      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ khata-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   sale    │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ SaleTotals│  │   rules   │  │   │
//! │  │   │  Customer │  │   Rate    │  │ StockDelta│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO ASYNC • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  khata-store (Document Store)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Sale, Payment, banking log)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`quantity`] - Fixed-point quantities (the shop sells 0.5 kg)
//! - [`sale`] - Sale drafts, derived totals, stock deltas for edits
//! - [`validation`] - Input validation rules
//! - [`error`] - Validation error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output, always
//! 2. **Integer Money**: all monetary values are poisha (i64)
//! 3. **Explicit Errors**: typed errors, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use khata_core::money::Money;
//! use khata_core::types::Rate;
//!
//! // ৳1,000.00 cash-in at the bKash cash-in rate (1.00% = 100 bps)
//! let amount = Money::from_taka(1000);
//! let commission = amount.commission(Rate::from_bps(100));
//! assert_eq!(commission, Money::from_taka(10));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod quantity;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use money::Money;
pub use quantity::Quantity;
pub use sale::{stock_deltas, DraftLine, PricedLine, SaleDraft, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale.
///
/// ## Business Reason
/// Keeps a single sale's multi-aggregate write sequence bounded; a runaway
/// cart would stretch the partial-failure window proportionally.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum length of free-text fields (names, notes, addresses).
pub const MAX_TEXT_LEN: usize = 200;
