//! # Domain Types
//!
//! Core domain types for the Khata ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id             │       │
//! │  │  name           │   │  customer_id?   │   │  customer_id?   │       │
//! │  │  stock          │   │  total/paid/due │   │  sale_id?       │       │
//! │  │  prices         │   │  profit         │   │  amount, method │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │ 1:N                                   │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │    SaleLine     │   │ MobileBanking   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │ Transaction     │       │
//! │  │  id, name       │   │ id={sale}:{n}   │   │  ─────────────  │       │
//! │  │  total_due      │   │ name snapshot   │   │  kind, operator │       │
//! │  └─────────────────┘   │ price snapshots │   │  balance_after  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Sale lines freeze the product name and both unit prices at sale time, so
//! later price edits never rewrite history (or historical profit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::quantity::Quantity;

/// Generates a fresh v4 document id.
#[inline]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Commission Rate
// =============================================================================

/// A commission rate in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 185 bps = 1.85% (the shop's bKash cash-out rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate. Unknown operators fall back here.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product on the shop's shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// What the shop pays per unit (cost price).
    pub buy_price: Money,

    /// What the customer pays per unit.
    pub sell_price: Money,

    /// Current stock level. Kept non-negative by the inventory ledger.
    pub stock: Quantity,

    /// Stock at or below this level flags the product as low-stock.
    pub low_stock_threshold: Quantity,

    /// Unit label for display ("kg", "pcs", "L").
    pub unit: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether this product should appear on the low-stock report.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    /// Unit margin at current prices. Historical profit uses line snapshots,
    /// not this.
    #[inline]
    pub fn margin(&self) -> Money {
        self.sell_price - self.buy_price
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with an optional running due (baki) balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,

    /// Outstanding credit balance. Never negative; overpayment is reported
    /// to the caller, not stored.
    pub total_due: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale (or due collection) was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Paid via a mobile-banking wallet (bKash, Nagad, Rocket).
    MobileBanking,
    /// Taken on credit; the unpaid amount accrues to the customer's due.
    Due,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale. Line items live in separate `sale_items` documents.
///
/// ## Invariants
/// - `total = subtotal − discount` (subtotal = Σ qty × unit sale price)
/// - `due = max(0, total − paid)`
/// - `profit = Σ qty × (sale − cost) − discount + max(0, paid − total)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,

    /// Customer reference; None for walk-in sales.
    pub customer_id: Option<String>,

    /// Customer name frozen at sale time (the customer may be renamed or
    /// deleted later).
    pub customer_name: Option<String>,

    /// Σ qty × unit sale price, before discount.
    pub subtotal: Money,

    /// Whole-sale discount (never negative).
    pub discount: Money,

    /// subtotal − discount.
    pub total: Money,

    /// Amount settled at the counter.
    pub paid: Money,

    /// max(0, total − paid). What this sale still owes.
    pub due: Money,

    /// Whether this sale's due has been folded into the customer's running
    /// balance. The coordinator sets it after the accrual step lands, so a
    /// retried sale does not accrue twice.
    #[serde(default)]
    pub due_accrued: bool,

    /// Realised profit including any overpayment.
    pub profit: Money,

    pub method: PaymentMethod,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item of a sale, stored as its own document.
///
/// Deterministic id `{sale_id}:{line_no}` makes a retried write of the same
/// cart converge on the same documents instead of duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    /// `{sale_id}:{line_no}`.
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// Product name at sale time (frozen).
    pub product_name: String,

    pub quantity: Quantity,

    /// Unit sale price at sale time (frozen).
    pub unit_price: Money,

    /// Unit cost price at sale time (frozen), for profit math.
    pub unit_cost: Money,

    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// qty × unit sale price, rounded half-up to the poisha.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// qty × (sale − cost), rounded half-up to the poisha.
    #[inline]
    pub fn line_profit(&self) -> Money {
        (self.unit_price - self.unit_cost).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One entry in the append-only payment journal.
///
/// Removed only by sale-delete reversal or the retention cascade, never
/// edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,

    /// Customer the payment applies to; None for anonymous counter sales.
    pub customer_id: Option<String>,

    /// Sale this payment settled; None for a manual due collection.
    pub sale_id: Option<String>,

    /// Always positive.
    pub amount: Money,

    pub method: PaymentMethod,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Mobile Banking
// =============================================================================

/// The kind of a mobile-banking agent transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    /// Customer deposits cash; the agent wallet balance rises.
    CashIn,
    /// Customer withdraws cash; the agent wallet balance falls.
    CashOut,
    /// Airtime recharge; the agent wallet balance falls.
    Recharge,
}

impl TxnKind {
    /// The sign this kind applies to the running balance: +1 for cash-in,
    /// −1 for cash-out and recharge.
    #[inline]
    pub const fn balance_sign(&self) -> i64 {
        match self {
            TxnKind::CashIn => 1,
            TxnKind::CashOut | TxnKind::Recharge => -1,
        }
    }

    /// Stable name used as the rate-table key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TxnKind::CashIn => "cash_in",
            TxnKind::CashOut => "cash_out",
            TxnKind::Recharge => "recharge",
        }
    }
}

/// One link in the mobile-banking balance chain.
///
/// ## Chain Invariant
/// `balance_after[n] = balance_after[n−1] + sign(kind) × amount`, with the
/// first entry chained from zero. Entries are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileBankingTransaction {
    pub id: String,
    pub kind: TxnKind,

    /// Operator name, lowercase ("bkash", "nagad", "rocket").
    pub operator: String,

    /// Always positive.
    pub amount: Money,

    /// Derived from the rate table at append time; never negative.
    pub commission: Money,

    /// Running agent-wallet balance after this transaction. Signed; a float
    /// of customer cash can legitimately drive it negative.
    pub balance_after: Money,

    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl MobileBankingTransaction {
    /// The signed delta this entry applies to the chain.
    #[inline]
    pub fn balance_delta(&self) -> Money {
        Money::from_poisha(self.amount.poisha() * self.kind.balance_sign())
    }
}

// =============================================================================
// Commission Rate Table
// =============================================================================

/// Per-kind commission rates for one operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRates {
    pub cash_in: Rate,
    pub cash_out: Rate,
    pub recharge: Rate,
}

impl OperatorRates {
    pub const fn new(cash_in: u32, cash_out: u32, recharge: u32) -> Self {
        OperatorRates {
            cash_in: Rate::from_bps(cash_in),
            cash_out: Rate::from_bps(cash_out),
            recharge: Rate::from_bps(recharge),
        }
    }

    #[inline]
    pub fn rate_for(&self, kind: TxnKind) -> Rate {
        match kind {
            TxnKind::CashIn => self.cash_in,
            TxnKind::CashOut => self.cash_out,
            TxnKind::Recharge => self.recharge,
        }
    }
}

/// The commission rate table: operator → per-kind rates.
///
/// Stored as a singleton settings document and replaced wholesale; a reader
/// never observes a half-updated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTable {
    /// BTreeMap for deterministic serialization order.
    pub operators: BTreeMap<String, OperatorRates>,
}

impl CommissionTable {
    /// Rate for an operator and kind. Unknown operators get rate zero, so an
    /// unconfigured table records commission-free transactions instead of
    /// failing.
    pub fn rate_for(&self, operator: &str, kind: TxnKind) -> Rate {
        self.operators
            .get(&operator.to_lowercase())
            .map(|rates| rates.rate_for(kind))
            .unwrap_or_else(Rate::zero)
    }
}

/// The shop's real rate card as shipped.
impl Default for CommissionTable {
    fn default() -> Self {
        let mut operators = BTreeMap::new();
        operators.insert("bkash".to_string(), OperatorRates::new(100, 185, 200));
        operators.insert("nagad".to_string(), OperatorRates::new(100, 185, 200));
        operators.insert("rocket".to_string(), OperatorRates::new(100, 180, 150));
        CommissionTable { operators }
    }
}

// =============================================================================
// Stock Movement Marker
// =============================================================================

/// Idempotency marker recording that a sale's stock reservation for one
/// product has been applied.
///
/// Deterministic id `{sale_id}:{product_id}`: a retried sale step finds the
/// marker and skips the decrement instead of applying it twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    /// `{sale_id}:{product_id}`.
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// The quantity that was reserved, so reversal restores exactly this.
    pub quantity: Quantity,

    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Builds the deterministic marker id for a (sale, product) pair.
    #[inline]
    pub fn marker_id(sale_id: &str, product_id: &str) -> String {
        format!("{sale_id}:{product_id}")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
