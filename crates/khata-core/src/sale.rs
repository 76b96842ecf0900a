//! # Sale Math
//!
//! Drafts, derived totals, and the stock-delta computation for sale edits.
//!
//! ## Derivation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleDraft (caller input)                                               │
//! │  { customer?, lines: [{product_id, qty}], discount, paid, method }      │
//! │       │                                                                 │
//! │       ▼  coordinator resolves products, freezes price snapshots         │
//! │  PricedLine[]                                                           │
//! │  { product_id, name, qty, unit_price, unit_cost }                       │
//! │       │                                                                 │
//! │       ▼  SaleTotals::compute  (pure, this module)                       │
//! │  { subtotal, total, due, profit, overpaid }                             │
//! │                                                                         │
//! │  subtotal = Σ qty × unit_price          (half-up per line)             │
//! │  total    = subtotal − discount                                         │
//! │  due      = max(0, total − paid)                                        │
//! │  overpaid = max(0, paid − total)                                        │
//! │  profit   = Σ qty × (price − cost) − discount + overpaid               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure: same input, same output, no I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::PaymentMethod;

// =============================================================================
// Draft Input
// =============================================================================

/// One line of a sale draft, as the caller submits it.
///
/// Prices are NOT part of the draft; the coordinator freezes them from the
/// product at record time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: String,
    pub quantity: Quantity,
}

/// A sale as submitted by the caller, before any derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDraft {
    /// Customer to attach; None for walk-in sales.
    pub customer_id: Option<String>,
    pub lines: Vec<DraftLine>,
    pub discount: Money,
    pub paid: Money,
    pub method: PaymentMethod,
}

// =============================================================================
// Priced Line
// =============================================================================

/// A draft line with product snapshots resolved.
///
/// Intermediate between `DraftLine` and a persisted `SaleLine` document.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub unit_cost: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn line_profit(&self) -> Money {
        (self.unit_price - self.unit_cost).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Derived Totals
// =============================================================================

/// All derived monetary fields of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    /// Σ qty × unit sale price.
    pub subtotal: Money,
    /// subtotal − discount. May go negative when the discount exceeds the
    /// subtotal; the ledger stores it as-is.
    pub total: Money,
    /// max(0, total − paid).
    pub due: Money,
    /// max(0, paid − total). Realised as extra profit, never as negative due.
    pub overpaid: Money,
    /// Σ qty × (price − cost) − discount + overpaid.
    pub profit: Money,
}

impl SaleTotals {
    /// Derives every monetary field of a sale from its priced lines.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    /// use khata_core::quantity::Quantity;
    /// use khata_core::sale::{PricedLine, SaleTotals};
    ///
    /// let lines = vec![PricedLine {
    ///     product_id: "p1".to_string(),
    ///     product_name: "Rice".to_string(),
    ///     quantity: Quantity::from_whole(2),
    ///     unit_price: Money::from_taka(80),
    ///     unit_cost: Money::from_taka(70),
    /// }];
    ///
    /// let totals = SaleTotals::compute(&lines, Money::from_taka(10), Money::from_taka(100));
    /// assert_eq!(totals.total, Money::from_taka(150)); // 160 − 10
    /// assert_eq!(totals.due, Money::from_taka(50));
    /// assert_eq!(totals.profit, Money::from_taka(10)); // 20 − 10
    /// ```
    pub fn compute(lines: &[PricedLine], discount: Money, paid: Money) -> SaleTotals {
        let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
        let gross_profit: Money = lines.iter().map(PricedLine::line_profit).sum();

        let total = subtotal - discount;
        let due = (total - paid).clamped_non_negative();
        let overpaid = (paid - total).clamped_non_negative();
        let profit = gross_profit - discount + overpaid;

        SaleTotals {
            subtotal,
            total,
            due,
            overpaid,
            profit,
        }
    }
}

// =============================================================================
// Stock Deltas for Sale Edits
// =============================================================================

/// Per-product stock adjustment an edit must apply.
///
/// Positive delta = additionally reserve (decrement stock); negative delta =
/// restore (increment stock). Products whose quantity is unchanged are
/// absent, so an edit touches only what actually changed.
///
/// ## Why Deltas?
/// Re-reserving the full new quantities while only restoring on delete would
/// double-decrement every unchanged line on every edit. The delta form makes
/// an edit's stock effect exactly `new − old`, per product.
pub fn stock_deltas(
    old: &[(String, Quantity)],
    new: &[(String, Quantity)],
) -> BTreeMap<String, Quantity> {
    let mut deltas: BTreeMap<String, Quantity> = BTreeMap::new();

    for (product_id, qty) in new {
        *deltas.entry(product_id.clone()).or_insert_with(Quantity::zero) += *qty;
    }
    for (product_id, qty) in old {
        *deltas.entry(product_id.clone()).or_insert_with(Quantity::zero) -= *qty;
    }

    deltas.retain(|_, delta| !delta.is_zero());
    deltas
}

// =============================================================================
// Unit Tests
// =============================================================================
