//! # Transaction Coordinator
//!
//! The multi-aggregate write paths: record, edit and delete sales, and
//! collect due payments.
//!
//! ## Why a Coordinator
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One credit sale touches FIVE documents, and the store commits them    │
//! │  one at a time:                                                         │
//! │                                                                         │
//! │   1. sales/{id}                 header (totals, method)                 │
//! │   2. sale_items/{id}:{n}        one per line, deterministic id          │
//! │   3. products/{pid}             stock decrement (marker-guarded)        │
//! │   4. customers/{cid}            due accrual (flag-guarded)              │
//! │   5. payments/{id}:payment      paid amount, deterministic id           │
//! │                                                                         │
//! │  A crash between any two leaves the ledger split. The coordinator's    │
//! │  answer is not rollback (the store can't) but CONVERGENCE:             │
//! │   - every step is idempotent, keyed by the sale id                     │
//! │   - a failure surfaces PartialFailure naming the completed steps       │
//! │   - retrying the same sale id skips what already landed                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Edit Semantics
//! Edits apply the stock DELTA per product (new − old), never a fresh
//! full decrement, so an unchanged line is untouched no matter how many
//! times the sale is edited.

use std::collections::BTreeMap;

use chrono::Utc;
use khata_core::error::ValidationError;
use khata_core::money::Money;
use khata_core::quantity::Quantity;
use khata_core::sale::{stock_deltas, PricedLine, SaleDraft, SaleTotals};
use khata_core::types::{new_id, PaymentMethod, Sale, SaleLine};
use khata_core::validation::validate_sale_draft;
use khata_store::{Store, StoreError, Versioned};
use tracing::{info, warn};

use crate::account::CustomerAccount;
use crate::error::{LedgerError, LedgerResult, SaleStep};
use crate::inventory::InventoryLedger;
use crate::journal::PaymentJournal;

/// Deterministic id of the journal entry a sale's paid amount creates.
fn sale_payment_id(sale_id: &str) -> String {
    format!("{sale_id}:payment")
}

/// Deterministic id of line `n` of a sale.
fn line_id(sale_id: &str, n: usize) -> String {
    format!("{sale_id}:{n}")
}

// =============================================================================
// TransactionCoordinator
// =============================================================================

#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Store,
    inventory: InventoryLedger,
    account: CustomerAccount,
    journal: PaymentJournal,
}

impl TransactionCoordinator {
    pub fn new(
        store: Store,
        inventory: InventoryLedger,
        account: CustomerAccount,
        journal: PaymentJournal,
    ) -> Self {
        TransactionCoordinator {
            store,
            inventory,
            account,
            journal,
        }
    }

    // =========================================================================
    // Record Sale
    // =========================================================================

    /// Records a sale under a fresh id. See [`record_sale_with_id`].
    ///
    /// [`record_sale_with_id`]: TransactionCoordinator::record_sale_with_id
    pub async fn record_sale(&self, draft: &SaleDraft) -> LedgerResult<Sale> {
        self.record_sale_with_id(&new_id(), draft).await
    }

    /// Records a sale under a caller-chosen id.
    ///
    /// Retrying after a `PartialFailure` with the SAME id and draft
    /// converges: the header, lines, stock reservations, due accrual and
    /// payment are each applied at most once.
    pub async fn record_sale_with_id(&self, sale_id: &str, draft: &SaleDraft) -> LedgerResult<Sale> {
        // Everything before the first write can fail cleanly
        validate_sale_draft(draft)?;
        let customer = self.resolve_customer(draft.customer_id.as_deref()).await?;
        let priced = self.resolve_lines(draft).await?;
        let totals = SaleTotals::compute(&priced, draft.discount, draft.paid);

        let mut completed: Vec<SaleStep> = Vec::new();

        // Step 1: the sale header. An existing header means this is a retry.
        let mut sale = match self.store.sales().try_get(sale_id).await? {
            Some(existing) => {
                info!(sale_id, "resuming previously started sale");
                existing.value
            }
            None => {
                let now = Utc::now();
                let sale = Sale {
                    id: sale_id.to_string(),
                    customer_id: draft.customer_id.clone(),
                    customer_name: customer.as_ref().map(|c| c.name.clone()),
                    subtotal: totals.subtotal,
                    discount: draft.discount,
                    total: totals.total,
                    paid: draft.paid,
                    due: totals.due,
                    due_accrued: false,
                    profit: totals.profit,
                    method: draft.method,
                    created_at: now,
                    updated_at: now,
                };
                match self.store.sales().insert(&sale).await {
                    Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                sale
            }
        };
        completed.push(SaleStep::SalePersisted);

        // Step 2: line documents, deterministic ids
        for (n, line) in priced.iter().enumerate() {
            let doc = SaleLine {
                id: line_id(sale_id, n),
                sale_id: sale_id.to_string(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit_cost: line.unit_cost,
                created_at: sale.created_at,
            };
            match self.store.sales().insert_line(&doc).await {
                Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => {
                    return Err(self.partial("record_sale", sale_id, completed, e.into()));
                }
            }
        }
        completed.push(SaleStep::LinesPersisted);

        // Step 3: stock, one marker-guarded reservation per product
        for (product_id, qty) in merge_line_quantities(&priced) {
            if let Err(e) = self.inventory.reserve_for_sale(sale_id, &product_id, qty).await {
                return Err(self.partial("record_sale", sale_id, completed, e));
            }
        }
        completed.push(SaleStep::StockReserved);

        // Step 4: due accrual, guarded by the header flag
        if let Some(customer_id) = &sale.customer_id {
            if totals.due.is_positive() && !sale.due_accrued {
                if let Err(e) = self.account.accrue_due(customer_id, totals.due).await {
                    return Err(self.partial("record_sale", sale_id, completed, e));
                }
                sale.due_accrued = true;
                sale.updated_at = Utc::now();
                if let Err(e) = self.store.sales().update(&sale, None).await {
                    // The accrual landed; losing the flag write means a
                    // retried sale could accrue again. Surface, never hide.
                    warn!(sale_id, "due accrued but flag write failed");
                    completed.push(SaleStep::DueAccrued);
                    return Err(self.partial("record_sale", sale_id, completed, e.into()));
                }
            }
        }
        completed.push(SaleStep::DueAccrued);

        // Step 5: the payment journal entry, deterministic id
        if draft.paid.is_positive() {
            if let Err(e) = self
                .journal
                .record_with_id(
                    &sale_payment_id(sale_id),
                    sale.customer_id.as_deref(),
                    Some(sale_id),
                    draft.paid,
                    draft.method,
                )
                .await
            {
                return Err(self.partial("record_sale", sale_id, completed, e));
            }
        }

        info!(
            sale_id,
            total = %sale.total,
            due = %sale.due,
            profit = %sale.profit,
            "sale recorded"
        );
        Ok(sale)
    }

    // =========================================================================
    // Edit Sale
    // =========================================================================

    /// Rewrites a sale from a new draft: derived fields are recomputed and
    /// the stock effect is exactly the per-product delta between the old
    /// and new carts. The customer attachment cannot change.
    pub async fn edit_sale(&self, sale_id: &str, draft: &SaleDraft) -> LedgerResult<Sale> {
        validate_sale_draft(draft)?;

        let Versioned { value: old_sale, .. } = self
            .store
            .sales()
            .get(sale_id)
            .await
            .map_err(|e| LedgerError::from_store("sale", e))?;

        if draft.customer_id != old_sale.customer_id {
            return Err(ValidationError::InvalidFormat {
                field: "customer_id".to_string(),
                reason: "a sale cannot be moved to a different customer".to_string(),
            }
            .into());
        }

        let priced = self.resolve_lines(draft).await?;
        let totals = SaleTotals::compute(&priced, draft.discount, draft.paid);
        let old_lines = self.store.sales().lines_for(sale_id).await?;

        let mut completed: Vec<SaleStep> = Vec::new();

        // Stock: apply only what changed
        let old_pairs: Vec<(String, Quantity)> = old_lines
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();
        let new_pairs: Vec<(String, Quantity)> = priced
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();
        let deltas = stock_deltas(&old_pairs, &new_pairs);
        let new_totals_by_product = merge_line_quantities(&priced);

        for (product_id, delta) in &deltas {
            match self.inventory.apply_delta(product_id, *delta).await {
                // A product removed from the cart may have been deleted
                // since the sale; its stock is simply gone
                Ok(_) | Err(LedgerError::NotFound { .. }) => {}
                Err(e) => return Err(self.partial("edit_sale", sale_id, completed, e)),
            }
            let remaining = new_totals_by_product
                .get(product_id)
                .copied()
                .unwrap_or_else(Quantity::zero);
            if let Err(e) = self
                .inventory
                .sync_sale_marker(sale_id, product_id, remaining)
                .await
            {
                return Err(self.partial("edit_sale", sale_id, completed, e));
            }
        }
        completed.push(SaleStep::StockReserved);

        // Lines: replace wholesale
        if let Err(e) = self.store.sales().remove_lines(sale_id).await {
            return Err(self.partial("edit_sale", sale_id, completed, e.into()));
        }
        for (n, line) in priced.iter().enumerate() {
            let doc = SaleLine {
                id: line_id(sale_id, n),
                sale_id: sale_id.to_string(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit_cost: line.unit_cost,
                created_at: old_sale.created_at,
            };
            match self.store.sales().insert_line(&doc).await {
                Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(self.partial("edit_sale", sale_id, completed, e.into())),
            }
        }
        completed.push(SaleStep::LinesPersisted);

        // Due: adjust by the delta between old and new
        let mut due_accrued = old_sale.due_accrued;
        if let Some(customer_id) = &old_sale.customer_id {
            let old_applied = if old_sale.due_accrued {
                old_sale.due
            } else {
                Money::zero()
            };
            let due_delta = totals.due - old_applied;

            let result = if due_delta.is_positive() {
                self.account.accrue_due(customer_id, due_delta).await.map(|_| ())
            } else if due_delta.is_negative() {
                self.account.reduce_due(customer_id, -due_delta).await.map(|_| ())
            } else {
                Ok(())
            };
            if let Err(e) = result {
                return Err(self.partial("edit_sale", sale_id, completed, e));
            }
            due_accrued = true;
        }
        completed.push(SaleStep::DueAccrued);

        // Payment: append only the additional paid amount
        let paid_delta = draft.paid - old_sale.paid;
        if paid_delta.is_positive() {
            if let Err(e) = self
                .journal
                .record(
                    old_sale.customer_id.as_deref(),
                    Some(sale_id),
                    paid_delta,
                    draft.method,
                )
                .await
            {
                return Err(self.partial("edit_sale", sale_id, completed, e));
            }
        }
        completed.push(SaleStep::PaymentRecorded);

        // Header last: readers see the old consistent totals until here
        let new_sale = Sale {
            id: old_sale.id.clone(),
            customer_id: old_sale.customer_id.clone(),
            customer_name: old_sale.customer_name.clone(),
            subtotal: totals.subtotal,
            discount: draft.discount,
            total: totals.total,
            paid: draft.paid,
            due: totals.due,
            due_accrued,
            profit: totals.profit,
            method: draft.method,
            created_at: old_sale.created_at,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.store.sales().update(&new_sale, None).await {
            return Err(self.partial("edit_sale", sale_id, completed, e.into()));
        }

        info!(sale_id, total = %new_sale.total, due = %new_sale.due, "sale edited");
        Ok(new_sale)
    }

    // =========================================================================
    // Collect Payment
    // =========================================================================

    /// Records a manual due collection: journal entry first, then the due
    /// reduction (floored at zero). Returns the customer's new due.
    pub async fn collect_payment(
        &self,
        customer_id: &str,
        amount: Money,
        method: PaymentMethod,
    ) -> LedgerResult<Money> {
        khata_core::validation::validate_positive_amount("amount", amount)?;
        // Fail before writing anything when the customer is missing
        self.account.current_due(customer_id).await?;

        let payment_id = self
            .journal
            .record(Some(customer_id), None, amount, method)
            .await?;

        match self.account.reduce_due(customer_id, amount).await {
            Ok(reduction) => {
                if reduction.excess.is_positive() {
                    info!(
                        customer_id,
                        excess = %reduction.excess,
                        "payment exceeded due; excess returned to caller"
                    );
                }
                info!(customer_id, amount = %amount, new_due = %reduction.new_due, "payment collected");
                Ok(reduction.new_due)
            }
            Err(e) => Err(LedgerError::PartialFailure {
                operation: "collect_payment",
                sale_id: payment_id,
                completed: vec![SaleStep::PaymentRecorded],
                source: Box::new(e),
            }),
        }
    }

    // =========================================================================
    // Delete Sale
    // =========================================================================

    /// Deletes a sale with full compensating reversal: stock restored from
    /// the reservation markers, the accrued due unwound, linked payments
    /// and line items removed, then the header.
    ///
    /// `NotFound` on an absent sale; a caller retrying a delete treats
    /// that as success.
    pub async fn delete_sale(&self, sale_id: &str) -> LedgerResult<()> {
        let Some(Versioned { value: mut sale, .. }) = self.store.sales().try_get(sale_id).await?
        else {
            return Err(LedgerError::not_found("sale", sale_id));
        };

        let mut completed: Vec<SaleStep> = Vec::new();

        // Stock back on the shelf, marker by marker (idempotent)
        if let Err(e) = self.inventory.restore_for_sale(sale_id).await {
            return Err(self.partial("delete_sale", sale_id, completed, e));
        }
        completed.push(SaleStep::StockReserved);

        // Unwind the accrued due, then drop the flag so a retried delete
        // does not reduce twice
        if sale.due_accrued && sale.due.is_positive() {
            if let Some(customer_id) = sale.customer_id.clone() {
                match self.account.reduce_due(&customer_id, sale.due).await {
                    Ok(_) | Err(LedgerError::NotFound { .. }) => {}
                    Err(e) => return Err(self.partial("delete_sale", sale_id, completed, e)),
                }
            }
            sale.due_accrued = false;
            sale.updated_at = Utc::now();
            if let Err(e) = self.store.sales().update(&sale, None).await {
                completed.push(SaleStep::DueAccrued);
                return Err(self.partial("delete_sale", sale_id, completed, e.into()));
            }
        }
        completed.push(SaleStep::DueAccrued);

        // Journal reversal and children
        if let Err(e) = self.journal.remove_for_sale(sale_id).await {
            return Err(self.partial("delete_sale", sale_id, completed, e));
        }
        completed.push(SaleStep::PaymentRecorded);

        if let Err(e) = self.store.sales().remove_lines(sale_id).await {
            return Err(self.partial("delete_sale", sale_id, completed, e.into()));
        }
        completed.push(SaleStep::LinesPersisted);

        self.store.sales().remove(sale_id).await?;
        info!(sale_id, "sale deleted with full reversal");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A sale together with its line items.
    pub async fn sale_with_lines(&self, sale_id: &str) -> LedgerResult<(Sale, Vec<SaleLine>)> {
        let sale = self
            .store
            .sales()
            .get(sale_id)
            .await
            .map_err(|e| LedgerError::from_store("sale", e))?
            .value;
        let lines = self.store.sales().lines_for(sale_id).await?;
        Ok((sale, lines))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn resolve_customer(
        &self,
        customer_id: Option<&str>,
    ) -> LedgerResult<Option<khata_core::types::Customer>> {
        match customer_id {
            None => Ok(None),
            Some(id) => Ok(Some(
                self.store
                    .customers()
                    .get(id)
                    .await
                    .map_err(|e| LedgerError::from_store("customer", e))?
                    .value,
            )),
        }
    }

    /// Resolves draft lines against the product catalogue, freezing the
    /// name and price snapshots.
    async fn resolve_lines(&self, draft: &SaleDraft) -> LedgerResult<Vec<PricedLine>> {
        let mut priced = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product = self
                .store
                .products()
                .get(&line.product_id)
                .await
                .map_err(|e| LedgerError::from_store("product", e))?
                .value;
            priced.push(PricedLine {
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.sell_price,
                unit_cost: product.buy_price,
            });
        }
        Ok(priced)
    }

    fn partial(
        &self,
        operation: &'static str,
        sale_id: &str,
        completed: Vec<SaleStep>,
        source: LedgerError,
    ) -> LedgerError {
        warn!(
            operation,
            sale_id,
            ?completed,
            error = %source,
            "multi-document operation stopped midway"
        );
        LedgerError::PartialFailure {
            operation,
            sale_id: sale_id.to_string(),
            completed,
            source: Box::new(source),
        }
    }
}

/// Sums quantities per product (a cart may list the same product twice).
fn merge_line_quantities(lines: &[PricedLine]) -> BTreeMap<String, Quantity> {
    let mut merged: BTreeMap<String, Quantity> = BTreeMap::new();
    for line in lines {
        *merged
            .entry(line.product_id.clone())
            .or_insert_with(Quantity::zero) += line.quantity;
    }
    merged
}

// =============================================================================
// Unit Tests
// =============================================================================
