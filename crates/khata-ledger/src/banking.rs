//! # Mobile Banking Ledger
//!
//! The agent-wallet balance chain.
//!
//! ## The Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entry 1   cash_in  ৳1,000    balance_after =     0 + 1,000 =  1,000    │
//! │  entry 2   cash_out   ৳400    balance_after = 1,000 −   400 =    600    │
//! │  entry 3   recharge    ৳50    balance_after =   600 −    50 =    550    │
//! │                                                                         │
//! │  Each entry's balance derives from its predecessor. Two appends that   │
//! │  both read entry 2 would both write balance 600±x and fork the chain,  │
//! │  so the read-latest + append pair runs under ONE writer lane:          │
//! │                                                                         │
//! │      let _guard = writer.lock().await;   ← explicit chain dependency   │
//! │      let prev = repo.latest().await?;                                  │
//! │      repo.insert(next(prev)).await?;                                   │
//! │                                                                         │
//! │  History is append-only: no edit, no delete, no rebuild path.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commission comes from a FRESH rate-table read per append; a table
//! replaced mid-day applies from the next transaction on.

use std::sync::Arc;

use chrono::Utc;
use khata_core::money::Money;
use khata_core::types::{new_id, MobileBankingTransaction, TxnKind};
use khata_core::validation::{validate_operator, validate_positive_amount, validate_text};
use khata_store::{BankingRepository, SettingsRepository, Store};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::LedgerResult;

/// A broken link found by [`MobileBankingLedger::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Id of the first entry whose balance does not follow its predecessor.
    pub txn_id: String,
    /// What the chain says the balance should be at that entry.
    pub expected: Money,
    /// What the entry actually recorded.
    pub actual: Money,
}

// =============================================================================
// MobileBankingLedger
// =============================================================================

#[derive(Clone)]
pub struct MobileBankingLedger {
    banking: BankingRepository,
    settings: SettingsRepository,
    /// The single writer lane. Held across read-latest + insert.
    writer: Arc<Mutex<()>>,
}

impl MobileBankingLedger {
    pub fn new(store: &Store) -> Self {
        MobileBankingLedger {
            banking: store.banking(),
            settings: store.settings(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Appends a transaction to the chain and returns the stored entry.
    ///
    /// Commission is derived from the current rate table (round half-up);
    /// the balance chains from the newest entry, or from zero on an empty
    /// chain. The wallet balance MAY go negative — an agent can pay out
    /// float they have not deposited yet.
    pub async fn append(
        &self,
        kind: TxnKind,
        operator: &str,
        amount: Money,
        note: Option<String>,
    ) -> LedgerResult<MobileBankingTransaction> {
        validate_positive_amount("amount", amount)?;
        validate_operator(operator)?;
        if let Some(note) = &note {
            validate_text("note", note)?;
        }

        // Fresh rates every append, never cached
        let table = self.settings.commission_rates().await?;
        let rate = table.rate_for(operator, kind);
        let commission = amount.commission(rate);

        let _guard = self.writer.lock().await;

        let previous = self.banking.latest().await?;
        let previous_balance = previous
            .as_ref()
            .map(|txn| txn.balance_after)
            .unwrap_or_else(Money::zero);

        // Chain order is (created_at, id); keep timestamps strictly
        // increasing so read-back order always matches append order
        let mut created_at = Utc::now();
        if let Some(prev) = &previous {
            let floor = prev.created_at + chrono::Duration::microseconds(1);
            if created_at < floor {
                created_at = floor;
            }
        }

        let delta = Money::from_poisha(amount.poisha() * kind.balance_sign());
        let txn = MobileBankingTransaction {
            id: new_id(),
            kind,
            operator: operator.to_lowercase(),
            amount,
            commission,
            balance_after: previous_balance + delta,
            note,
            created_at,
        };

        self.banking.insert(&txn).await?;
        info!(
            txn_id = %txn.id,
            kind = kind.as_str(),
            operator = %txn.operator,
            amount = %amount,
            commission = %commission,
            balance_after = %txn.balance_after,
            "banking transaction appended"
        );
        Ok(txn)
    }

    /// The current wallet balance: the newest entry's balance_after, or
    /// zero on an empty chain.
    pub async fn current_balance(&self) -> LedgerResult<Money> {
        Ok(self
            .banking
            .latest()
            .await?
            .map(|txn| txn.balance_after)
            .unwrap_or_else(Money::zero))
    }

    /// History, newest first, paginated.
    pub async fn history(&self, limit: u32, offset: u32) -> LedgerResult<Vec<MobileBankingTransaction>> {
        Ok(self.banking.history(limit, offset).await?)
    }

    /// Walks the chain in creation order and reports the first entry whose
    /// balance does not follow from its predecessor. `None` means intact.
    ///
    /// Read-only reconciliation aid; there is deliberately no repair path.
    pub async fn verify_chain(&self) -> LedgerResult<Option<ChainBreak>> {
        let chain = self.banking.all_in_order().await?;

        let mut expected = Money::zero();
        for txn in chain {
            expected += txn.balance_delta();
            if txn.balance_after != expected {
                return Ok(Some(ChainBreak {
                    txn_id: txn.id,
                    expected,
                    actual: txn.balance_after,
                }));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use khata_core::types::{CommissionTable, OperatorRates};

    fn ledger(store: &Store) -> MobileBankingLedger {
        MobileBankingLedger::new(store)
    }

    #[tokio::test]
    async fn test_chain_starts_from_zero() {
        let store = Store::memory();
        let mb = ledger(&store);

        assert_eq!(mb.current_balance().await.unwrap(), Money::zero());

        let txn = mb
            .append(TxnKind::CashIn, "bkash", Money::from_taka(1000), None)
            .await
            .unwrap();
        assert_eq!(txn.balance_after, Money::from_taka(1000));
        // 1,000 taka at 1% = ৳10
        assert_eq!(txn.commission, Money::from_taka(10));
    }

    #[tokio::test]
    async fn test_sign_rule_per_kind() {
        let store = Store::memory();
        let mb = ledger(&store);

        mb.append(TxnKind::CashIn, "bkash", Money::from_taka(1000), None).await.unwrap();
        let out = mb
            .append(TxnKind::CashOut, "bkash", Money::from_taka(400), None)
            .await
            .unwrap();
        assert_eq!(out.balance_after, Money::from_taka(600));
        // 400 taka at 1.85% = ৳7.40
        assert_eq!(out.commission, Money::from_poisha(740));

        let recharge = mb
            .append(TxnKind::Recharge, "rocket", Money::from_taka(50), None)
            .await
            .unwrap();
        assert_eq!(recharge.balance_after, Money::from_taka(550));
    }

    #[tokio::test]
    async fn test_balance_can_go_negative() {
        let store = Store::memory();
        let mb = ledger(&store);

        let txn = mb
            .append(TxnKind::CashOut, "nagad", Money::from_taka(200), None)
            .await
            .unwrap();
        assert_eq!(txn.balance_after, Money::from_taka(-200));
    }

    #[tokio::test]
    async fn test_rate_change_applies_to_next_append_only() {
        let store = Store::memory();
        let mb = ledger(&store);

        let before = mb
            .append(TxnKind::CashIn, "bkash", Money::from_taka(1000), None)
            .await
            .unwrap();
        assert_eq!(before.commission, Money::from_taka(10));

        let mut table = CommissionTable::default();
        table.operators.insert("bkash".to_string(), OperatorRates::new(200, 185, 200));
        store.settings().set_commission_rates(&table).await.unwrap();

        let after = mb
            .append(TxnKind::CashIn, "bkash", Money::from_taka(1000), None)
            .await
            .unwrap();
        assert_eq!(after.commission, Money::from_taka(20));
        // The historical entry keeps its recorded commission
        assert_eq!(before.commission, Money::from_taka(10));
    }

    #[tokio::test]
    async fn test_concurrent_appends_never_fork_the_chain() {
        let store = Store::memory();

        let mb = ledger(&store);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let mb = mb.clone();
            handles.push(tokio::spawn(async move {
                mb.append(TxnKind::CashIn, "bkash", Money::from_taka(100), None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mb.current_balance().await.unwrap(), Money::from_taka(1000));
        assert!(mb.verify_chain().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_chain_reports_first_break() {
        let store = Store::memory();
        let mb = ledger(&store);
        mb.append(TxnKind::CashIn, "bkash", Money::from_taka(100), None).await.unwrap();

        // Plant a corrupt entry directly in the repository
        let bad = MobileBankingTransaction {
            id: "corrupt".to_string(),
            kind: TxnKind::CashIn,
            operator: "bkash".to_string(),
            amount: Money::from_taka(50),
            commission: Money::zero(),
            balance_after: Money::from_taka(999),
            note: None,
            created_at: Utc::now() + chrono::Duration::seconds(1),
        };
        store.banking().insert(&bad).await.unwrap();

        let broken = mb.verify_chain().await.unwrap().unwrap();
        assert_eq!(broken.txn_id, "corrupt");
        assert_eq!(broken.expected, Money::from_taka(150));
        assert_eq!(broken.actual, Money::from_taka(999));
    }

    #[tokio::test]
    async fn test_unknown_operator_is_commission_free() {
        let store = Store::memory();
        let txn = ledger(&store)
            .append(TxnKind::CashIn, "upay", Money::from_taka(500), None)
            .await
            .unwrap();
        assert_eq!(txn.commission, Money::zero());
    }
}
