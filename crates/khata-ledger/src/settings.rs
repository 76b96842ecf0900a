//! # Commission Settings
//!
//! Read/replace access to the commission rate table.
//!
//! The table lives in one settings document and is replaced wholesale, so a
//! concurrent reader sees either the old or the new table, never a partial
//! update. Appends read it fresh (see [`MobileBankingLedger`]).
//!
//! [`MobileBankingLedger`]: crate::banking::MobileBankingLedger

use khata_core::types::CommissionTable;
use khata_core::validation::{validate_operator, validate_rate_bps};
use khata_store::{SettingsRepository, Store};
use tracing::info;

use crate::error::LedgerResult;

#[derive(Clone)]
pub struct CommissionSettings {
    settings: SettingsRepository,
}

impl CommissionSettings {
    pub fn new(store: &Store) -> Self {
        CommissionSettings {
            settings: store.settings(),
        }
    }

    /// The current table; the shipped defaults when unconfigured.
    pub async fn rates(&self) -> LedgerResult<CommissionTable> {
        Ok(self.settings.commission_rates().await?)
    }

    /// Validates and replaces the whole table in one write.
    pub async fn set_rates(&self, table: &CommissionTable) -> LedgerResult<()> {
        for (operator, rates) in &table.operators {
            validate_operator(operator)?;
            validate_rate_bps(rates.cash_in.bps())?;
            validate_rate_bps(rates.cash_out.bps())?;
            validate_rate_bps(rates.recharge.bps())?;
        }

        self.settings.set_commission_rates(table).await?;
        info!(operators = table.operators.len(), "commission rates updated");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
