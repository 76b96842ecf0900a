//! # Ledger Error Types
//!
//! The error taxonomy of the consistency core.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Validation     input rejected BEFORE any write; nothing applied        │
//! │  NotFound       referenced entity missing                               │
//! │  Conflict       CAS retries exhausted (surfaced, never silent)          │
//! │  PartialFailure multi-document op stopped midway; names the completed   │
//! │                 steps so the caller can retry toward convergence        │
//! │  Store          the backend itself failed                               │
//! │                                                                         │
//! │  Nothing is logged-and-ignored in a way that loses consistency: every  │
//! │  aborted write path either reverses or reports.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use khata_core::error::ValidationError;
use khata_store::StoreError;
use thiserror::Error;

// =============================================================================
// Sale Steps
// =============================================================================

/// The sub-steps of recording a sale, in application order.
///
/// `PartialFailure` reports which of these landed before the failure, so a
/// retry (or an operator) knows exactly where the sale stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleStep {
    /// The sale header document exists.
    SalePersisted,
    /// All line-item documents exist.
    LinesPersisted,
    /// Stock was decremented for every line.
    StockReserved,
    /// The customer's due balance includes this sale.
    DueAccrued,
    /// The paid amount is in the payment journal.
    PaymentRecorded,
}

impl std::fmt::Display for SaleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SaleStep::SalePersisted => "sale persisted",
            SaleStep::LinesPersisted => "lines persisted",
            SaleStep::StockReserved => "stock reserved",
            SaleStep::DueAccrued => "due accrued",
            SaleStep::PaymentRecorded => "payment recorded",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors of the consistency core.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input rejected before any write.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An optimistic write kept losing races past the retry bound.
    #[error("write conflict on {entity} {id} after {attempts} attempts")]
    Conflict {
        entity: &'static str,
        id: String,
        attempts: u32,
    },

    /// A multi-document operation failed midway.
    ///
    /// Earlier completed steps are NOT rolled back (the store cannot do so
    /// atomically); instead they are reported, and every step is idempotent
    /// so a retry of the same operation converges.
    #[error("{operation} on sale {sale_id} failed after steps {completed:?}: {source}")]
    PartialFailure {
        operation: &'static str,
        sale_id: String,
        completed: Vec<SaleStep>,
        #[source]
        source: Box<LedgerError>,
    },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Maps a store-level NotFound to a domain NotFound, leaving other
    /// store errors intact.
    pub fn from_store(entity: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => LedgerError::NotFound { entity, id },
            other => LedgerError::Store(other),
        }
    }

    /// True for errors a retry of the same call may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict { .. }
                | LedgerError::PartialFailure { .. }
                | LedgerError::Store(StoreError::Backend(_))
        )
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_names_steps() {
        let err = LedgerError::PartialFailure {
            operation: "record_sale",
            sale_id: "s1".to_string(),
            completed: vec![SaleStep::SalePersisted, SaleStep::LinesPersisted],
            source: Box::new(LedgerError::not_found("product", "p9")),
        };

        let msg = err.to_string();
        assert!(msg.contains("record_sale"));
        assert!(msg.contains("s1"));
        assert!(msg.contains("product not found: p9"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_store_not_found_maps_to_domain() {
        let err = LedgerError::from_store("customer", StoreError::not_found("customers", "c1"));
        assert!(matches!(
            err,
            LedgerError::NotFound { entity: "customer", .. }
        ));
    }
}
