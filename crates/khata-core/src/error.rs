//! # Error Types
//!
//! Validation errors for khata-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  khata-core errors (this file)                                         │
//! │  └── ValidationError  - Input validation failures (pre-write)          │
//! │                                                                         │
//! │  khata-store errors (separate crate)                                   │
//! │  └── StoreError       - Document store failures                        │
//! │                                                                         │
//! │  khata-ledger errors (separate crate)                                  │
//! │  └── LedgerError      - NotFound / Conflict / PartialFailure / Store   │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError ← StoreError                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derives, never manual Display impls
//! 2. Context in every message (field name, limit)
//! 3. A validation failure means NOTHING was written

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write happens; a rejected input is never partially
/// applied.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. malformed UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A sale draft with no lines.
    #[error("sale must contain at least one line item")]
    EmptyCart,

    /// Too many line items in one sale.
    #[error("sale cannot have more than {max} line items")]
    TooManyLines { max: usize },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must be positive");

        assert_eq!(
            ValidationError::EmptyCart.to_string(),
            "sale must contain at least one line item"
        );
    }
}
