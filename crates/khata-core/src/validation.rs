//! # Validation Module
//!
//! Input validation for the ledger core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI / import boundary)                                │
//! │  └── Format checks, immediate feedback                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (pre-write business rules)                       │
//! │  └── A rejected input writes NOTHING — validation runs before the      │
//! │      first document is touched                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (version CAS, create-if-absent)                        │
//! │  └── Catches the races validation cannot                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::sale::SaleDraft;
use crate::{MAX_SALE_LINES, MAX_TEXT_LEN};

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, customer).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_TEXT_LEN` characters
///
/// ## Example
/// ```rust
/// use khata_core::validation::validate_name;
///
/// assert!(validate_name("Miniket Rice 5kg").is_ok());
/// assert!(validate_name("   ").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

/// Validates an optional free-text field (note, address).
pub fn validate_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

/// Validates a mobile-banking operator name.
pub fn validate_operator(operator: &str) -> ValidationResult<()> {
    if operator.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "operator".to_string(),
        });
    }

    Ok(())
}

/// Validates a document id.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a strictly positive money amount (payments, banking amounts).
///
/// ## Example
/// ```rust
/// use khata_core::money::Money;
/// use khata_core::validation::validate_positive_amount;
///
/// assert!(validate_positive_amount("amount", Money::from_taka(50)).is_ok());
/// assert!(validate_positive_amount("amount", Money::zero()).is_err());
/// ```
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a non-negative money amount (discounts, paid amounts, prices).
pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a line quantity: strictly positive.
pub fn validate_quantity(qty: Quantity) -> ValidationResult<()> {
    if !qty.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a commission rate in basis points (0% to 100%).
pub fn validate_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps >= 10000 {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: 9999,
        });
    }

    Ok(())
}

// =============================================================================
// Draft Validators
// =============================================================================

/// Validates a sale draft before the coordinator touches any document.
///
/// ## Rules
/// - At least one line, at most `MAX_SALE_LINES`
/// - Every line: non-empty product id, quantity > 0
/// - discount ≥ 0, paid ≥ 0
///
/// Product existence is checked by the coordinator against the store; this
/// function covers everything checkable without I/O.
pub fn validate_sale_draft(draft: &SaleDraft) -> ValidationResult<()> {
    if draft.lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    if draft.lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::TooManyLines {
            max: MAX_SALE_LINES,
        });
    }

    for line in &draft.lines {
        validate_id("product_id", &line.product_id)?;
        validate_quantity(line.quantity)?;
    }

    validate_non_negative_amount("discount", draft.discount)?;
    validate_non_negative_amount("paid", draft.paid)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
