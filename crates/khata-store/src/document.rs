//! # Document Model
//!
//! The schemaless document shape every backend speaks, plus the query AST
//! filters compile from.
//!
//! ## Document Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Document                                                               │
//! │                                                                         │
//! │  collection  "sales"              ← which aggregate                     │
//! │  id          "8f3c…" or "s1:0"   ← UUID v4 or deterministic            │
//! │  payload     { JSON }             ← the serialized entity               │
//! │  version     7                    ← bumped on every update (CAS)        │
//! │  created_at  2026-08-27T09:15:…   ← ordering + retention cutoff        │
//! │                                                                         │
//! │  The store never looks inside `payload` except through `Filter`s,      │
//! │  which compile to json_extract on SQLite and value lookups in memory.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Collection Names
// =============================================================================

/// The fixed set of collections the ledger uses.
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const CUSTOMERS: &str = "customers";
    pub const SALES: &str = "sales";
    pub const SALE_ITEMS: &str = "sale_items";
    pub const PAYMENTS: &str = "payments";
    pub const MOBILE_BANKING: &str = "mobile_banking_logs";
    pub const SETTINGS: &str = "settings";
    pub const STOCK_MOVEMENTS: &str = "stock_movements";
}

// =============================================================================
// Timestamps
// =============================================================================

/// Fixed-width RFC 3339 with microseconds, so the stored TEXT column sorts
/// lexicographically in chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Formats a timestamp for storage.
#[inline]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
pub fn parse_timestamp(collection: &str, id: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::CorruptTimestamp {
            collection: collection.to_string(),
            id: id.to_string(),
            raw: raw.to_string(),
        })
}

// =============================================================================
// Document
// =============================================================================

/// A stored document, as every backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub payload: Value,
    /// Starts at 1 on insert, bumped on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Deserializes the payload into a typed entity.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// A document to be inserted.
///
/// `created_at` is explicit (not "now") so repositories store the entity's
/// own timestamp and tests can plant historical documents.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub collection: String,
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    /// Builds a NewDocument from a serializable entity.
    pub fn encode<T: Serialize>(
        collection: &str,
        id: &str,
        entity: &T,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Self> {
        Ok(NewDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            payload: serde_json::to_value(entity)?,
            created_at,
        })
    }
}

/// A typed entity together with the document version it was read at.
///
/// The version is the CAS token: pass it back on update and the write only
/// lands if nobody else wrote in between.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: i64) -> Self {
        Versioned { value, version }
    }
}

// =============================================================================
// Query AST
// =============================================================================

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    /// SQL spelling of the operator.
    pub const fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// One predicate on a payload field (or on `created_at`, which backends map
/// to the indexed column instead of the payload).
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Filter {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Filter::new(field, FilterOp::Eq, value)
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Filter::new(field, FilterOp::Gt, value)
    }

    /// created_at ≥ ts, against the column.
    pub fn created_at_from(ts: DateTime<Utc>) -> Self {
        Filter::new(
            "created_at",
            FilterOp::Ge,
            Value::String(format_timestamp(ts)),
        )
    }

    /// created_at < ts, against the column. Retention cutoffs use this.
    pub fn created_before(ts: DateTime<Utc>) -> Self {
        Filter::new(
            "created_at",
            FilterOp::Lt,
            Value::String(format_timestamp(ts)),
        )
    }
}

/// Result ordering. Ties break on id so pagination is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    CreatedAtAsc,
    CreatedAtDesc,
}

/// A filtered, ordered, paginated read over one collection.
///
/// ## Example
/// ```rust
/// use khata_store::document::{collections, Filter, Query, SortOrder};
/// use serde_json::json;
///
/// let q = Query::new(collections::PAYMENTS)
///     .filter(Filter::eq("customer_id", json!("c1")))
///     .order(SortOrder::CreatedAtDesc)
///     .limit(20)
///     .offset(40);
/// assert_eq!(q.collection, "payments");
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order: SortOrder,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Query {
            collection: collection.into(),
            filters: Vec::new(),
            order: SortOrder::default(),
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 27, 9, 15, 30).unwrap();
        let raw = format_timestamp(ts);
        assert_eq!(raw, "2026-08-27T09:15:30.000000Z");
        assert_eq!(parse_timestamp("sales", "s1", &raw).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2026, 8, 27, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 8, 27, 10, 0, 0).unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let err = parse_timestamp("sales", "s1", "yesterday-ish").unwrap_err();
        assert!(matches!(err, StoreError::CorruptTimestamp { .. }));
    }

    #[test]
    fn test_query_builder() {
        let q = Query::new("sales")
            .filter(Filter::eq("customer_id", serde_json::json!("c1")))
            .order(SortOrder::CreatedAtDesc)
            .limit(10);

        assert_eq!(q.collection, "sales");
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.offset, None);
    }
}
