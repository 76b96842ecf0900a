//! # Report Aggregator
//!
//! Read-only summaries over sales, banking, stock and dues.
//!
//! Every figure is recomputed from the documents on each call. Nothing here
//! maintains a running counter that could drift from the ledger after a
//! partial failure; the documents are the only source of truth.
//!
//! Day and month windows are half-open UTC ranges: `[start, next_start)`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use khata_core::error::ValidationError;
use khata_core::money::Money;
use khata_core::types::{
    Customer, MobileBankingTransaction, Product, Sale, TxnKind,
};
use khata_store::Store;

use crate::error::LedgerResult;

/// Page size used when a report has to walk a whole window.
const SCAN_PAGE: u32 = 500;

// =============================================================================
// Report Types
// =============================================================================

/// Sales figures over one window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SalesSummary {
    pub count: u64,
    /// Sum of sale totals (after discount).
    pub revenue: Money,
    pub paid: Money,
    pub due: Money,
    pub profit: Money,
}

/// Mobile-banking figures over one window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BankingSummary {
    pub cash_in: Money,
    pub cash_out: Money,
    pub recharge: Money,
    pub commission: Money,
}

/// One window's combined report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sales: SalesSummary,
    pub banking: BankingSummary,
}

/// One product's shelf state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockEntry {
    pub product: Product,
    pub low: bool,
}

/// One customer's outstanding due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEntry {
    pub customer_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub due: Money,
}

// =============================================================================
// ReportAggregator
// =============================================================================

#[derive(Clone)]
pub struct ReportAggregator {
    store: Store,
}

impl ReportAggregator {
    pub fn new(store: Store) -> Self {
        ReportAggregator { store }
    }

    /// One calendar day (UTC).
    pub async fn daily(&self, date: NaiveDate) -> LedgerResult<PeriodReport> {
        let start = day_start(date);
        self.period(start, start + Duration::days(1)).await
    }

    /// One calendar month (UTC).
    pub async fn monthly(&self, year: i32, month: u32) -> LedgerResult<PeriodReport> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            }
        })?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        })?;

        self.period(day_start(start), day_start(next)).await
    }

    /// Sales of one day, newest first, paginated.
    pub async fn sales_for_day(
        &self,
        date: NaiveDate,
        limit: u32,
        offset: u32,
    ) -> LedgerResult<Vec<Sale>> {
        let start = day_start(date);
        Ok(self
            .store
            .sales()
            .between(start, start + Duration::days(1), Some(limit), Some(offset))
            .await?)
    }

    /// Banking transactions of one day, in chain order, paginated.
    pub async fn banking_for_day(
        &self,
        date: NaiveDate,
        limit: u32,
        offset: u32,
    ) -> LedgerResult<Vec<MobileBankingTransaction>> {
        let start = day_start(date);
        let all = self
            .store
            .banking()
            .between(start, start + Duration::days(1))
            .await?;
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    /// Every product, lowest stock first, flagged at its threshold.
    pub async fn stock_status(&self) -> LedgerResult<Vec<StockEntry>> {
        let mut products = self.store.products().all().await?;
        products.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(products
            .into_iter()
            .map(|product| StockEntry {
                low: product.is_low_stock(),
                product,
            })
            .collect())
    }

    /// Only the products at or below their threshold.
    pub async fn low_stock(&self) -> LedgerResult<Vec<StockEntry>> {
        Ok(self
            .stock_status()
            .await?
            .into_iter()
            .filter(|entry| entry.low)
            .collect())
    }

    /// Customers with outstanding due, largest first.
    pub async fn due_summary(&self) -> LedgerResult<Vec<DueEntry>> {
        let mut customers: Vec<Customer> = self.store.customers().with_due().await?;
        customers.sort_by(|a, b| b.total_due.cmp(&a.total_due).then_with(|| a.name.cmp(&b.name)));
        Ok(customers
            .into_iter()
            .map(|c| DueEntry {
                customer_id: c.id,
                name: c.name,
                phone: c.phone,
                due: c.total_due,
            })
            .collect())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn period(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> LedgerResult<PeriodReport> {
        let mut sales = SalesSummary::default();
        let mut offset = 0u32;
        loop {
            let page = self
                .store
                .sales()
                .between(start, end, Some(SCAN_PAGE), Some(offset))
                .await?;
            let page_len = page.len() as u32;
            for sale in page {
                sales.count += 1;
                sales.revenue += sale.total;
                sales.paid += sale.paid;
                sales.due += sale.due;
                sales.profit += sale.profit;
            }
            if page_len < SCAN_PAGE {
                break;
            }
            offset += page_len;
        }

        let mut banking = BankingSummary::default();
        for txn in self.store.banking().between(start, end).await? {
            match txn.kind {
                TxnKind::CashIn => banking.cash_in += txn.amount,
                TxnKind::CashOut => banking.cash_out += txn.amount,
                TxnKind::Recharge => banking.recharge += txn.amount,
            }
            banking.commission += txn.commission;
        }

        Ok(PeriodReport {
            start,
            end,
            sales,
            banking,
        })
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use khata_core::quantity::Quantity;
    use khata_core::types::{PaymentMethod, Sale};

    fn sale_at(id: &str, created_at: DateTime<Utc>, total: i64, profit: i64) -> Sale {
        Sale {
            id: id.to_string(),
            customer_id: None,
            customer_name: None,
            subtotal: Money::from_taka(total),
            discount: Money::zero(),
            total: Money::from_taka(total),
            paid: Money::from_taka(total),
            due: Money::zero(),
            due_accrued: false,
            profit: Money::from_taka(profit),
            method: PaymentMethod::Cash,
            created_at,
            updated_at: created_at,
        }
    }

    fn product(id: &str, name: &str, stock: i64, threshold: i64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            buy_price: Money::from_taka(70),
            sell_price: Money::from_taka(80),
            stock: Quantity::from_whole(stock),
            low_stock_threshold: Quantity::from_whole(threshold),
            unit: "pc".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_daily_window_is_half_open() {
        let store = Store::memory();
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let inside = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
        let next_midnight = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();

        store.sales().insert(&sale_at("s1", inside, 100, 10)).await.unwrap();
        store.sales().insert(&sale_at("s2", next_midnight, 999, 99)).await.unwrap();

        let report = ReportAggregator::new(store).daily(day).await.unwrap();
        assert_eq!(report.sales.count, 1);
        assert_eq!(report.sales.revenue, Money::from_taka(100));
        assert_eq!(report.sales.profit, Money::from_taka(10));
    }

    #[tokio::test]
    async fn test_monthly_sums_whole_month() {
        let store = Store::memory();
        for day in [1, 15, 28] {
            let at = Utc.with_ymd_and_hms(2026, 2, day, 12, 0, 0).unwrap();
            store
                .sales()
                .insert(&sale_at(&format!("s{day}"), at, 50, 5))
                .await
                .unwrap();
        }
        // March sale excluded
        let march = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        store.sales().insert(&sale_at("s-out", march, 500, 50)).await.unwrap();

        let report = ReportAggregator::new(store).monthly(2026, 2).await.unwrap();
        assert_eq!(report.sales.count, 3);
        assert_eq!(report.sales.revenue, Money::from_taka(150));
    }

    #[tokio::test]
    async fn test_invalid_month_rejected() {
        let store = Store::memory();
        assert!(ReportAggregator::new(store).monthly(2026, 13).await.is_err());
    }

    #[tokio::test]
    async fn test_stock_status_sorted_and_flagged() {
        let store = Store::memory();
        store.products().insert(&product("p1", "Rice", 20, 5)).await.unwrap();
        store.products().insert(&product("p2", "Salt", 2, 5)).await.unwrap();
        store.products().insert(&product("p3", "Oil", 5, 5)).await.unwrap();

        let reports = ReportAggregator::new(store);
        let status = reports.stock_status().await.unwrap();
        assert_eq!(
            status.iter().map(|e| e.product.id.as_str()).collect::<Vec<_>>(),
            vec!["p2", "p3", "p1"]
        );
        // At the threshold counts as low
        assert!(status[0].low && status[1].low && !status[2].low);

        let low = reports.low_stock().await.unwrap();
        assert_eq!(low.len(), 2);
    }

    #[tokio::test]
    async fn test_due_summary_descending() {
        let store = Store::memory();
        for (id, name, due) in [("c1", "Anik", 50), ("c2", "Borsha", 300), ("c3", "Chitra", 0)] {
            store
                .customers()
                .insert(&Customer {
                    id: id.to_string(),
                    name: name.to_string(),
                    phone: None,
                    address: None,
                    notes: None,
                    total_due: Money::from_taka(due),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let summary = ReportAggregator::new(store).due_summary().await.unwrap();
        assert_eq!(
            summary.iter().map(|e| e.customer_id.as_str()).collect::<Vec<_>>(),
            vec!["c2", "c1"]
        );
        assert_eq!(summary[0].due, Money::from_taka(300));
    }
}
