//! End-to-end scenarios over the real SQLite backend.
//!
//! The unit tests in each module run on the in-memory store; these run the
//! whole stack the way a deployment does, one throwaway database file per
//! test.

use std::sync::Once;
use std::time::Duration;

use chrono::{Datelike, Utc};
use khata_core::money::Money;
use khata_core::quantity::Quantity;
use khata_core::sale::{DraftLine, SaleDraft};
use khata_core::types::{Customer, PaymentMethod, Product, TxnKind};
use khata_ledger::{Ledger, RetentionConfig};
use khata_store::{Store, StoreConfig};
use tempfile::TempDir;

static TRACING: Once = Once::new();

async fn open_ledger() -> (Ledger, TempDir) {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Store::sqlite(StoreConfig::new(dir.path().join("khata.db")))
        .await
        .unwrap();
    (Ledger::new(store), dir)
}

async fn seed_shop(ledger: &Ledger) {
    let now = Utc::now();
    ledger
        .store()
        .products()
        .insert(&Product {
            id: "rice".to_string(),
            name: "Miniket Rice".to_string(),
            buy_price: Money::from_taka(70),
            sell_price: Money::from_taka(80),
            stock: Quantity::from_whole(50),
            low_stock_threshold: Quantity::from_whole(5),
            unit: "kg".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    ledger
        .store()
        .customers()
        .insert(&Customer {
            id: "rahim".to_string(),
            name: "Rahim Uddin".to_string(),
            phone: Some("01711000000".to_string()),
            address: None,
            notes: None,
            total_due: Money::zero(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

fn rice_draft(customer: Option<&str>, kg: i64, paid_taka: i64) -> SaleDraft {
    SaleDraft {
        customer_id: customer.map(String::from),
        lines: vec![DraftLine {
            product_id: "rice".to_string(),
            quantity: Quantity::from_whole(kg),
        }],
        discount: Money::zero(),
        paid: Money::from_taka(paid_taka),
        method: PaymentMethod::Cash,
    }
}

#[tokio::test]
async fn credit_sale_then_collection_settles_the_book() {
    let (ledger, _dir) = open_ledger().await;
    seed_shop(&ledger).await;
    let coord = ledger.coordinator();

    // 3 kg on credit, ৳100 down: ৳140 goes on the book
    let sale = coord
        .record_sale(&rice_draft(Some("rahim"), 3, 100))
        .await
        .unwrap();
    assert_eq!(sale.due, Money::from_taka(140));

    let stock = ledger.store().products().get("rice").await.unwrap().value.stock;
    assert_eq!(stock, Quantity::from_whole(47));
    assert_eq!(
        ledger.accounts().current_due("rahim").await.unwrap(),
        Money::from_taka(140)
    );

    // Rahim clears the book a week later
    let new_due = coord
        .collect_payment("rahim", Money::from_taka(140), PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(new_due, Money::zero());

    // Two journal entries: the down payment and the collection
    let entries = ledger.journal().list_by_customer("rahim", 10, 0).await.unwrap();
    assert_eq!(entries.len(), 2);

    // And the day's report reflects the one sale
    let today = Utc::now().date_naive();
    let report = ledger.reports().daily(today).await.unwrap();
    assert_eq!(report.sales.count, 1);
    assert_eq!(report.sales.revenue, Money::from_taka(240));
    assert_eq!(report.sales.due, Money::from_taka(140));
}

#[tokio::test]
async fn banking_day_matches_the_rate_card() {
    let (ledger, _dir) = open_ledger().await;
    let banking = ledger.banking();

    let cash_in = banking
        .append(TxnKind::CashIn, "bkash", Money::from_taka(1000), None)
        .await
        .unwrap();
    assert_eq!(cash_in.commission, Money::from_taka(10));
    assert_eq!(cash_in.balance_after, Money::from_taka(1000));

    let cash_out = banking
        .append(TxnKind::CashOut, "bkash", Money::from_taka(400), None)
        .await
        .unwrap();
    assert_eq!(cash_out.commission, Money::from_poisha(740));
    assert_eq!(cash_out.balance_after, Money::from_taka(600));

    assert!(banking.verify_chain().await.unwrap().is_none());

    let now = Utc::now();
    let report = ledger.reports().monthly(now.year(), now.month()).await.unwrap();
    assert_eq!(report.banking.cash_in, Money::from_taka(1000));
    assert_eq!(report.banking.cash_out, Money::from_taka(400));
    assert_eq!(report.banking.commission, Money::from_poisha(1740));
}

#[tokio::test]
async fn retention_removes_only_expired_sales() {
    let (ledger, _dir) = open_ledger().await;
    seed_shop(&ledger).await;
    let coord = ledger.coordinator();

    coord.record_sale_with_id("fresh", &rice_draft(None, 1, 80)).await.unwrap();
    coord.record_sale_with_id("stale", &rice_draft(None, 2, 160)).await.unwrap();

    // Age the second sale past the window by rewriting its header; the
    // store keys retention on the indexed created_at column, so reinsert
    let stale = ledger.store().sales().get("stale").await.unwrap().value;
    ledger.store().sales().remove("stale").await.unwrap();
    let mut aged = stale;
    aged.created_at = Utc::now() - chrono::Duration::days(41);
    ledger.store().sales().insert(&aged).await.unwrap();

    let cleaner = ledger.cleaner(RetentionConfig::default());
    let stats = cleaner.run_once(Utc::now()).await.unwrap();
    assert_eq!(stats.sales, 1);

    assert!(ledger.store().sales().try_get("stale").await.unwrap().is_none());
    assert!(ledger.store().sales().try_get("fresh").await.unwrap().is_some());

    // Second pass with the same clock finds nothing
    assert_eq!(cleaner.run_once(Utc::now()).await.unwrap().total(), 0);
}

#[tokio::test]
async fn edit_and_delete_leave_no_residue() {
    let (ledger, _dir) = open_ledger().await;
    seed_shop(&ledger).await;
    let coord = ledger.coordinator();

    coord
        .record_sale_with_id("s1", &rice_draft(Some("rahim"), 2, 0))
        .await
        .unwrap();
    coord.edit_sale("s1", &rice_draft(Some("rahim"), 4, 0)).await.unwrap();

    assert_eq!(
        ledger.accounts().current_due("rahim").await.unwrap(),
        Money::from_taka(320)
    );
    let stock = ledger.store().products().get("rice").await.unwrap().value.stock;
    assert_eq!(stock, Quantity::from_whole(46));

    coord.delete_sale("s1").await.unwrap();

    let stock = ledger.store().products().get("rice").await.unwrap().value.stock;
    assert_eq!(stock, Quantity::from_whole(50));
    assert_eq!(
        ledger.accounts().current_due("rahim").await.unwrap(),
        Money::zero()
    );
    assert!(ledger.store().sales().lines_for("s1").await.unwrap().is_empty());
    assert!(ledger.store().payments().for_sale("s1").await.unwrap().is_empty());
    assert!(ledger.store().movements().for_sale("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_sales_on_one_product_lose_nothing() {
    let (ledger, _dir) = open_ledger().await;
    seed_shop(&ledger).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let coord = ledger.coordinator();
        handles.push(tokio::spawn(async move {
            coord
                .record_sale_with_id(&format!("c{n}"), &rice_draft(None, 1, 80))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stock = ledger.store().products().get("rice").await.unwrap().value.stock;
    assert_eq!(stock, Quantity::from_whole(42));

    let today = Utc::now().date_naive();
    let report = ledger.reports().daily(today).await.unwrap();
    assert_eq!(report.sales.count, 8);
}

#[tokio::test]
async fn bulk_import_feeds_the_reports() {
    let (ledger, _dir) = open_ledger().await;
    let bulk = ledger.bulk();

    let outcome = bulk
        .import_customers(&[
            khata_ledger::CustomerRecord {
                name: "Karim".to_string(),
                total_due: Money::from_taka(500),
                ..Default::default()
            },
            khata_ledger::CustomerRecord::default(), // skipped: no name
            khata_ledger::CustomerRecord {
                name: "Salma".to_string(),
                total_due: Money::from_taka(120),
                ..Default::default()
            },
        ])
        .await
        .unwrap();
    assert_eq!((outcome.imported, outcome.skipped), (2, 1));

    let dues = ledger.reports().due_summary().await.unwrap();
    assert_eq!(dues.len(), 2);
    assert_eq!(dues[0].name, "Karim");
    assert_eq!(dues[0].due, Money::from_taka(500));
}

#[tokio::test]
async fn cleaner_runs_periodically_until_shutdown() {
    let (ledger, _dir) = open_ledger().await;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let cleaner = ledger.cleaner(RetentionConfig::default());
    let handle = tokio::spawn(cleaner.run_periodic(Duration::from_millis(20), rx));

    tokio::time::sleep(Duration::from_millis(60)).await;
    tx.send(()).await.unwrap();
    handle.await.unwrap();
}
