mod common;

use common::TestEnv;
use rust_decimal_macros::dec;
use statement_monitor::models::{RawStatementRecord, TransactionDirection};
use uuid::Uuid;

#[tokio::test]
async fn test_refetching_same_window_is_idempotent() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();

    let records = vec![
        RawStatementRecord::credit("BX-1", dec!(500), "01/08/2026 10:30:00"),
        RawStatementRecord::debit("BX-2", dec!(80), "01/08/2026 11:00:00"),
    ];

    let first = env.ingestor.ingest(account_id, records.clone()).await.unwrap();
    assert_eq!(first.saved.len(), 2);
    assert_eq!(first.duplicate_count(), 0);

    let second = env.ingestor.ingest(account_id, records).await.unwrap();
    assert_eq!(second.saved.len(), 0);
    assert_eq!(second.duplicate_count(), 2);
    assert_eq!(env.store.transaction_count(), 2);
}

#[tokio::test]
async fn test_missing_bank_id_gets_stable_derived_id() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();

    let mut record = RawStatementRecord::credit("unused", dec!(250), "02/08/2026 09:00:00")
        .with_counterparty("Green Valley Farms", "98765432000109");
    record.bank_id = None;

    let first = env.ingestor.ingest(account_id, vec![record.clone()]).await.unwrap();
    assert_eq!(first.saved.len(), 1);
    assert!(first.saved[0].external_id.starts_with("derived-"));

    // Same record delivered again, still without a bank id: dedups.
    let second = env.ingestor.ingest(account_id, vec![record]).await.unwrap();
    assert_eq!(second.saved.len(), 0);
    assert_eq!(second.duplicate_count(), 1);
}

#[tokio::test]
async fn test_direction_is_preserved_and_debits_never_match() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();

    let outcome = env
        .ingestor
        .ingest(
            account_id,
            vec![RawStatementRecord::debit("BX-D", dec!(120), "03/08/2026 14:00:00")
                .with_counterparty("Seed Supplier", "11222333000144")],
        )
        .await
        .unwrap();

    let debit = &outcome.saved[0];
    assert_eq!(debit.direction, TransactionDirection::Debit);
    assert!(!debit.direction.is_allocatable());

    // Even with a perfectly matching order, a debit is never auto-matched.
    env.orders.upsert(statement_monitor::models::OpenOrder::new(
        Some("11222333000144".to_string()),
        dec!(120),
    ));
    let link = env.reconciliation.auto_match(debit.id).await.unwrap();
    assert!(link.is_none());
}

#[tokio::test]
async fn test_unparseable_posted_at_falls_back_with_note() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();
    let before = chrono::Utc::now();

    let outcome = env
        .ingestor
        .ingest(
            account_id,
            vec![
                RawStatementRecord::credit("BX-BAD", dec!(300), "not-a-date"),
                RawStatementRecord::credit("BX-OK", dec!(400), "04/08/2026 08:00:00"),
            ],
        )
        .await
        .unwrap();

    // One malformed timestamp never poisons the rest of the batch.
    assert_eq!(outcome.saved.len(), 2);

    let bad = outcome.saved.iter().find(|t| t.external_id == "BX-BAD").unwrap();
    assert!(bad.posted_at >= before);
    assert!(bad
        .provenance_note
        .as_deref()
        .unwrap()
        .contains("not-a-date"));

    let ok = outcome.saved.iter().find(|t| t.external_id == "BX-OK").unwrap();
    assert!(ok.provenance_note.is_none());
    assert_eq!(ok.posted_at.date_naive().to_string(), "2026-08-04");
}

#[tokio::test]
async fn test_non_positive_amounts_are_skipped() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();

    let outcome = env
        .ingestor
        .ingest(
            account_id,
            vec![
                RawStatementRecord::credit("BX-Z", dec!(0), "05/08/2026 10:00:00"),
                RawStatementRecord::credit("BX-N", dec!(-10), "05/08/2026 10:00:00"),
                RawStatementRecord::credit("BX-P", dec!(75), "05/08/2026 10:00:00"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.saved.len(), 1);
    assert_eq!(env.store.transaction_count(), 1);
}

#[tokio::test]
async fn test_all_known_posted_at_formats() {
    let env = TestEnv::new();
    let account_id = Uuid::new_v4();

    let outcome = env
        .ingestor
        .ingest(
            account_id,
            vec![
                RawStatementRecord::credit("F1", dec!(10), "01/08/2026 10:30:00"),
                RawStatementRecord::credit("F2", dec!(10), "01/08/202610:30:00"),
                RawStatementRecord::credit("F3", dec!(10), "01.08.2026 10:30:00"),
                RawStatementRecord::credit("F4", dec!(10), "01.08.202610:30:00"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.saved.len(), 4);
    for tx in &outcome.saved {
        assert!(tx.provenance_note.is_none(), "{} fell back", tx.external_id);
        assert_eq!(tx.posted_at.date_naive().to_string(), "2026-08-01");
    }
}
