mod common;

use common::{always_open, fast_config, never_open, FetchScript, ScriptedFetcher, TestEnv};
use rust_decimal_macros::dec;
use statement_monitor::error::AppError;
use statement_monitor::models::{MonitoredAccount, OpenOrder, RawStatementRecord};
use statement_monitor::scheduler::SchedulerPhase;
use std::sync::Arc;
use std::time::Duration;

fn credit_record(bank_id: &str, tax_id: &str) -> RawStatementRecord {
    RawStatementRecord::credit(bank_id, dec!(500), "01/08/2026 10:30:00")
        .with_counterparty("Green Valley Farms", tax_id)
}

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_fetches_ingests_and_notifies() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));
    env.add_account(MonitoredAccount::new("0001", "99999-1"));
    env.fetcher.push_records(vec![credit_record("BX-1", "111")]);
    env.fetcher.push_records(vec![credit_record("BX-2", "222")]);

    let scheduler = env.scheduler(fast_config(always_open()));
    let summary = scheduler.manual_trigger().await.unwrap();

    assert_eq!(summary.accounts_processed, 2);
    assert_eq!(summary.transactions_ingested, 2);
    assert_eq!(summary.notifications_created, 2);
    assert_eq!(env.fetcher.calls(), 2);
    assert_eq!(env.store.transaction_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_rejected_outside_window() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));

    let scheduler = env.scheduler(fast_config(never_open()));
    let err = scheduler.manual_trigger().await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(env.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_waits_when_window_never_opens() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));

    let scheduler = env.scheduler(fast_config(never_open()));
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(scheduler.phase().await, SchedulerPhase::WaitingForWindow);
    assert_eq!(env.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_accounts_are_polled_at_their_own_interval() {
    let env = TestEnv::new();
    let fast = MonitoredAccount::new("0001", "12345-6").with_poll_interval(60);
    let slow = MonitoredAccount::new("0001", "99999-1").with_poll_interval(120);
    env.add_account(fast.clone());
    env.add_account(slow);

    let scheduler = env.scheduler(fast_config(always_open()));
    scheduler.start();

    // Initial pass polls both; then the 60s account twice more and the 120s
    // account once more within the first two minutes.
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(env.fetcher.calls(), 5);

    assert!(scheduler.last_run_wall(fast.id).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_fetches_never_overlap() {
    let fetcher = ScriptedFetcher::new().with_delay(Duration::from_millis(200));
    let env = TestEnv::with_fetcher(fetcher);
    env.add_account(MonitoredAccount::new("0001", "12345-6"));

    let scheduler = env.scheduler(fast_config(always_open()));

    let (a, b) = tokio::join!(scheduler.manual_trigger(), scheduler.manual_trigger());
    a.unwrap();
    b.unwrap();

    assert_eq!(env.fetcher.calls(), 2);
    assert_eq!(env.fetcher.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_failure_keeps_account_due() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));
    env.fetcher.push(FetchScript::Transient);
    env.fetcher.push_records(vec![credit_record("BX-R", "111")]);

    let scheduler = env.scheduler(fast_config(always_open()));
    scheduler.start();

    // The failed account is retried without waiting a full poll interval.
    tokio::time::sleep(Duration::from_secs(40)).await;

    assert!(env.fetcher.calls() >= 2);
    assert_eq!(env.store.transaction_count(), 1);
    assert_eq!(env.dispatcher.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_registry_outage() {
    let env = TestEnv::new();
    let registry = Arc::new(common::FlakyRegistry::new(
        vec![MonitoredAccount::new("0001", "12345-6")],
        1,
    ));

    let scheduler = env.scheduler_with_registry(registry, fast_config(always_open()));
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.phase().await, SchedulerPhase::Recovering);
    assert_eq!(env.fetcher.calls(), 0);

    // One recover backoff later the loop is polling again.
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(scheduler.phase().await, SchedulerPhase::Running);
    assert!(env.fetcher.calls() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_unsettled_credit_is_notified_once_per_day() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6").with_poll_interval(60));
    // The same statement line comes back on both polls.
    env.fetcher.push_records(vec![credit_record("BX-DUP", "111")]);
    env.fetcher.push_records(vec![credit_record("BX-DUP", "111")]);

    let scheduler = env.scheduler(fast_config(always_open()));
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(env.fetcher.calls() >= 2);
    assert_eq!(env.store.transaction_count(), 1);
    assert_eq!(env.dispatcher.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_matched_credit_is_not_notified() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));
    env.orders.upsert(OpenOrder::new(Some("111".to_string()), dec!(500)));
    env.fetcher.push_records(vec![credit_record("BX-M", "111")]);

    let scheduler = env.scheduler(fast_config(always_open()));
    scheduler.manual_trigger().await.unwrap();

    assert_eq!(env.store.link_count(), 1);
    assert_eq!(env.dispatcher.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_debits_are_stored_but_never_notified() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));
    env.fetcher.push_records(vec![RawStatementRecord::debit(
        "BX-D",
        dec!(80),
        "01/08/2026 11:00:00",
    )]);

    let scheduler = env.scheduler(fast_config(always_open()));
    let summary = scheduler.manual_trigger().await.unwrap();

    assert_eq!(summary.transactions_ingested, 1);
    assert_eq!(summary.notifications_created, 0);
    assert_eq!(env.dispatcher.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_accounts_without_credentials_are_skipped() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6").without_credentials());
    env.add_account(MonitoredAccount::new("0001", "99999-1"));

    let scheduler = env.scheduler(fast_config(always_open()));
    let summary = scheduler.manual_trigger().await.unwrap();

    assert_eq!(summary.accounts_processed, 1);
    assert_eq!(env.fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let env = TestEnv::new();
    let scheduler = env.scheduler(fast_config(never_open()));

    assert!(scheduler.start().is_some());
    assert!(scheduler.start().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_window_and_counts() {
    let env = TestEnv::new();
    env.add_account(MonitoredAccount::new("0001", "12345-6"));

    let scheduler = env.scheduler(fast_config(always_open()));
    let status = scheduler.status().await.unwrap();
    assert_eq!(status.monitored_account_count, 1);
    assert!(status.next_window_opens_at.is_none());
    assert!(!status.is_active);

    let closed = env.scheduler(fast_config(never_open()));
    let status = closed.status().await.unwrap();
    assert!(status.next_window_opens_at.is_some());
}
