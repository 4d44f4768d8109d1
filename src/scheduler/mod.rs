//! Statement polling scheduler.
//!
//! One cooperative drive loop per process polls every eligible account at its
//! configured interval inside the daily business-hours window. Accounts are
//! never polled in parallel: the bank session is shared process-wide, so
//! every fetch (scheduled or manual) passes through a single capacity-1 lock.

mod state;
mod window;

pub use state::{SchedulerPhase, SchedulerState};
pub use window::BusinessWindow;

use crate::config::MonitorSettings;
use crate::error::{AppError, Result};
use crate::models::MonitoredAccount;
use crate::observability::metrics::monitor_metrics;
use crate::repositories::{AccountRegistry, TransactionStore};
use crate::services::{IngestService, NotificationDispatcher, ReconciliationService, StatementFetcher};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Scheduler tuning knobs, derived from `MonitorSettings`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub window: BusinessWindow,
    /// Interval applied when an account has no explicit override.
    pub default_poll_interval: Duration,
    /// Upper bound on idle sleeps, so window close and transient-failure
    /// retries are noticed promptly.
    pub max_check_interval: Duration,
    /// Backoff after a fault escapes the drive loop.
    pub recover_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window: BusinessWindow::default(),
            default_poll_interval: Duration::from_secs(300),
            max_check_interval: Duration::from_secs(30),
            recover_backoff: Duration::from_secs(30),
        }
    }
}

impl From<&MonitorSettings> for SchedulerConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            window: BusinessWindow::new(settings.window_start_hour, settings.window_end_hour),
            default_poll_interval: Duration::from_secs(settings.default_poll_interval_secs),
            max_check_interval: Duration::from_secs(settings.max_check_interval_secs),
            recover_backoff: Duration::from_secs(settings.recover_backoff_secs),
        }
    }
}

/// Aggregate result of a manual trigger, for the operator endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSummary {
    pub accounts_processed: usize,
    pub transactions_ingested: usize,
    pub notifications_created: usize,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub is_active: bool,
    pub next_window_opens_at: Option<DateTime<Local>>,
    pub monitored_account_count: usize,
    pub notified_today: usize,
}

/// Result of one account cycle.
#[derive(Debug, Default)]
struct CycleReport {
    fetch_failed: bool,
    ingested: usize,
    notifications: usize,
}

impl CycleReport {
    fn failed_fetch() -> Self {
        Self {
            fetch_failed: true,
            ..Self::default()
        }
    }
}

pub struct PollingScheduler {
    registry: Arc<dyn AccountRegistry>,
    fetcher: Arc<dyn StatementFetcher>,
    transactions: Arc<dyn TransactionStore>,
    ingestor: Arc<IngestService>,
    reconciliation: Arc<ReconciliationService>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: SchedulerConfig,
    state: RwLock<SchedulerState>,
    /// Capacity-1 lock serializing every call into the bank session. Tokio
    /// mutexes queue waiters in FIFO order, which gives manual triggers and
    /// scheduled cycles a fair, never-interleaved ordering.
    fetch_lock: Mutex<()>,
    started: AtomicBool,
}

impl PollingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn AccountRegistry>,
        fetcher: Arc<dyn StatementFetcher>,
        transactions: Arc<dyn TransactionStore>,
        ingestor: Arc<IngestService>,
        reconciliation: Arc<ReconciliationService>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            transactions,
            ingestor,
            reconciliation,
            notifier,
            config,
            state: RwLock::new(SchedulerState::new()),
            fetch_lock: Mutex::new(()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the supervise loop. Idempotent: a second call (e.g. a daily
    /// trigger racing process initialization) is a no-op returning None.
    pub fn start(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scheduler already started, ignoring duplicate start");
            return None;
        }
        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move { scheduler.run().await }))
    }

    /// Supervise loop: waits for the window, runs it, recovers from faults.
    /// Long-running for the life of the process; never returns.
    pub async fn run(self: Arc<Self>) {
        loop {
            if !self.config.window.is_open_now() {
                {
                    let mut state = self.state.write().await;
                    state.phase = SchedulerPhase::WaitingForWindow;
                }
                let until_open = self.config.window.time_until_open(Local::now());
                sleep(until_open.min(self.config.max_check_interval)).await;
                continue;
            }

            match self.run_window().await {
                Ok(()) => {
                    info!("polling window closed for the day");
                }
                Err(e) => {
                    error!(error = %e, "fault escaped the drive loop, backing off");
                    {
                        let mut state = self.state.write().await;
                        state.phase = SchedulerPhase::Recovering;
                    }
                    sleep(self.config.recover_backoff).await;
                }
            }
        }
    }

    /// One business-hours window: initial sequential pass over all eligible
    /// accounts, then the recurring drive loop until the window closes.
    async fn run_window(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.phase == SchedulerPhase::Running {
                return Ok(());
            }
            state.begin_window(Local::now().date_naive());
        }
        info!("polling window opened");

        let accounts = self.eligible_accounts().await?;
        for account in &accounts {
            if !self.config.window.is_open_now() {
                break;
            }
            self.cycle_and_record(account).await;
        }

        self.drive_loop().await?;

        {
            let mut state = self.state.write().await;
            state.phase = SchedulerPhase::Stopped;
        }
        Ok(())
    }

    /// Recurring due-check loop. Returns Ok when the window closes; any error
    /// escaping here sends the supervise loop through the recovery backoff.
    async fn drive_loop(&self) -> Result<()> {
        loop {
            if !self.config.window.is_open_now() {
                return Ok(());
            }

            let accounts = self.eligible_accounts().await?;
            let now = Instant::now();

            // Accounts with no recorded run are due immediately (fresh window
            // or added mid-window).
            let mut due_at: Vec<(MonitoredAccount, Instant)> = {
                let state = self.state.read().await;
                accounts
                    .into_iter()
                    .map(|account| {
                        let due = state
                            .last_run(account.id)
                            .map(|last| {
                                last + account
                                    .poll_interval(self.config.default_poll_interval.as_secs())
                            })
                            .unwrap_or(now);
                        (account, due)
                    })
                    .collect()
            };
            due_at.sort_by_key(|(_, due)| *due);

            let due: Vec<MonitoredAccount> = due_at
                .iter()
                .filter(|(_, due)| *due <= now)
                .map(|(account, _)| account.clone())
                .collect();

            if due.is_empty() {
                let sleep_for = due_at
                    .first()
                    .map(|(_, soonest)| soonest.saturating_duration_since(now))
                    .unwrap_or(self.config.max_check_interval)
                    .min(self.config.max_check_interval);
                sleep(sleep_for).await;
                continue;
            }

            let mut any_fetch_failure = false;
            for account in &due {
                if !self.config.window.is_open_now() {
                    return Ok(());
                }
                if self.cycle_and_record(account).await {
                    any_fetch_failure = true;
                }
            }

            if any_fetch_failure {
                // Failed accounts stay due; pace the retry instead of
                // hammering the bank on every pass.
                sleep(self.config.max_check_interval).await;
            }
        }
    }

    /// Runs one cycle, containing any error to this account, and records the
    /// execution unless the fetch failed transiently (a failed account must
    /// stay due). Returns true when the fetch failed.
    async fn cycle_and_record(&self, account: &MonitoredAccount) -> bool {
        match self.run_cycle(account).await {
            Ok(report) if report.fetch_failed => true,
            Ok(_) => {
                let mut state = self.state.write().await;
                state.record_run(account.id);
                false
            }
            Err(e) => {
                error!(
                    account_id = %account.id,
                    error = %e,
                    "cycle failed, continuing with next account"
                );
                // Record anyway so a persistently broken account does not
                // starve the others by staying due forever.
                let mut state = self.state.write().await;
                state.record_run(account.id);
                false
            }
        }
    }

    /// fetch → ingest → auto-match → notify, in that order, for one account.
    async fn run_cycle(&self, account: &MonitoredAccount) -> Result<CycleReport> {
        let records = {
            let _guard = self.fetch_lock.lock().await;
            let today = Local::now().date_naive();
            let fetch_started = Instant::now();
            match self.fetcher.fetch(account, today, today).await {
                Ok(records) => {
                    monitor_metrics()
                        .record_fetch_latency(fetch_started.elapsed().as_secs_f64() * 1000.0);
                    records
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        account_id = %account.id,
                        error = %e,
                        "transient statement fetch failure, account stays due"
                    );
                    monitor_metrics().record_cycle(true);
                    return Ok(CycleReport::failed_fetch());
                }
                Err(e) => return Err(e),
            }
            // Lock released here; ingestion and matching do not touch the
            // bank session.
        };

        let outcome = self.ingestor.ingest(account.id, records).await?;

        for transaction in outcome.saved.iter().filter(|t| t.direction.is_allocatable()) {
            if let Err(e) = self.reconciliation.auto_match(transaction.id).await {
                error!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "auto-match failed, leaving transaction for manual allocation"
                );
            }
        }

        let notifications = self.notify_outstanding(&outcome).await?;

        monitor_metrics().record_cycle(false);
        monitor_metrics().record_notifications(notifications);

        Ok(CycleReport {
            fetch_failed: false,
            ingested: outcome.saved.len(),
            notifications,
        })
    }

    /// Notifies every credit seen by this fetch that is still not settled and
    /// not yet in today's dedup set.
    async fn notify_outstanding(&self, outcome: &crate::services::IngestOutcome) -> Result<usize> {
        let epsilon = self.reconciliation.epsilon();
        let mut notifications = 0;

        for transaction in outcome
            .saved
            .iter()
            .chain(outcome.duplicates.iter())
            .filter(|t| t.direction.is_allocatable())
        {
            // Reload: auto-match may have settled it a moment ago.
            let current = self
                .transactions
                .find_by_id(transaction.id)
                .await?
                .unwrap_or_else(|| transaction.clone());
            if current.is_fully_settled(epsilon) {
                continue;
            }

            let newly_notified = {
                let mut state = self.state.write().await;
                state.mark_notified(current.id)
            };
            if !newly_notified {
                continue;
            }

            match self.notifier.credit_received(&current).await {
                Ok(()) => notifications += 1,
                // Stays in the dedup set; a flapping dispatcher must not
                // cause a notification storm.
                Err(e) => warn!(
                    transaction_id = %current.id,
                    error = %e,
                    "notification dispatch failed"
                ),
            }
        }

        Ok(notifications)
    }

    /// On-demand execution outside the normal timer. Respects the window and
    /// the fetch lock; updates cadence bookkeeping like any other cycle.
    pub async fn manual_trigger(&self) -> Result<TriggerSummary> {
        if !self.config.window.is_open_now() {
            return Err(AppError::Validation(
                "outside the business-hours window".to_string(),
            ));
        }

        let accounts = self.eligible_accounts().await?;
        let mut summary = TriggerSummary::default();

        for account in &accounts {
            match self.run_cycle(account).await {
                Ok(report) => {
                    summary.accounts_processed += 1;
                    summary.transactions_ingested += report.ingested;
                    summary.notifications_created += report.notifications;
                    if !report.fetch_failed {
                        let mut state = self.state.write().await;
                        state.record_run(account.id);
                    }
                }
                Err(e) => {
                    error!(
                        account_id = %account.id,
                        error = %e,
                        "manual cycle failed, continuing with next account"
                    );
                }
            }
        }

        Ok(summary)
    }

    pub async fn status(&self) -> Result<MonitorStatus> {
        let accounts = self.registry.monitored_accounts().await?;
        let state = self.state.read().await;
        let now = Local::now();

        Ok(MonitorStatus {
            is_active: state.phase == SchedulerPhase::Running,
            next_window_opens_at: if self.config.window.is_open_at(now) {
                None
            } else {
                Some(self.config.window.next_open_at(now))
            },
            monitored_account_count: accounts.len(),
            notified_today: state.notified_today(),
        })
    }

    pub async fn phase(&self) -> SchedulerPhase {
        self.state.read().await.phase
    }

    pub async fn last_run_wall(&self, account_id: Uuid) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.read().await.last_run_wall(account_id)
    }

    async fn eligible_accounts(&self) -> Result<Vec<MonitoredAccount>> {
        let accounts = self.registry.monitored_accounts().await?;
        Ok(accounts.into_iter().filter(|a| a.is_eligible()).collect())
    }
}
