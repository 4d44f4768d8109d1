#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use statement_monitor::error::{AppError, Result};
use statement_monitor::models::{BankTransaction, MonitoredAccount, RawStatementRecord};
use statement_monitor::repositories::{
    AccountRegistry, AllocationStore, InMemoryOrderDirectory, InMemoryStatementStore,
    StaticAccountRegistry, TransactionStore,
};
use statement_monitor::scheduler::{BusinessWindow, PollingScheduler, SchedulerConfig};
use statement_monitor::services::{
    IngestService, NotificationDispatcher, ReconciliationService, StatementFetcher,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// One scripted fetch result.
pub enum FetchScript {
    Records(Vec<RawStatementRecord>),
    Transient,
}

/// Statement fetcher driven by a queue of scripted results. When the queue
/// runs dry it keeps returning empty statements, so a free-running scheduler
/// stays harmless.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<VecDeque<FetchScript>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial duration to every fetch, for overlap tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, script: FetchScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_records(&self, records: Vec<RawStatementRecord>) {
        self.push(FetchScript::Records(records));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches ever observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatementFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _account: &MonitoredAccount,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<RawStatementRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.scripts.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Some(FetchScript::Records(records)) => Ok(records),
            Some(FetchScript::Transient) => {
                Err(AppError::Transient("scripted fetch failure".to_string()))
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Dispatcher that records which transactions were notified.
#[derive(Default)]
pub struct RecordingDispatcher {
    notified: Mutex<Vec<Uuid>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<Uuid> {
        self.notified.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.notified.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn credit_received(&self, transaction: &BankTransaction) -> Result<()> {
        self.notified.lock().unwrap().push(transaction.id);
        Ok(())
    }
}

/// Account registry that fails a configured number of reads before delegating.
pub struct FlakyRegistry {
    inner: StaticAccountRegistry,
    failures_remaining: AtomicUsize,
}

impl FlakyRegistry {
    pub fn new(accounts: Vec<MonitoredAccount>, failures: usize) -> Self {
        Self {
            inner: StaticAccountRegistry::new(accounts),
            failures_remaining: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl AccountRegistry for FlakyRegistry {
    async fn monitored_accounts(&self) -> Result<Vec<MonitoredAccount>> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::Transient("registry unavailable".to_string()));
        }
        self.inner.monitored_accounts().await
    }
}

/// A window that is open at every hour, for clock-independent tests.
pub fn always_open() -> BusinessWindow {
    BusinessWindow::new(0, 24)
}

/// A window that never opens.
pub fn never_open() -> BusinessWindow {
    BusinessWindow::new(9, 9)
}

pub fn fast_config(window: BusinessWindow) -> SchedulerConfig {
    SchedulerConfig {
        window,
        default_poll_interval: Duration::from_secs(300),
        max_check_interval: Duration::from_secs(30),
        recover_backoff: Duration::from_secs(30),
    }
}

/// Wired-up in-memory service graph.
pub struct TestEnv {
    pub store: Arc<InMemoryStatementStore>,
    pub orders: Arc<InMemoryOrderDirectory>,
    pub registry: Arc<StaticAccountRegistry>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub ingestor: Arc<IngestService>,
    pub reconciliation: Arc<ReconciliationService>,
    accounts: Mutex<Vec<MonitoredAccount>>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_fetcher(ScriptedFetcher::new())
    }

    pub fn with_fetcher(fetcher: ScriptedFetcher) -> Self {
        let store = Arc::new(InMemoryStatementStore::new());
        let orders = Arc::new(InMemoryOrderDirectory::new());
        let registry = Arc::new(StaticAccountRegistry::new(Vec::new()));
        let dispatcher = Arc::new(RecordingDispatcher::new());

        let transactions: Arc<dyn TransactionStore> = store.clone();
        let allocations: Arc<dyn AllocationStore> = store.clone();

        let ingestor = Arc::new(IngestService::new(transactions.clone()));
        let reconciliation = Arc::new(ReconciliationService::new(
            transactions,
            allocations,
            orders.clone(),
            Decimal::new(1, 2),
        ));

        Self {
            store,
            orders,
            registry,
            fetcher: Arc::new(fetcher),
            dispatcher,
            ingestor,
            reconciliation,
            accounts: Mutex::new(Vec::new()),
        }
    }

    pub fn add_account(&self, account: MonitoredAccount) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.push(account);
        self.registry.replace(accounts.clone());
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> Arc<PollingScheduler> {
        Arc::new(PollingScheduler::new(
            self.registry.clone(),
            self.fetcher.clone(),
            self.store.clone(),
            self.ingestor.clone(),
            self.reconciliation.clone(),
            self.dispatcher.clone(),
            config,
        ))
    }

    pub fn scheduler_with_registry(
        &self,
        registry: Arc<dyn AccountRegistry>,
        config: SchedulerConfig,
    ) -> Arc<PollingScheduler> {
        Arc::new(PollingScheduler::new(
            registry,
            self.fetcher.clone(),
            self.store.clone(),
            self.ingestor.clone(),
            self.reconciliation.clone(),
            self.dispatcher.clone(),
            config,
        ))
    }
}
