use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use uuid::Uuid;

/// Lifecycle of the process-wide polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No window active; re-arms at the next window open.
    Stopped,
    /// Process is up but the current local time is outside the window.
    WaitingForWindow,
    Running,
    /// A fault escaped the drive loop; backing off before re-entering.
    Recovering,
}

/// Per-process scheduler bookkeeping.
///
/// Deliberately not persisted: a restart re-derives due times from the wall
/// clock, so each account's cadence restarts at "now". Single writer (the
/// drive loop); readers only take snapshots for the status endpoint.
pub struct SchedulerState {
    pub phase: SchedulerPhase,
    /// Monotonic instant of each account's last completed cycle.
    last_run: HashMap<Uuid, Instant>,
    /// Wall-clock mirror of `last_run`, for reporting only.
    last_run_wall: HashMap<Uuid, DateTime<Utc>>,
    /// Credit transactions already notified within the current business day.
    notified_today: HashSet<Uuid>,
    /// Day the dedup set belongs to; re-entry after recovery within the same
    /// day must not clear it.
    window_day: Option<NaiveDate>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            phase: SchedulerPhase::Stopped,
            last_run: HashMap::new(),
            last_run_wall: HashMap::new(),
            notified_today: HashSet::new(),
            window_day: None,
        }
    }

    /// Prepares the state for a window entry. The notification dedup set is
    /// reset only when the business day changed.
    pub fn begin_window(&mut self, today: NaiveDate) {
        if self.window_day != Some(today) {
            self.notified_today.clear();
            self.window_day = Some(today);
        }
        self.phase = SchedulerPhase::Running;
    }

    pub fn record_run(&mut self, account_id: Uuid) {
        self.last_run.insert(account_id, Instant::now());
        self.last_run_wall.insert(account_id, Utc::now());
    }

    pub fn last_run(&self, account_id: Uuid) -> Option<Instant> {
        self.last_run.get(&account_id).copied()
    }

    pub fn last_run_wall(&self, account_id: Uuid) -> Option<DateTime<Utc>> {
        self.last_run_wall.get(&account_id).copied()
    }

    /// Inserts into the daily dedup set; false when already notified today.
    pub fn mark_notified(&mut self, transaction_id: Uuid) -> bool {
        self.notified_today.insert(transaction_id)
    }

    pub fn notified_today(&self) -> usize {
        self.notified_today.len()
    }
}
