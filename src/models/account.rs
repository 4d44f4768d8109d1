use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A bank account under statement surveillance.
///
/// Owned by configuration; the core only reads snapshots, so interval changes
/// or credential revocation take effect on the next poll pass, not mid-cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoredAccount {
    pub id: Uuid,
    /// Bank branch/routing code. Opaque to the core.
    pub branch_code: String,
    /// Account number at the branch. Opaque to the core.
    pub account_number: String,
    /// Seconds between polls for this account.
    pub poll_interval_secs: i64,
    /// Accounts without valid statement credentials are skipped entirely.
    pub has_valid_credentials: bool,
}

impl MonitoredAccount {
    pub fn new(branch_code: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch_code: branch_code.into(),
            account_number: account_number.into(),
            poll_interval_secs: 300,
            has_valid_credentials: true,
        }
    }

    pub fn with_poll_interval(mut self, secs: i64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.has_valid_credentials = false;
        self
    }

    /// True when the scheduler should poll this account at all.
    pub fn is_eligible(&self) -> bool {
        self.has_valid_credentials
    }

    /// Effective poll interval, falling back to the configured default when
    /// the stored value is non-positive.
    pub fn poll_interval(&self, default_secs: u64) -> std::time::Duration {
        let secs = if self.poll_interval_secs > 0 {
            self.poll_interval_secs as u64
        } else {
            default_secs
        };
        std::time::Duration::from_secs(secs)
    }
}
