use crate::error::{AppError, Result};
use crate::models::MonitoredAccount;
use async_trait::async_trait;
use sqlx::PgPool;

/// Source of the monitored account list.
///
/// Account configuration lives outside the core; the scheduler re-reads a
/// fresh snapshot every pass so edits take effect on the next poll.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    async fn monitored_accounts(&self) -> Result<Vec<MonitoredAccount>>;
}

/// Postgres-backed account registry.
pub struct PgAccountRegistry {
    pool: PgPool,
}

impl PgAccountRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRegistry for PgAccountRegistry {
    async fn monitored_accounts(&self) -> Result<Vec<MonitoredAccount>> {
        let rows = sqlx::query_as::<_, MonitoredAccount>(
            r#"
            SELECT id, branch_code, account_number, poll_interval_secs, has_valid_credentials
            FROM monitored_accounts
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
