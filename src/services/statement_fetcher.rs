use crate::error::{AppError, Result};
use crate::models::{MonitoredAccount, RawStatementRecord};
use crate::observability::logging::mask_account_number;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

/// Fetches raw statement records for an account and date range.
///
/// The bank session is shared per process and must never be used
/// concurrently; the scheduler serializes every call through its fetch lock.
/// Implementations report network, timeout and bank-side failures as
/// `AppError::Transient`.
#[async_trait]
pub trait StatementFetcher: Send + Sync {
    async fn fetch(
        &self,
        account: &MonitoredAccount,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawStatementRecord>>;
}

/// Statement fetcher over the bank's HTTP statement API.
///
/// Session authentication (mTLS client certificates, OAuth token refresh) is
/// handled by the gateway this client talks to, not here.
pub struct HttpStatementFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatementFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl StatementFetcher for HttpStatementFetcher {
    async fn fetch(
        &self,
        account: &MonitoredAccount,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawStatementRecord>> {
        let url = format!(
            "{}/branches/{}/accounts/{}/statements",
            self.base_url, account.branch_code, account.account_number
        );

        debug!(
            account_id = %account.id,
            account = %mask_account_number(&account.account_number),
            %from,
            %to,
            "fetching statement"
        );

        let response = self
            .client
            .get(&url)
            .query(&[("from", from.to_string()), ("to", to.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("statement fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Transient(format!(
                "statement API returned {} for account {}",
                response.status(),
                account.id
            )));
        }

        let records: Vec<RawStatementRecord> = response
            .json()
            .await
            .map_err(|e| AppError::Transient(format!("statement payload unreadable: {e}")))?;

        Ok(records)
    }
}
