use crate::error::Result;
use crate::models::BankTransaction;
use crate::observability::logging::mask_amount;
use async_trait::async_trait;
use tracing::info;

/// Receives newly seen, not-fully-settled credit transactions.
///
/// Delivery transport (e-mail, push, in-app) lives elsewhere in the ERP; the
/// monitor only decides *when* a notification is owed, applying the per-day
/// dedup so operators are not pinged twice for the same statement line.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn credit_received(&self, transaction: &BankTransaction) -> Result<()>;
}

/// Dispatcher that records notifications in the service log only.
#[derive(Default)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn credit_received(&self, transaction: &BankTransaction) -> Result<()> {
        info!(
            transaction_id = %transaction.id,
            external_id = %transaction.external_id,
            amount = %mask_amount(&transaction.amount),
            counterparty = transaction.counterparty_name.as_deref().unwrap_or("unknown"),
            "credit received awaiting allocation"
        );
        Ok(())
    }
}
