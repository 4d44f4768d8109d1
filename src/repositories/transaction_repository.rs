use crate::error::{AppError, Result};
use crate::models::BankTransaction;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence seam for bank transactions.
///
/// Implementations must treat `external_id` as unique; the ingestor relies on
/// it as the idempotency key when a statement window is re-fetched.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: &BankTransaction) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BankTransaction>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<BankTransaction>>;

    async fn list_by_account(&self, account_id: Uuid, limit: i64) -> Result<Vec<BankTransaction>>;
}

/// Postgres-backed transaction store.
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRANSACTION_COLUMNS: &str = "id, external_id, account_id, posted_at, amount, direction, counterparty_name, counterparty_tax_id, raw_payload, allocated_total, provenance_note, created_at";

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, transaction: &BankTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bank_transactions (id, external_id, account_id, posted_at, amount, direction, counterparty_name, counterparty_tax_id, raw_payload, allocated_total, provenance_note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.external_id)
        .bind(transaction.account_id)
        .bind(transaction.posted_at)
        .bind(transaction.amount)
        .bind(transaction.direction)
        .bind(&transaction.counterparty_name)
        .bind(&transaction.counterparty_tax_id)
        .bind(&transaction.raw_payload)
        .bind(transaction.allocated_total)
        .bind(&transaction.provenance_note)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BankTransaction>> {
        let row = sqlx::query_as::<_, BankTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM bank_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<BankTransaction>> {
        let row = sqlx::query_as::<_, BankTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM bank_transactions WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn list_by_account(&self, account_id: Uuid, limit: i64) -> Result<Vec<BankTransaction>> {
        let rows = sqlx::query_as::<_, BankTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM bank_transactions WHERE account_id = $1 ORDER BY posted_at DESC LIMIT $2"
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
