use crate::error::{AppError, Result};
use crate::models::{AllocationLink, BankTransaction};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence seam for allocation links.
///
/// `commit` is the only write path. It persists link upserts and removals
/// together with the owning transaction's recomputed `allocated_total` in one
/// unit of work, so no reader ever observes links and totals out of step.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    async fn find_link(&self, id: Uuid) -> Result<Option<AllocationLink>>;

    async fn links_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<AllocationLink>>;

    async fn commit(
        &self,
        transaction: &BankTransaction,
        upserts: &[AllocationLink],
        removals: &[Uuid],
    ) -> Result<()>;
}

/// Postgres-backed allocation store.
pub struct PgAllocationStore {
    pool: PgPool,
}

impl PgAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LINK_COLUMNS: &str =
    "id, transaction_id, order_id, amount, is_automatic, note, created_at, updated_at";

#[async_trait]
impl AllocationStore for PgAllocationStore {
    async fn find_link(&self, id: Uuid) -> Result<Option<AllocationLink>> {
        let row = sqlx::query_as::<_, AllocationLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM allocation_links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn links_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<AllocationLink>> {
        let rows = sqlx::query_as::<_, AllocationLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM allocation_links WHERE transaction_id = $1 ORDER BY created_at"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    async fn commit(
        &self,
        transaction: &BankTransaction,
        upserts: &[AllocationLink],
        removals: &[Uuid],
    ) -> Result<()> {
        let mut db_tx = self.pool.begin().await.map_err(AppError::Database)?;

        for link in upserts {
            sqlx::query(
                r#"
                INSERT INTO allocation_links (id, transaction_id, order_id, amount, is_automatic, note, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE
                SET amount = EXCLUDED.amount,
                    is_automatic = EXCLUDED.is_automatic,
                    note = EXCLUDED.note,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(link.id)
            .bind(link.transaction_id)
            .bind(link.order_id)
            .bind(link.amount)
            .bind(link.is_automatic)
            .bind(&link.note)
            .bind(link.created_at)
            .bind(link.updated_at)
            .execute(&mut *db_tx)
            .await
            .map_err(AppError::Database)?;
        }

        for link_id in removals {
            sqlx::query("DELETE FROM allocation_links WHERE id = $1")
                .bind(link_id)
                .execute(&mut *db_tx)
                .await
                .map_err(AppError::Database)?;
        }

        sqlx::query("UPDATE bank_transactions SET allocated_total = $2 WHERE id = $1")
            .bind(transaction.id)
            .bind(transaction.allocated_total)
            .execute(&mut *db_tx)
            .await
            .map_err(AppError::Database)?;

        db_tx.commit().await.map_err(AppError::Database)?;

        Ok(())
    }
}
