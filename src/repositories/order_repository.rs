use crate::error::{AppError, Result};
use crate::models::OpenOrder;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only view over the ERP's orders, scoped to what reconciliation needs.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<OpenOrder>>;

    /// Open orders (positive outstanding balance) for a client tax id.
    async fn open_orders_by_tax_id(&self, tax_id: &str) -> Result<Vec<OpenOrder>>;
}

/// Postgres-backed order directory reading the ERP's `orders` table.
pub struct PgOrderDirectory {
    pool: PgPool,
}

impl PgOrderDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderDirectory for PgOrderDirectory {
    async fn find(&self, id: Uuid) -> Result<Option<OpenOrder>> {
        let row = sqlx::query_as::<_, OpenOrder>(
            "SELECT id, client_tax_id, outstanding_balance FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn open_orders_by_tax_id(&self, tax_id: &str) -> Result<Vec<OpenOrder>> {
        let rows = sqlx::query_as::<_, OpenOrder>(
            r#"
            SELECT id, client_tax_id, outstanding_balance
            FROM orders
            WHERE client_tax_id = $1 AND outstanding_balance > $2
            ORDER BY id
            "#,
        )
        .bind(tax_id)
        .bind(Decimal::ZERO)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
