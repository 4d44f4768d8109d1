use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Read-only view of an order owned by the wider ERP.
///
/// The reconciliation engine only reads the outstanding balance for matching
/// and reports allocations against it; it never mutates the order itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpenOrder {
    pub id: Uuid,
    pub client_tax_id: Option<String>,
    pub outstanding_balance: Decimal,
}

impl OpenOrder {
    pub fn new(client_tax_id: Option<String>, outstanding_balance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_tax_id,
            outstanding_balance,
        }
    }

    /// True when this order's balance matches the amount within tolerance.
    pub fn balance_matches(&self, amount: Decimal, epsilon: Decimal) -> bool {
        (self.outstanding_balance - amount).abs() <= epsilon
    }
}
