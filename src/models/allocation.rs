use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A partial or full assignment of one transaction's value to one order.
///
/// At most one link may exist per (transaction, order) pair; a second
/// allocation against the same order updates the existing link instead.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationLink {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub order_id: Uuid,
    /// Allocated amount. Always positive; zeroed links are deleted instead.
    pub amount: Decimal,
    /// True when the link was created by the auto-match rule.
    pub is_automatic: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AllocationLink {
    pub fn manual(
        transaction_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            order_id,
            amount,
            is_automatic: false,
            note,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn automatic(transaction_id: Uuid, order_id: Uuid, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            order_id,
            amount,
            is_automatic: true,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Raises the allocated amount, e.g. when a second manual allocation
    /// targets the same order. A manual touch clears the automatic flag.
    pub fn increase(mut self, amount: Decimal, note: Option<String>) -> Self {
        self.amount += amount;
        self.is_automatic = false;
        if note.is_some() {
            self.note = note;
        }
        self.updated_at = Utc::now();
        self
    }
}

/// Sums active link amounts; the source of truth for `allocated_total`.
pub fn allocated_total(links: &[AllocationLink]) -> Decimal {
    links.iter().map(|l| l.amount).sum()
}
