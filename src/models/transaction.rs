use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Default tolerance for amount comparisons, in currency units.
pub fn default_epsilon() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// Direction of a bank statement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_direction", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionDirection {
    /// Money coming into the monitored account.
    Credit,
    /// Money leaving the monitored account. Stored for audit, never allocated.
    Debit,
}

impl TransactionDirection {
    /// Returns true if this direction participates in order reconciliation.
    pub fn is_allocatable(&self) -> bool {
        matches!(self, TransactionDirection::Credit)
    }
}

/// One immutable bank statement line.
///
/// The financial facts (amount, direction, counterparty) never change after
/// ingestion. The allocation bookkeeping (`allocated_total`) is maintained
/// exclusively by the reconciliation engine and is always recomputed from the
/// full set of allocation links, never adjusted incrementally.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankTransaction {
    pub id: Uuid,
    /// Bank-assigned identifier; globally unique, used as the idempotency key.
    pub external_id: String,
    pub account_id: Uuid,
    pub posted_at: DateTime<Utc>,
    /// Gross amount of the statement line. Always positive.
    pub amount: Decimal,
    pub direction: TransactionDirection,
    pub counterparty_name: Option<String>,
    pub counterparty_tax_id: Option<String>,
    pub raw_payload: serde_json::Value,
    /// Sum of all active allocation link amounts.
    pub allocated_total: Decimal,
    /// Set when the posted-at timestamp could not be parsed and "now" was used.
    pub provenance_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BankTransaction {
    pub fn new(
        external_id: String,
        account_id: Uuid,
        posted_at: DateTime<Utc>,
        amount: Decimal,
        direction: TransactionDirection,
        counterparty_name: Option<String>,
        counterparty_tax_id: Option<String>,
        raw_payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            account_id,
            posted_at,
            amount,
            direction,
            counterparty_name,
            counterparty_tax_id,
            raw_payload,
            allocated_total: Decimal::ZERO,
            provenance_note: None,
            created_at: Utc::now(),
        }
    }

    /// Records why a derived or fallback value was used during ingestion.
    pub fn with_provenance_note(mut self, note: impl Into<String>) -> Self {
        self.provenance_note = Some(note.into());
        self
    }

    /// Amount still open for allocation.
    pub fn available_amount(&self) -> Decimal {
        self.amount - self.allocated_total
    }

    /// True once the allocated total matches the amount within tolerance.
    pub fn is_fully_settled(&self, epsilon: Decimal) -> bool {
        self.available_amount() <= epsilon
    }

    /// Replaces the allocated total with a value recomputed from the links.
    pub fn with_allocated_total(mut self, allocated_total: Decimal) -> Self {
        self.allocated_total = allocated_total;
        self
    }
}
