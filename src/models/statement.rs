use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransactionDirection;

/// One raw statement record as fetched from the bank, before ingestion.
///
/// `posted_at` is kept as the bank's original text; the ingestor owns the
/// parsing (several source formats are in circulation, see
/// `services::ingest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatementRecord {
    /// Bank-assigned statement line id. Absent on some webhook payloads, in
    /// which case the ingestor derives a stable id from the record contents.
    pub bank_id: Option<String>,
    pub amount: Decimal,
    pub direction: TransactionDirection,
    pub counterparty_name: Option<String>,
    pub counterparty_tax_id: Option<String>,
    /// Posted-at timestamp exactly as the bank sent it.
    pub posted_at: String,
    /// Full original payload, retained for audit.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawStatementRecord {
    pub fn credit(bank_id: impl Into<String>, amount: Decimal, posted_at: impl Into<String>) -> Self {
        Self {
            bank_id: Some(bank_id.into()),
            amount,
            direction: TransactionDirection::Credit,
            counterparty_name: None,
            counterparty_tax_id: None,
            posted_at: posted_at.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn debit(bank_id: impl Into<String>, amount: Decimal, posted_at: impl Into<String>) -> Self {
        Self {
            direction: TransactionDirection::Debit,
            ..Self::credit(bank_id, amount, posted_at)
        }
    }

    pub fn with_counterparty(
        mut self,
        name: impl Into<String>,
        tax_id: impl Into<String>,
    ) -> Self {
        self.counterparty_name = Some(name.into());
        self.counterparty_tax_id = Some(tax_id.into());
        self
    }
}
