use crate::error::Result;
use crate::models::{BankTransaction, RawStatementRecord};
use crate::observability::metrics::monitor_metrics;
use crate::repositories::TransactionStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Posted-at formats seen in bank statement feeds: slash-separated with and
/// without a separator between date and time, and the dot-separated variants.
const POSTED_AT_FORMATS: [&str; 4] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y%H:%M:%S",
];

/// Outcome of one ingestion batch.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Transactions persisted by this batch.
    pub saved: Vec<BankTransaction>,
    /// Previously stored transactions matched by external id.
    pub duplicates: Vec<BankTransaction>,
    /// Records dropped because they carried a non-positive amount.
    pub skipped: usize,
}

impl IngestOutcome {
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

/// Converts raw fetched records into `BankTransaction` rows without
/// duplication. Re-fetching the same statement window is always safe.
pub struct IngestService {
    transactions: Arc<dyn TransactionStore>,
}

impl IngestService {
    pub fn new(transactions: Arc<dyn TransactionStore>) -> Self {
        Self { transactions }
    }

    pub async fn ingest(
        &self,
        account_id: Uuid,
        records: Vec<RawStatementRecord>,
    ) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();

        for record in records {
            if record.amount <= Decimal::ZERO {
                warn!(
                    account_id = %account_id,
                    bank_id = record.bank_id.as_deref().unwrap_or("-"),
                    "skipping statement record with non-positive amount"
                );
                outcome.skipped += 1;
                continue;
            }

            let external_id = record
                .bank_id
                .clone()
                .unwrap_or_else(|| derived_external_id(account_id, &record));

            if let Some(existing) = self.transactions.find_by_external_id(&external_id).await? {
                outcome.duplicates.push(existing);
                continue;
            }

            let transaction = build_transaction(account_id, external_id, record);
            self.transactions.insert(&transaction).await?;
            debug!(
                transaction_id = %transaction.id,
                external_id = %transaction.external_id,
                direction = ?transaction.direction,
                "statement line ingested"
            );
            outcome.saved.push(transaction);
        }

        monitor_metrics().record_ingest(outcome.saved.len(), outcome.duplicate_count());
        Ok(outcome)
    }
}

fn build_transaction(
    account_id: Uuid,
    external_id: String,
    record: RawStatementRecord,
) -> BankTransaction {
    let (posted_at, fallback_note) = match parse_posted_at(&record.posted_at) {
        Some(parsed) => (parsed, None),
        None => (
            Utc::now(),
            Some(format!("posted_at unparseable: '{}'", record.posted_at)),
        ),
    };

    let transaction = BankTransaction::new(
        external_id,
        account_id,
        posted_at,
        record.amount,
        record.direction,
        record.counterparty_name,
        record.counterparty_tax_id,
        record.payload,
    );

    match fallback_note {
        Some(note) => transaction.with_provenance_note(note),
        None => transaction,
    }
}

/// Parses the bank's posted-at text. Returns None when no known format
/// matches; the caller falls back to "now" with a provenance note rather than
/// failing the batch.
pub fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    POSTED_AT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Stable substitute for a missing bank-assigned id, derived from the
/// identifying fields so a re-fetch of the same record dedups correctly.
pub fn derived_external_id(account_id: Uuid, record: &RawStatementRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(record.amount.to_string().as_bytes());
    hasher.update(format!("{:?}", record.direction).as_bytes());
    hasher.update(record.posted_at.as_bytes());
    if let Some(tax_id) = &record.counterparty_tax_id {
        hasher.update(tax_id.as_bytes());
    }
    format!("derived-{}", hex::encode(hasher.finalize()))
}
