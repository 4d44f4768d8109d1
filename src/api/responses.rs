use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AllocationLink, BankTransaction, TransactionDirection};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
}

/// Service health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: bool,
}

/// Bank transaction response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub external_id: String,
    pub account_id: Uuid,
    pub posted_at: DateTime<Utc>,
    pub amount: Decimal,
    pub direction: TransactionDirection,
    pub counterparty_name: Option<String>,
    pub counterparty_tax_id: Option<String>,
    pub allocated_total: Decimal,
    pub available_amount: Decimal,
    pub provenance_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BankTransaction> for TransactionResponse {
    fn from(tx: BankTransaction) -> Self {
        let available_amount = tx.available_amount();
        Self {
            id: tx.id,
            external_id: tx.external_id,
            account_id: tx.account_id,
            posted_at: tx.posted_at,
            amount: tx.amount,
            direction: tx.direction,
            counterparty_name: tx.counterparty_name,
            counterparty_tax_id: tx.counterparty_tax_id,
            allocated_total: tx.allocated_total,
            available_amount,
            provenance_note: tx.provenance_note,
            created_at: tx.created_at,
        }
    }
}

/// Allocation link response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub is_automatic: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AllocationLink> for AllocationResponse {
    fn from(link: AllocationLink) -> Self {
        Self {
            id: link.id,
            transaction_id: link.transaction_id,
            order_id: link.order_id,
            amount: link.amount,
            is_automatic: link.is_automatic,
            note: link.note,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

/// A transaction together with its allocation links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionWithAllocationsResponse {
    pub transaction: TransactionResponse,
    pub allocations: Vec<AllocationResponse>,
}

impl TransactionWithAllocationsResponse {
    pub fn new(transaction: BankTransaction, links: Vec<AllocationLink>) -> Self {
        Self {
            transaction: TransactionResponse::from(transaction),
            allocations: links.into_iter().map(AllocationResponse::from).collect(),
        }
    }
}

/// Per-item failure inside a webhook batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankEventItemError {
    pub index: usize,
    pub message: String,
}

/// Outcome of a webhook batch. The batch is always acknowledged; failed
/// items are reported here so the sender can replay only those.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankEventBatchResponse {
    pub accepted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub auto_matched: usize,
    pub errors: Vec<BankEventItemError>,
}
