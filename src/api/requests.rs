use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RawStatementRecord;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// One order line inside a manual allocation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationItemRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
}

/// Request to allocate a credit transaction across one or more orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationBatchRequest {
    pub items: Vec<AllocationItemRequest>,
    pub note: Option<String>,
}

impl AllocationBatchRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.items.is_empty() {
            errors.push(ValidationError {
                field: "items".to_string(),
                message: "allocation batch cannot be empty".to_string(),
            });
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.amount <= Decimal::ZERO {
                errors.push(ValidationError {
                    field: format!("items[{index}].amount"),
                    message: "amount must be positive".to_string(),
                });
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Push-style delivery of statement items from the bank integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankEventBatchRequest {
    pub account_id: Uuid,
    pub records: Vec<RawStatementRecord>,
}

impl BankEventBatchRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        if self.records.is_empty() {
            return Err(vec![ValidationError {
                field: "records".to_string(),
                message: "records cannot be empty".to_string(),
            }]);
        }
        Ok(())
    }
}
