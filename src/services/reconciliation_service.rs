use crate::error::{AppError, Result};
use crate::models::{allocated_total, AllocationLink, BankTransaction};
use crate::observability::metrics::monitor_metrics;
use crate::repositories::{AllocationStore, OrderDirectory, TransactionStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One requested assignment of money to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationItem {
    pub order_id: Uuid,
    pub amount: Decimal,
}

/// Allocates credit transactions to orders while preserving the conservation
/// invariant: the sum of a transaction's link amounts never exceeds its
/// amount. Every mutation recomputes the transaction's `allocated_total` from
/// the full link set and commits both in one unit of work.
///
/// Mutations are serialized through `write_lock`, so the validation each one
/// performs against the loaded state still holds when it commits. Reads run
/// lock-free.
pub struct ReconciliationService {
    transactions: Arc<dyn TransactionStore>,
    allocations: Arc<dyn AllocationStore>,
    orders: Arc<dyn OrderDirectory>,
    epsilon: Decimal,
    write_lock: Mutex<()>,
}

impl ReconciliationService {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        allocations: Arc<dyn AllocationStore>,
        orders: Arc<dyn OrderDirectory>,
        epsilon: Decimal,
    ) -> Self {
        Self {
            transactions,
            allocations,
            orders,
            epsilon,
            write_lock: Mutex::new(()),
        }
    }

    pub fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    /// Attempts the deterministic auto-match rule for a freshly ingested
    /// credit: exactly one open order of the counterparty whose outstanding
    /// balance equals the amount within tolerance. Ambiguity (zero or several
    /// candidates) is never auto-resolved.
    pub async fn auto_match(&self, transaction_id: Uuid) -> Result<Option<AllocationLink>> {
        let _guard = self.write_lock.lock().await;
        let transaction = self.require_transaction(transaction_id).await?;

        if !transaction.direction.is_allocatable() {
            return Ok(None);
        }
        if transaction.allocated_total != Decimal::ZERO {
            return Ok(None);
        }
        let Some(tax_id) = transaction.counterparty_tax_id.clone() else {
            return Ok(None);
        };

        let candidates: Vec<_> = self
            .orders
            .open_orders_by_tax_id(&tax_id)
            .await?
            .into_iter()
            .filter(|order| order.balance_matches(transaction.amount, self.epsilon))
            .collect();

        if candidates.len() != 1 {
            debug!(
                transaction_id = %transaction.id,
                candidate_count = candidates.len(),
                "auto-match skipped, no unambiguous candidate"
            );
            return Ok(None);
        }

        let link = AllocationLink::automatic(transaction.id, candidates[0].id, transaction.amount);
        let updated = transaction.with_allocated_total(link.amount);
        self.allocations
            .commit(&updated, std::slice::from_ref(&link), &[])
            .await?;

        monitor_metrics().record_auto_match();
        info!(
            transaction_id = %updated.id,
            order_id = %link.order_id,
            "auto-matched credit to order"
        );
        Ok(Some(link))
    }

    /// Applies a manual allocation batch atomically. The whole batch is
    /// rejected when any item is invalid or the sum exceeds the available
    /// amount; a partially applied batch is never possible.
    pub async fn allocate_manual(
        &self,
        transaction_id: Uuid,
        items: Vec<AllocationItem>,
        note: Option<String>,
    ) -> Result<Vec<AllocationLink>> {
        let _guard = self.write_lock.lock().await;
        let transaction = self.require_transaction(transaction_id).await?;

        if items.is_empty() {
            return Err(AppError::Validation("allocation batch is empty".to_string()));
        }
        let mut seen_orders = HashSet::new();
        for item in &items {
            if item.amount <= Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "allocation amount must be positive, got {} for order {}",
                    item.amount, item.order_id
                )));
            }
            if !seen_orders.insert(item.order_id) {
                return Err(AppError::Validation(format!(
                    "order {} appears more than once in the batch",
                    item.order_id
                )));
            }
        }

        let requested: Decimal = items.iter().map(|i| i.amount).sum();
        let available = transaction.available_amount();
        if requested > available {
            return Err(AppError::Validation(format!(
                "allocation sum {requested} exceeds available amount {available}"
            )));
        }

        let existing = self.allocations.links_for_transaction(transaction.id).await?;

        for item in &items {
            let order = self
                .orders
                .find(item.order_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("order '{}' not found", item.order_id)))?;

            // An order must not end up covered past its outstanding balance;
            // the same tolerance applies as everywhere amounts are compared.
            let already_linked = existing
                .iter()
                .find(|l| l.order_id == item.order_id)
                .map(|l| l.amount)
                .unwrap_or(Decimal::ZERO);
            let resulting = already_linked + item.amount;
            if resulting > order.outstanding_balance + self.epsilon {
                return Err(AppError::Validation(format!(
                    "allocation {resulting} exceeds outstanding balance {} of order {}",
                    order.outstanding_balance, item.order_id
                )));
            }
        }

        let mut untouched: Vec<AllocationLink> = existing;
        let mut affected = Vec::with_capacity(items.len());

        for item in items {
            let position = untouched.iter().position(|l| l.order_id == item.order_id);
            let link = match position {
                // One link per (transaction, order): top up the existing one.
                Some(index) => untouched.swap_remove(index).increase(item.amount, note.clone()),
                None => AllocationLink::manual(
                    transaction.id,
                    item.order_id,
                    item.amount,
                    note.clone(),
                ),
            };
            affected.push(link);
        }

        let mut all_links = untouched;
        all_links.extend(affected.iter().cloned());
        let updated = transaction.with_allocated_total(allocated_total(&all_links));

        self.allocations.commit(&updated, &affected, &[]).await?;

        monitor_metrics().record_manual_allocation(affected.len());
        info!(
            transaction_id = %updated.id,
            links = affected.len(),
            allocated_total = %updated.allocated_total,
            "manual allocation applied"
        );
        Ok(affected)
    }

    /// Removes a link and lowers the owning transaction's allocated total.
    /// Legal on fully settled transactions; unlinking is how an erroneous
    /// match is reversed.
    pub async fn unlink(&self, link_id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let link = self
            .allocations
            .find_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("allocation link '{link_id}' not found")))?;

        let transaction = self.require_transaction(link.transaction_id).await?;

        let remaining: Vec<AllocationLink> = self
            .allocations
            .links_for_transaction(transaction.id)
            .await?
            .into_iter()
            .filter(|l| l.id != link_id)
            .collect();

        let updated = transaction.with_allocated_total(allocated_total(&remaining));
        self.allocations.commit(&updated, &[], &[link_id]).await?;

        info!(
            transaction_id = %updated.id,
            link_id = %link_id,
            allocated_total = %updated.allocated_total,
            "allocation link removed"
        );
        Ok(())
    }

    /// Read side for the allocation UI.
    pub async fn transaction_with_links(
        &self,
        transaction_id: Uuid,
    ) -> Result<(BankTransaction, Vec<AllocationLink>)> {
        let transaction = self.require_transaction(transaction_id).await?;
        let links = self.allocations.links_for_transaction(transaction_id).await?;
        Ok((transaction, links))
    }

    async fn require_transaction(&self, id: Uuid) -> Result<BankTransaction> {
        self.transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction '{id}' not found")))
    }
}
