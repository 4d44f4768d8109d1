//! In-memory store implementations.
//!
//! Used by the test suites and by embedded deployments that run without
//! Postgres. A single interior mutex per store gives the same atomicity
//! guarantee the Postgres implementations get from a database transaction.

use crate::error::{AppError, Result};
use crate::models::{AllocationLink, BankTransaction, MonitoredAccount, OpenOrder};
use crate::repositories::{AccountRegistry, AllocationStore, OrderDirectory, TransactionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct StatementInner {
    transactions: HashMap<Uuid, BankTransaction>,
    by_external_id: HashMap<String, Uuid>,
    links: HashMap<Uuid, AllocationLink>,
}

/// Transactions and allocation links behind one lock, so `commit` applies
/// link writes and the recomputed total as a single step.
#[derive(Default)]
pub struct InMemoryStatementStore {
    inner: Mutex<StatementInner>,
}

impl InMemoryStatementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/inspection helper: current number of stored transactions.
    pub fn transaction_count(&self) -> usize {
        self.inner.lock().unwrap().transactions.len()
    }

    /// Test/inspection helper: current number of allocation links.
    pub fn link_count(&self) -> usize {
        self.inner.lock().unwrap().links.len()
    }
}

#[async_trait]
impl TransactionStore for InMemoryStatementStore {
    async fn insert(&self, transaction: &BankTransaction) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.by_external_id.contains_key(&transaction.external_id) {
            return Err(AppError::Validation(format!(
                "transaction with external id '{}' already exists",
                transaction.external_id
            )));
        }
        inner
            .by_external_id
            .insert(transaction.external_id.clone(), transaction.id);
        inner.transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BankTransaction>> {
        Ok(self.inner.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<BankTransaction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_external_id
            .get(external_id)
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }

    async fn list_by_account(&self, account_id: Uuid, limit: i64) -> Result<Vec<BankTransaction>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<BankTransaction> = inner
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl AllocationStore for InMemoryStatementStore {
    async fn find_link(&self, id: Uuid) -> Result<Option<AllocationLink>> {
        Ok(self.inner.lock().unwrap().links.get(&id).cloned())
    }

    async fn links_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<AllocationLink>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<AllocationLink> = inner
            .links
            .values()
            .filter(|l| l.transaction_id == transaction_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn commit(
        &self,
        transaction: &BankTransaction,
        upserts: &[AllocationLink],
        removals: &[Uuid],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.transactions.contains_key(&transaction.id) {
            return Err(AppError::NotFound(format!(
                "transaction '{}' not found",
                transaction.id
            )));
        }
        for link in upserts {
            inner.links.insert(link.id, link.clone());
        }
        for link_id in removals {
            inner.links.remove(link_id);
        }
        inner.transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }
}

/// Order directory over a plain map, for tests and embedded use.
#[derive(Default)]
pub struct InMemoryOrderDirectory {
    orders: Mutex<HashMap<Uuid, OpenOrder>>,
}

impl InMemoryOrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, order: OpenOrder) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn remove(&self, id: Uuid) {
        self.orders.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderDirectory {
    async fn find(&self, id: Uuid) -> Result<Option<OpenOrder>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn open_orders_by_tax_id(&self, tax_id: &str) -> Result<Vec<OpenOrder>> {
        let orders = self.orders.lock().unwrap();
        let mut rows: Vec<OpenOrder> = orders
            .values()
            .filter(|o| {
                o.client_tax_id.as_deref() == Some(tax_id)
                    && o.outstanding_balance > rust_decimal::Decimal::ZERO
            })
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.id);
        Ok(rows)
    }
}

/// Fixed account registry, replaceable at runtime for tests.
#[derive(Default)]
pub struct StaticAccountRegistry {
    accounts: RwLock<Vec<MonitoredAccount>>,
}

impl StaticAccountRegistry {
    pub fn new(accounts: Vec<MonitoredAccount>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    pub fn replace(&self, accounts: Vec<MonitoredAccount>) {
        *self.accounts.write().unwrap() = accounts;
    }
}

#[async_trait]
impl AccountRegistry for StaticAccountRegistry {
    async fn monitored_accounts(&self) -> Result<Vec<MonitoredAccount>> {
        Ok(self.accounts.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionDirection;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_tx(external_id: &str) -> BankTransaction {
        BankTransaction::new(
            external_id.to_string(),
            Uuid::new_v4(),
            Utc::now(),
            dec!(100),
            TransactionDirection::Credit,
            None,
            None,
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_external_id() {
        let store = InMemoryStatementStore::new();
        store.insert(&sample_tx("A")).await.unwrap();
        let err = store.insert(&sample_tx("A")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_updates_links_and_total_together() {
        let store = InMemoryStatementStore::new();
        let tx = sample_tx("B");
        store.insert(&tx).await.unwrap();

        let link = AllocationLink::manual(tx.id, Uuid::new_v4(), dec!(40), None);
        let updated = tx.clone().with_allocated_total(dec!(40));
        store.commit(&updated, &[link.clone()], &[]).await.unwrap();

        let stored = store.find_by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.allocated_total, dec!(40));
        assert_eq!(store.link_count(), 1);

        let reverted = stored.with_allocated_total(dec!(0));
        store.commit(&reverted, &[], &[link.id]).await.unwrap();
        assert_eq!(store.link_count(), 0);
        let stored = store.find_by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.allocated_total, dec!(0));
    }

    #[tokio::test]
    async fn test_order_directory_filters_open_orders() {
        let directory = InMemoryOrderDirectory::new();
        directory.upsert(OpenOrder::new(Some("111".to_string()), dec!(500)));
        directory.upsert(OpenOrder::new(Some("111".to_string()), dec!(0)));
        directory.upsert(OpenOrder::new(Some("222".to_string()), dec!(300)));

        let open = directory.open_orders_by_tax_id("111").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].outstanding_balance, dec!(500));
    }
}
