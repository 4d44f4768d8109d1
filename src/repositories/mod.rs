pub mod account_repository;
pub mod allocation_repository;
pub mod memory;
pub mod order_repository;
pub mod transaction_repository;

pub use account_repository::{AccountRegistry, PgAccountRegistry};
pub use allocation_repository::{AllocationStore, PgAllocationStore};
pub use memory::{InMemoryOrderDirectory, InMemoryStatementStore, StaticAccountRegistry};
pub use order_repository::{OrderDirectory, PgOrderDirectory};
pub use transaction_repository::{PgTransactionStore, TransactionStore};
