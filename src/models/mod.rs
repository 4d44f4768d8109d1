mod account;
mod allocation;
mod order;
mod statement;
mod transaction;

pub use account::MonitoredAccount;
pub use allocation::{allocated_total, AllocationLink};
pub use order::OpenOrder;
pub use statement::RawStatementRecord;
pub use transaction::{default_epsilon, BankTransaction, TransactionDirection};
