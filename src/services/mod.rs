pub mod ingest_service;
pub mod notification;
pub mod reconciliation_service;
pub mod statement_fetcher;

pub use ingest_service::{IngestOutcome, IngestService};
pub use notification::{LogNotificationDispatcher, NotificationDispatcher};
pub use reconciliation_service::{AllocationItem, ReconciliationService};
pub use statement_fetcher::{HttpStatementFetcher, StatementFetcher};
