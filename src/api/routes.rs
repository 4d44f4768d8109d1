use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;

use super::handlers;
use crate::repositories::TransactionStore;
use crate::scheduler::PollingScheduler;
use crate::services::{IngestService, ReconciliationService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollingScheduler>,
    pub reconciliation: Arc<ReconciliationService>,
    pub ingestor: Arc<IngestService>,
    pub transactions: Arc<dyn TransactionStore>,
    pub metrics_handle: Option<PrometheusHandle>,
    /// Absent when the service runs against in-memory stores.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        scheduler: Arc<PollingScheduler>,
        reconciliation: Arc<ReconciliationService>,
        ingestor: Arc<IngestService>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            scheduler,
            reconciliation,
            ingestor,
            transactions,
            metrics_handle: None,
            pool: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Adds the database pool used by the health probes.
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Monitor endpoints
        .route("/monitor/run", post(handlers::run_monitor))
        .route("/monitor/status", get(handlers::monitor_status))
        // Transaction and allocation endpoints
        .route("/transactions/:id", get(handlers::get_transaction))
        .route(
            "/transactions/:id/allocations",
            get(handlers::list_allocations).post(handlers::create_allocations),
        )
        .route("/allocations/:id", delete(handlers::delete_allocation))
        // Webhook endpoints
        .route("/webhooks/bank-events", post(handlers::receive_bank_events))
        .with_state(state)
}
