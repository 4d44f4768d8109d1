use sqlx::postgres::PgPoolOptions;
use statement_monitor::api::{create_router, AppState};
use statement_monitor::config::Settings;
use statement_monitor::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use statement_monitor::repositories::{
    PgAccountRegistry, PgAllocationStore, PgOrderDirectory, PgTransactionStore,
};
use statement_monitor::scheduler::{PollingScheduler, SchedulerConfig};
use statement_monitor::services::{
    HttpStatementFetcher, IngestService, LogNotificationDispatcher, ReconciliationService,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;

    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        include_target: true,
    });
    info!("Configuration loaded");

    let metrics_handle = init_metrics();

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied");

    let transactions = Arc::new(PgTransactionStore::new(pool.clone()));
    let allocations = Arc::new(PgAllocationStore::new(pool.clone()));
    let registry = Arc::new(PgAccountRegistry::new(pool.clone()));
    let orders = Arc::new(PgOrderDirectory::new(pool.clone()));

    let fetcher = Arc::new(HttpStatementFetcher::new(
        settings.monitor.statement_api_url.clone(),
        Duration::from_secs(settings.monitor.fetch_timeout_secs),
    )?);
    let notifier = Arc::new(LogNotificationDispatcher);

    let ingestor = Arc::new(IngestService::new(transactions.clone()));
    let reconciliation = Arc::new(ReconciliationService::new(
        transactions.clone(),
        allocations,
        orders,
        settings.monitor.epsilon(),
    ));

    let scheduler = Arc::new(PollingScheduler::new(
        registry,
        fetcher,
        transactions.clone(),
        ingestor.clone(),
        reconciliation.clone(),
        notifier,
        SchedulerConfig::from(&settings.monitor),
    ));
    scheduler.start();
    info!("Statement polling scheduler started");

    let mut state = AppState::new(scheduler, reconciliation, ingestor, transactions)
        .with_pool(pool);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    let app = create_router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = format!("0.0.0.0:{}", settings.application.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
