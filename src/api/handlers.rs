use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::requests::{AllocationBatchRequest, BankEventBatchRequest, ValidationError};
use crate::api::responses::{
    AllocationResponse, ApiResponse, BankEventBatchResponse, BankEventItemError, ErrorResponse,
    HealthResponse, ServiceHealth, TransactionResponse, TransactionWithAllocationsResponse,
    ValidationErrorDetail,
};
use crate::error::AppError;
use crate::scheduler::{MonitorStatus, TriggerSummary};
use crate::services::AllocationItem;

use super::routes::AppState;

type ErrorReply = (StatusCode, Json<ApiResponse<()>>);

fn error_reply(status: StatusCode, code: &str, message: impl Into<String>) -> ErrorReply {
    (
        status,
        Json(ApiResponse::<()>::error(ErrorResponse::new(code, message))),
    )
}

fn validation_reply(errors: Vec<ValidationError>) -> ErrorReply {
    let details: Vec<ValidationErrorDetail> = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

fn map_app_error(e: AppError, context: &str) -> ErrorReply {
    match e {
        AppError::Validation(msg) => {
            error_reply(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        AppError::NotFound(msg) => error_reply(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        e => {
            tracing::error!("{}: {}", context, e);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred",
            )
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    // In-memory deployments have no pool to probe.
    let db_healthy = match &state.pool {
        Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
        None => true,
    };

    let response = HealthResponse {
        status: if db_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        services: ServiceHealth {
            database: db_healthy,
        },
    };

    Json(ApiResponse::success(response))
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let db_healthy = match &state.pool {
        Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
        None => true,
    };

    if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

// ============================================================================
// Monitor Handlers
// ============================================================================

/// Manually trigger a full polling pass over all monitored accounts.
pub async fn run_monitor(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TriggerSummary>>, ErrorReply> {
    match state.scheduler.manual_trigger().await {
        Ok(summary) => Ok(Json(ApiResponse::success(summary))),
        Err(e) => Err(map_app_error(e, "Manual monitor run failed")),
    }
}

/// Current scheduler state.
pub async fn monitor_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MonitorStatus>>, ErrorReply> {
    match state.scheduler.status().await {
        Ok(status) => Ok(Json(ApiResponse::success(status))),
        Err(e) => Err(map_app_error(e, "Failed to read monitor status")),
    }
}

// ============================================================================
// Transaction and Allocation Handlers
// ============================================================================

/// Get a bank transaction by ID.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ErrorReply> {
    match state.transactions.find_by_id(id).await {
        Ok(Some(tx)) => Ok(Json(ApiResponse::success(TransactionResponse::from(tx)))),
        Ok(None) => Err(error_reply(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("transaction '{id}' not found"),
        )),
        Err(e) => Err(map_app_error(e, "Failed to get transaction")),
    }
}

/// List a transaction's allocation links.
pub async fn list_allocations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<AllocationResponse>>>, ErrorReply> {
    match state.reconciliation.transaction_with_links(id).await {
        Ok((_, links)) => Ok(Json(ApiResponse::success(
            links.into_iter().map(AllocationResponse::from).collect(),
        ))),
        Err(e) => Err(map_app_error(e, "Failed to list allocations")),
    }
}

/// Apply a manual allocation batch to a transaction. All-or-nothing: any
/// invalid item rejects the whole batch.
pub async fn create_allocations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AllocationBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionWithAllocationsResponse>>), ErrorReply> {
    if let Err(errors) = request.validate() {
        return Err(validation_reply(errors));
    }

    let items: Vec<AllocationItem> = request
        .items
        .into_iter()
        .map(|item| AllocationItem {
            order_id: item.order_id,
            amount: item.amount,
        })
        .collect();

    if let Err(e) = state
        .reconciliation
        .allocate_manual(id, items, request.note)
        .await
    {
        return Err(map_app_error(e, "Failed to apply allocation batch"));
    }

    match state.reconciliation.transaction_with_links(id).await {
        Ok((tx, links)) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(TransactionWithAllocationsResponse::new(
                tx, links,
            ))),
        )),
        Err(e) => Err(map_app_error(e, "Failed to reload transaction after allocation")),
    }
}

/// Remove an allocation link.
pub async fn delete_allocation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorReply> {
    match state.reconciliation.unlink(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(map_app_error(e, "Failed to remove allocation link")),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Accept a pushed batch of statement items. The batch is always acknowledged
/// with 200; failures are isolated per item and reported in the body so the
/// sender can replay only the failed items.
pub async fn receive_bank_events(
    State(state): State<AppState>,
    Json(request): Json<BankEventBatchRequest>,
) -> Result<Json<ApiResponse<BankEventBatchResponse>>, ErrorReply> {
    if let Err(errors) = request.validate() {
        return Err(validation_reply(errors));
    }

    let account_id = request.account_id;
    let mut response = BankEventBatchResponse::default();

    for (index, record) in request.records.into_iter().enumerate() {
        match state.ingestor.ingest(account_id, vec![record]).await {
            Ok(outcome) => {
                response.duplicates += outcome.duplicate_count();
                response.skipped += outcome.skipped;
                response.accepted += outcome.saved.len();

                for tx in outcome.saved.iter().filter(|t| t.direction.is_allocatable()) {
                    match state.reconciliation.auto_match(tx.id).await {
                        Ok(Some(_)) => response.auto_matched += 1,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(
                                transaction_id = %tx.id,
                                error = %e,
                                "auto-match failed for webhook item"
                            );
                        }
                    }
                }
            }
            Err(e) => response.errors.push(BankEventItemError {
                index,
                message: e.to_string(),
            }),
        }
    }

    Ok(Json(ApiResponse::success(response)))
}
