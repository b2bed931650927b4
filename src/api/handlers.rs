//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    ActorContext, ActorRole, AppError, ApproveTransferRequest, AuditLogEntry,
    ComplianceScreeningRecord, CreateTransferRequest, DatabaseError, ErrorDetail, ErrorResponse,
    ExecuteTransferApiRequest, HealthResponse, HealthStatus, PaginatedResponse, ProviderError,
    RateLimitResponse, RejectTransferRequest, ScreenEntityRequest, ScreeningOutcome,
    TransferListParams, TransferRequest, ValidationError,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fiscal Gateway API",
        version = "0.1.0",
        description = "Multi-tenant financial provider gateway with tiered ACH approval workflows",
        contact(
            name = "API Support",
            email = "support@example.com"
        ),
        license(
            name = "MIT"
        )
    ),
    paths(
        create_transfer_handler,
        list_transfers_handler,
        get_transfer_handler,
        approve_transfer_handler,
        reject_transfer_handler,
        execute_transfer_handler,
        transfer_audit_handler,
        screen_entity_handler,
        get_screening_handler,
        crate::api::registrations::register_service_handler,
        crate::api::registrations::list_registrations_handler,
        crate::api::registrations::registry_health_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            TransferRequest,
            CreateTransferRequest,
            ApproveTransferRequest,
            RejectTransferRequest,
            ExecuteTransferApiRequest,
            crate::domain::Approval,
            crate::domain::ApprovalDecision,
            crate::domain::TransferStatus,
            crate::domain::TransferType,
            crate::domain::ActorRole,
            ScreenEntityRequest,
            ScreeningOutcome,
            ComplianceScreeningRecord,
            crate::domain::ProviderScreeningResult,
            crate::domain::ScreeningDecision,
            AuditLogEntry,
            TransferListParams,
            PaginatedResponse<TransferRequest>,
            crate::domain::RegisterServiceRequest,
            crate::domain::RegisterServiceResponse,
            crate::domain::RegistrationSummary,
            crate::domain::ServiceType,
            crate::domain::RegistryHealthResponse,
            crate::domain::ProviderHealthEntry,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            RateLimitResponse,
        )
    ),
    tags(
        (name = "transfers", description = "ACH transfer approval workflow endpoints"),
        (name = "screenings", description = "Compliance screening endpoints"),
        (name = "registrations", description = "Tenant provider registration endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Extracts actor identity from the `x-actor-id` / `x-actor-role` headers
/// the upstream gateway attaches after authentication.
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Authentication("Missing x-actor-id header".to_string()))?
            .to_string();

        let role_header = parts
            .headers
            .get("x-actor-role")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Authentication("Missing x-actor-role header".to_string()))?;
        let role: ActorRole = role_header.parse().map_err(|_| {
            AppError::Validation(ValidationError::InvalidField {
                field: "x-actor-role".to_string(),
                message: format!(
                    "Unknown role '{}'; expected admin, manager, clerk or auditor",
                    role_header
                ),
            })
        })?;

        // Best-effort client address for the audit trail
        let source_ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);

        Ok(Self {
            actor_id,
            role,
            source_ip,
        })
    }
}

/// Submit a new transfer request
///
/// Amounts at or below 10000.00 auto-approve and only need an `execute` call.
/// Larger amounts enter the approval workflow: one approval up to 50000.00,
/// two approvals above that. Poll `GET /transfers/{id}` to track `status`:
/// - `pending` → awaiting the level-1 approval
/// - `processing` → level-1 granted, awaiting level-2 (or execution in flight)
/// - `completed` / `failed` / `cancelled` → terminal
#[utoipa::path(
    post,
    path = "/transfers",
    tag = "transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer request created", body = TransferRequest),
        (status = 400, description = "Validation error - invalid request format", body = ErrorResponse),
        (status = 401, description = "Missing actor identity", body = ErrorResponse),
        (status = 403, description = "Role may not initiate transfers", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_transfer_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<Json<TransferRequest>, AppError> {
    let transfer = state.workflow.create_transfer(&payload, &actor).await?;
    Ok(Json(transfer))
}

/// List a tenant's transfer requests with pagination
#[utoipa::path(
    get,
    path = "/transfers",
    tag = "transfers",
    params(
        ("tenant_id" = String, Query, description = "Tenant whose transfers to list"),
        ("limit" = Option<i64>, Query, description = "Maximum number of requests to return (1-100, default: 20)"),
        ("cursor" = Option<String>, Query, description = "Cursor for pagination (transfer ID to start after)")
    ),
    responses(
        (status = 200, description = "List of transfer requests", body = PaginatedResponse<TransferRequest>),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_transfers_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Query(params): Query<TransferListParams>,
) -> Result<Json<PaginatedResponse<TransferRequest>>, AppError> {
    let transfers = state.workflow.list_transfers(&params).await?;
    Ok(Json(transfers))
}

/// Get a single transfer request by ID
#[utoipa::path(
    get,
    path = "/transfers/{id}",
    tag = "transfers",
    params(
        ("id" = String, Path, description = "Transfer request ID")
    ),
    responses(
        (status = 200, description = "Transfer request found", body = TransferRequest),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_transfer_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Path(id): Path<String>,
) -> Result<Json<TransferRequest>, AppError> {
    let transfer = state
        .workflow
        .get_transfer(&id)
        .await?
        .ok_or(AppError::Database(DatabaseError::NotFound(id)))?;
    Ok(Json(transfer))
}

/// Approve a pending transfer
///
/// The final approval claims the transfer and executes it through the
/// tenant's banking provider before responding.
#[utoipa::path(
    post,
    path = "/transfers/{id}/approve",
    tag = "transfers",
    params(
        ("id" = String, Path, description = "Transfer request ID")
    ),
    request_body = ApproveTransferRequest,
    responses(
        (status = 200, description = "Approval recorded", body = TransferRequest),
        (status = 401, description = "Missing actor identity", body = ErrorResponse),
        (status = 403, description = "Role may not approve transfers", body = ErrorResponse),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 409, description = "Transfer not in an approvable state", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn approve_transfer_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Path(id): Path<String>,
    payload: Option<Json<ApproveTransferRequest>>,
) -> Result<Json<TransferRequest>, AppError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let transfer = state.workflow.approve(&id, &request, &actor).await?;
    Ok(Json(transfer))
}

/// Reject a transfer awaiting approval
#[utoipa::path(
    post,
    path = "/transfers/{id}/reject",
    tag = "transfers",
    params(
        ("id" = String, Path, description = "Transfer request ID")
    ),
    request_body = RejectTransferRequest,
    responses(
        (status = 200, description = "Transfer cancelled", body = TransferRequest),
        (status = 400, description = "Missing rejection reason", body = ErrorResponse),
        (status = 401, description = "Missing actor identity", body = ErrorResponse),
        (status = 403, description = "Role may not reject transfers", body = ErrorResponse),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 409, description = "Transfer not in a rejectable state", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn reject_transfer_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Path(id): Path<String>,
    Json(payload): Json<RejectTransferRequest>,
) -> Result<Json<TransferRequest>, AppError> {
    let transfer = state.workflow.reject(&id, &payload, &actor).await?;
    Ok(Json(transfer))
}

/// Execute an approved transfer or retry a failed one
///
/// Re-executing a `failed` transfer requires an `idempotency_key` so the
/// banking provider can deduplicate upstream.
#[utoipa::path(
    post,
    path = "/transfers/{id}/execute",
    tag = "transfers",
    params(
        ("id" = String, Path, description = "Transfer request ID")
    ),
    request_body = ExecuteTransferApiRequest,
    responses(
        (status = 200, description = "Execution finished; status tells the outcome", body = TransferRequest),
        (status = 400, description = "Missing idempotency key for a retry", body = ErrorResponse),
        (status = 401, description = "Missing actor identity", body = ErrorResponse),
        (status = 403, description = "Role may not execute transfers", body = ErrorResponse),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 409, description = "Transfer not in an executable state", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn execute_transfer_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Path(id): Path<String>,
    payload: Option<Json<ExecuteTransferApiRequest>>,
) -> Result<Json<TransferRequest>, AppError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let transfer = state.workflow.execute(&id, &request, &actor).await?;
    Ok(Json(transfer))
}

/// Audit trail of one transfer, oldest entry first
#[utoipa::path(
    get,
    path = "/transfers/{id}/audit",
    tag = "transfers",
    params(
        ("id" = String, Path, description = "Transfer request ID")
    ),
    responses(
        (status = 200, description = "Audit entries for the transfer", body = Vec<AuditLogEntry>),
        (status = 404, description = "Transfer not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn transfer_audit_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let entries = state.workflow.audit_trail(&id).await?;
    Ok(Json(entries))
}

/// Screen an entity against every compliance provider of the tenant
///
/// Providers are called concurrently; a provider error or timeout degrades
/// the decision to `pending_review` instead of failing the request.
#[utoipa::path(
    post,
    path = "/screenings",
    tag = "screenings",
    request_body = ScreenEntityRequest,
    responses(
        (status = 200, description = "Screening completed", body = ScreeningOutcome),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing actor identity", body = ErrorResponse),
        (status = 403, description = "Role may not request screenings", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn screen_entity_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(payload): Json<ScreenEntityRequest>,
) -> Result<Json<ScreeningOutcome>, AppError> {
    let outcome = state.aggregator.screen(&payload, &actor).await?;
    Ok(Json(outcome))
}

/// Get a stored screening record by ID
#[utoipa::path(
    get,
    path = "/screenings/{id}",
    tag = "screenings",
    params(
        ("id" = String, Path, description = "Screening record ID")
    ),
    responses(
        (status = 200, description = "Screening record found", body = ComplianceScreeningRecord),
        (status = 404, description = "Screening not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_screening_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Path(id): Path<String>,
) -> Result<Json<ComplianceScreeningRecord>, AppError> {
    let record = state
        .aggregator
        .screening(&id)
        .await?
        .ok_or(AppError::Database(DatabaseError::NotFound(id)))?;
    Ok(Json(record))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.db_client.health_check().await {
        Ok(()) => HealthStatus::Healthy,
        Err(_) => HealthStatus::Unhealthy,
    };
    Json(HealthResponse::new(database, state.registry.len() as u64))
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.db_client.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Provider(provider_err) => match provider_err {
                ProviderError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                ProviderError::Declined(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "provider_declined",
                    self.to_string(),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    self.to_string(),
                ),
            },
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::InvalidState(_) => {
                (StatusCode::CONFLICT, "invalid_state", self.to_string())
            }
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            AppError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "authorization_error",
                self.to_string(),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
            AppError::NotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "not_supported",
                self.to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
