//! Tenant provider registration endpoints.
//!
//! Registration is an admin operation: the upstream gateway must present an
//! `x-actor-role: admin` identity. Listing never echoes configuration values
//! back, since those carry provider credentials.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use crate::app::AppState;
use crate::domain::{
    ActorContext, AppError, RegisterServiceRequest, RegisterServiceResponse, RegistrationSummary,
    RegistryHealthResponse,
};

/// Register (or upsert) a provider for a tenant
///
/// POST /registrations
#[utoipa::path(
    post,
    path = "/registrations",
    tag = "registrations",
    request_body = RegisterServiceRequest,
    responses(
        (status = 200, description = "Registration stored and provider activated", body = RegisterServiceResponse),
        (status = 400, description = "Invalid request or provider configuration", body = crate::domain::ErrorResponse),
        (status = 401, description = "Missing actor identity", body = crate::domain::ErrorResponse),
        (status = 403, description = "Role may not manage registrations", body = crate::domain::ErrorResponse),
    )
)]
pub async fn register_service_handler(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(payload): Json<RegisterServiceRequest>,
) -> Result<Json<RegisterServiceResponse>, AppError> {
    let registration = state.registry.register(&payload, &actor).await?;

    info!(
        tenant_id = %registration.tenant_id,
        service_type = %registration.service_type,
        provider = %registration.provider,
        is_active = registration.is_active,
        "Registration upserted via API"
    );

    Ok(Json(RegisterServiceResponse {
        registration_id: registration.id,
        tenant_id: registration.tenant_id,
        service_type: registration.service_type,
        provider: registration.provider,
        is_active: registration.is_active,
    }))
}

/// List a tenant's registrations, active and inactive
///
/// GET /registrations/{tenant_id}
#[utoipa::path(
    get,
    path = "/registrations/{tenant_id}",
    tag = "registrations",
    params(
        ("tenant_id" = String, Path, description = "Tenant whose registrations to list")
    ),
    responses(
        (status = 200, description = "Registrations for the tenant", body = Vec<RegistrationSummary>),
    )
)]
pub async fn list_registrations_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<RegistrationSummary>>, AppError> {
    let registrations = state.registry.list_for_tenant(&tenant_id).await?;
    let summaries = registrations.iter().map(RegistrationSummary::from).collect();
    Ok(Json(summaries))
}

/// Ping every active provider of a tenant concurrently
///
/// GET /registrations/{tenant_id}/health
#[utoipa::path(
    get,
    path = "/registrations/{tenant_id}/health",
    tag = "registrations",
    params(
        ("tenant_id" = String, Path, description = "Tenant whose providers to ping")
    ),
    responses(
        (status = 200, description = "Per-provider ping results", body = RegistryHealthResponse),
    )
)]
pub async fn registry_health_handler(
    State(state): State<Arc<AppState>>,
    _actor: ActorContext,
    Path(tenant_id): Path<String>,
) -> Json<RegistryHealthResponse> {
    Json(state.registry.health_check(&tenant_id).await)
}
