//! Router assembly, middleware stack and rate limiting.

use std::env;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{
    ApiDoc, approve_transfer_handler, create_transfer_handler, execute_transfer_handler,
    get_screening_handler, get_transfer_handler, health_check_handler, list_transfers_handler,
    liveness_handler, readiness_handler, reject_transfer_handler, screen_entity_handler,
    transfer_audit_handler,
};
use crate::api::registrations::{
    list_registrations_handler, register_service_handler, registry_health_handler,
};
use crate::app::AppState;
use crate::domain::{ErrorDetail, RateLimitResponse};

/// Request timeout applied to every route
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum accepted request body size
const MAX_BODY_BYTES: usize = 1024 * 1024;
/// How often stale rate limiter keys are evicted
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration, keyed per client IP
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained request budget per client per minute
    pub requests_per_minute: u32,
    /// Instantaneous burst allowance per client
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from `RATE_LIMIT_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            requests_per_minute: env::var("RATE_LIMIT_REQUESTS_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.requests_per_minute),
            burst_size: env::var("RATE_LIMIT_BURST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.burst_size),
        }
    }

    fn quota(&self) -> Quota {
        let per_minute = NonZeroU32::new(self.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_minute(per_minute).allow_burst(burst)
    }
}

/// Rate limit key: first hop of x-forwarded-for, or a shared bucket
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(request.headers());
    match limiter.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);
            debug!(key = %key, retry_after, "Request rate limited");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RateLimitResponse {
                    error: ErrorDetail {
                        r#type: "rate_limited".to_string(),
                        message: "Rate limit exceeded".to_string(),
                    },
                    retry_after,
                }),
            )
                .into_response()
        }
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/registrations", post(register_service_handler))
        .route("/registrations/{tenant_id}", get(list_registrations_handler))
        .route(
            "/registrations/{tenant_id}/health",
            get(registry_health_handler),
        )
        .route("/screenings", post(screen_entity_handler))
        .route("/screenings/{id}", get(get_screening_handler))
        .route(
            "/transfers",
            post(create_transfer_handler).get(list_transfers_handler),
        )
        .route("/transfers/{id}", get(get_transfer_handler))
        .route("/transfers/{id}/approve", post(approve_transfer_handler))
        .route("/transfers/{id}/reject", post(reject_transfer_handler))
        .route("/transfers/{id}/execute", post(execute_transfer_handler))
        .route("/transfers/{id}/audit", get(transfer_audit_handler))
}

fn assemble(api: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create the application router without rate limiting
pub fn create_router(state: Arc<AppState>) -> Router {
    assemble(api_routes(), state)
}

/// Create the application router with per-client rate limiting on API routes.
///
/// Health probes and API docs stay unlimited so orchestration traffic is
/// never throttled. A background task evicts limiter state for idle clients.
pub fn create_router_with_rate_limit(state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let limiter: Arc<KeyedLimiter> = Arc::new(RateLimiter::keyed(config.quota()));

    let cleanup_limiter = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_limiter.retain_recent();
        }
    });

    let api = api_routes().layer(middleware::from_fn_with_state(
        limiter,
        rate_limit_middleware,
    ));
    assemble(api, state)
}
