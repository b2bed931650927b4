//! Application entry point.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fiscal_gateway::api::{RateLimitConfig, create_router, create_router_with_rate_limit};
use fiscal_gateway::app::{AppState, CallTimeouts};
use fiscal_gateway::infra::{PostgresClient, PostgresConfig, ProviderCatalog};

/// Application configuration
struct Config {
    database_url: String,
    host: String,
    port: u16,
    enable_rate_limiting: bool,
    rate_limit_config: RateLimitConfig,
    call_timeouts: CallTimeouts,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let enable_rate_limiting = env::var("ENABLE_RATE_LIMITING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let rate_limit_config = RateLimitConfig::from_env();

        // Per-call budgets for outbound provider work
        let defaults = CallTimeouts::default();
        let call_timeouts = CallTimeouts {
            ping: env::var("HEALTH_PING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ping),
            screening: env::var("SCREENING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.screening),
            execution: env::var("PROVIDER_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.execution),
        };

        Ok(Self {
            database_url,
            host,
            port,
            enable_rate_limiting,
            rate_limit_config,
            call_timeouts,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🏗️  Fiscal Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("📦 Initializing infrastructure...");

    // Initialize database
    let db_config = PostgresConfig::default();
    let postgres_client = PostgresClient::new(&config.database_url, db_config).await?;
    postgres_client.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");

    // Create application state
    let app_state = AppState::with_timeouts(
        Arc::new(postgres_client),
        Arc::new(ProviderCatalog),
        config.call_timeouts,
    );

    // Rebuild the in-memory provider index from persisted registrations
    let hydrated = app_state.registry.hydrate().await?;
    info!(
        "   ✓ Service registry hydrated ({} active registrations)",
        hydrated
    );

    let app_state = Arc::new(app_state);

    // Create router
    let router = if config.enable_rate_limiting {
        info!("   ✓ Rate limiting enabled");
        create_router_with_rate_limit(app_state, config.rate_limit_config)
    } else {
        info!("   ○ Rate limiting disabled");
        create_router(app_state)
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server starting on http://{}", addr);
    info!("📖 Swagger UI available at http://{}/swagger-ui", addr);
    info!("📄 OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
