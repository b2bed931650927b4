//! In-memory index of active provider registrations, backed by the database.
//!
//! The registry is the single resolution point for "which adapter serves this
//! tenant for this capability". Lookups are lock-free reads against a
//! concurrent map; registration writes serialize per composite key so
//! unrelated tenants never contend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::audit::{AuditTrail, actions, entities};
use crate::domain::{
    ActorContext, AppError, BankingProvider, CapabilityHandle, DatabaseClient, HealthStatus,
    ProviderFactory, ProviderHealthEntry, RegisterServiceRequest, RegistryHealthResponse,
    RegistryKey, ScreeningProvider, ServiceRegistration, ServiceType, ValidationError,
};

/// Default budget for a single provider ping during health checks
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Tenant-scoped provider registry.
///
/// The database is the source of truth; the map holds only registrations that
/// are active and whose adapter built successfully. Deactivated providers stay
/// persisted but drop out of the map, so `lookup` misses them.
pub struct ServiceRegistry {
    db: Arc<dyn DatabaseClient>,
    factory: Arc<dyn ProviderFactory>,
    audit: Arc<AuditTrail>,
    entries: DashMap<RegistryKey, CapabilityHandle>,
    write_locks: DashMap<RegistryKey, Arc<Mutex<()>>>,
    ping_timeout: Duration,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        factory: Arc<dyn ProviderFactory>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            db,
            factory,
            audit,
            entries: DashMap::new(),
            write_locks: DashMap::new(),
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    /// Override the per-provider ping budget used by health checks.
    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Load every active registration from the database into the map.
    ///
    /// A registration whose adapter no longer builds (catalog drift, invalid
    /// stored configuration) is skipped with a warning rather than failing
    /// startup; it stays invisible until re-registered.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<usize, AppError> {
        let registrations = self.db.load_all_registrations().await?;
        let mut loaded = 0usize;

        for registration in registrations {
            if !registration.is_active {
                continue;
            }
            let key = registration.key();
            match self.factory.build(&registration) {
                Ok(handle) => {
                    self.entries.insert(key, handle);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping registration that no longer builds");
                }
            }
        }

        info!(count = loaded, "Service registry hydrated from database");
        Ok(loaded)
    }

    /// Insert or update a provider registration (last write wins per key).
    ///
    /// Active registrations must build a working adapter before anything is
    /// persisted, so a bad configuration never reaches the database. An
    /// inactive upsert persists the row and evicts the map entry.
    #[instrument(
        skip(self, request, actor),
        fields(tenant_id = %request.tenant_id, provider = %request.provider)
    )]
    pub async fn register(
        &self,
        request: &RegisterServiceRequest,
        actor: &ActorContext,
    ) -> Result<ServiceRegistration, AppError> {
        if !actor.role.can_manage_registrations() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot manage registrations",
                actor.role
            )));
        }
        request.validate()?;

        let key = RegistryKey::new(&request.tenant_id, request.service_type, &request.provider);

        // Writes serialize per composite key only
        let lock = Arc::clone(
            self.write_locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        let now = Utc::now();
        let candidate = ServiceRegistration {
            id: Uuid::now_v7().to_string(),
            tenant_id: key.tenant_id.clone(),
            service_type: key.service_type,
            provider: key.provider.clone(),
            configuration: request.configuration.clone(),
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };

        // Build before persisting: a registration we cannot serve is rejected whole
        let handle = if candidate.is_active {
            Some(self.factory.build(&candidate)?)
        } else {
            None
        };

        let stored = self.db.upsert_registration(&candidate).await?;

        match handle {
            Some(handle) => {
                self.entries.insert(key.clone(), handle);
                info!(key = %key, "Provider registered");
            }
            None => {
                if self.entries.remove(&key).is_some() {
                    warn!(key = %key, "Provider deactivated");
                } else {
                    info!(key = %key, "Inactive provider recorded");
                }
            }
        }

        self.audit
            .record(
                &stored.tenant_id,
                actor,
                actions::SERVICE_REGISTERED,
                entities::SERVICE_REGISTRATION,
                &stored.id,
                serde_json::json!({
                    "service_type": stored.service_type,
                    "provider": stored.provider,
                    "is_active": stored.is_active,
                }),
            )
            .await?;

        Ok(stored)
    }

    /// Resolve the capability handle for an active registration.
    pub fn lookup(
        &self,
        tenant_id: &str,
        service_type: ServiceType,
        provider: &str,
    ) -> Result<CapabilityHandle, AppError> {
        let key = RegistryKey::new(tenant_id, service_type, provider);
        self.entries
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("No active registration for {}", key)))
    }

    /// All registrations for a tenant, active and inactive, oldest first.
    pub async fn list_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ServiceRegistration>, AppError> {
        self.db.list_registrations(tenant_id).await
    }

    /// Ping every active provider of a tenant concurrently.
    ///
    /// Each ping runs under its own timeout; a slow or failing provider is
    /// reported unhealthy without affecting the others.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn health_check(&self, tenant_id: &str) -> RegistryHealthResponse {
        let targets: Vec<(ServiceType, String, CapabilityHandle)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().tenant_id == tenant_id)
            .map(|entry| {
                (
                    entry.key().service_type,
                    entry.key().provider.clone(),
                    entry.value().clone(),
                )
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (service_type, provider, handle) in targets {
            let timeout = self.ping_timeout;
            tasks.spawn(async move {
                let (status, error) = match tokio::time::timeout(timeout, handle.ping()).await {
                    Ok(Ok(())) => (HealthStatus::Healthy, None),
                    Ok(Err(e)) => (HealthStatus::Unhealthy, Some(e.to_string())),
                    Err(_) => (
                        HealthStatus::Unhealthy,
                        Some(format!("Ping timed out after {}ms", timeout.as_millis())),
                    ),
                };
                ProviderHealthEntry {
                    service_type,
                    provider,
                    status,
                    error,
                }
            });
        }

        let mut providers = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(entry) => providers.push(entry),
                Err(e) => warn!(error = %e, "Health check task failed"),
            }
        }
        providers.sort_by(|a, b| {
            a.service_type
                .as_str()
                .cmp(b.service_type.as_str())
                .then_with(|| a.provider.cmp(&b.provider))
        });

        RegistryHealthResponse {
            tenant_id: tenant_id.to_string(),
            providers,
            checked_at: Utc::now(),
        }
    }

    /// Pick the banking provider a new transfer will execute against.
    ///
    /// A named provider must be actively registered. With no name given, the
    /// tenant must have exactly one active banking registration; zero or
    /// several is a validation error rather than a guess.
    pub fn resolve_banking_provider(
        &self,
        tenant_id: &str,
        requested: Option<&str>,
    ) -> Result<String, AppError> {
        if let Some(name) = requested {
            let key = RegistryKey::new(tenant_id, ServiceType::Banking, name);
            if self.entries.contains_key(&key) {
                return Ok(key.provider);
            }
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "banking_provider".to_string(),
                message: format!("No active banking registration for provider '{}'", key.provider),
            }));
        }

        let mut candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.key().tenant_id == tenant_id
                    && entry.key().service_type == ServiceType::Banking
            })
            .map(|entry| entry.key().provider.clone())
            .collect();

        match candidates.len() {
            0 => Err(AppError::Validation(ValidationError::InvalidField {
                field: "banking_provider".to_string(),
                message: "Tenant has no active banking provider".to_string(),
            })),
            1 => Ok(candidates.remove(0)),
            _ => {
                candidates.sort();
                Err(AppError::Validation(ValidationError::InvalidField {
                    field: "banking_provider".to_string(),
                    message: format!(
                        "Tenant has several active banking providers, specify one of: {}",
                        candidates.join(", ")
                    ),
                }))
            }
        }
    }

    /// Banking adapter for an active registration.
    pub fn banking_for(
        &self,
        tenant_id: &str,
        provider: &str,
    ) -> Result<Arc<dyn BankingProvider>, AppError> {
        self.lookup(tenant_id, ServiceType::Banking, provider)?
            .as_banking()
    }

    /// All active compliance adapters for a tenant, sorted by provider name.
    #[must_use]
    pub fn compliance_providers(
        &self,
        tenant_id: &str,
    ) -> Vec<(String, Arc<dyn ScreeningProvider>)> {
        let mut providers: Vec<(String, Arc<dyn ScreeningProvider>)> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.key().tenant_id == tenant_id
                    && entry.key().service_type == ServiceType::Compliance
            })
            .filter_map(|entry| {
                entry
                    .value()
                    .as_compliance()
                    .ok()
                    .map(|provider| (entry.key().provider.clone(), provider))
            })
            .collect();
        providers.sort_by(|a, b| a.0.cmp(&b.0));
        providers
    }

    /// Number of active entries across all tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
