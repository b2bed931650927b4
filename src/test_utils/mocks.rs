//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{
    AppError, AuditLogEntry, BankingProvider, CapabilityHandle, ComplianceScreeningRecord,
    DatabaseClient, DatabaseError, ExecuteTransferRequest, PaginatedResponse, PaymentOrder,
    PaymentProvider, PaymentReceipt, ProviderAdapter, ProviderError, ProviderFactory,
    RegistryKey, ScreeningProvider, ScreeningRequest, ScreeningVerdict, ServiceRegistration,
    ServiceType, TransferReceipt, TransferRequest, ValidationError,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// Mock database client for testing
pub struct MockDatabaseClient {
    registrations: Arc<Mutex<HashMap<RegistryKey, ServiceRegistration>>>,
    transfers: Arc<Mutex<HashMap<String, TransferRequest>>>,
    screenings: Arc<Mutex<HashMap<String, ComplianceScreeningRecord>>>,
    audit_entries: Arc<Mutex<Vec<AuditLogEntry>>>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockDatabaseClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            registrations: Arc::new(Mutex::new(HashMap::new())),
            transfers: Arc::new(Mutex::new(HashMap::new())),
            screenings: Arc::new(Mutex::new(HashMap::new())),
            audit_entries: Arc::new(Mutex::new(Vec::new())),
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Insert a registration directly, bypassing the upsert path (for hydration tests)
    pub fn seed_registration(&self, registration: ServiceRegistration) {
        self.registrations
            .lock()
            .unwrap()
            .insert(registration.key(), registration);
    }

    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }

    #[must_use]
    pub fn screening_count(&self) -> usize {
        self.screenings.lock().unwrap().len()
    }

    #[must_use]
    pub fn audit_entry_count(&self) -> usize {
        self.audit_entries.lock().unwrap().len()
    }

    /// All audit entries in insertion order (for testing)
    #[must_use]
    pub fn all_audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_entries.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message(),
            )));
        }
        Ok(())
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn upsert_registration(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<ServiceRegistration, AppError> {
        self.check_should_fail()?;
        let mut registrations = self.registrations.lock().unwrap();
        let key = registration.key();
        let stored = match registrations.get(&key) {
            Some(existing) => {
                // id and created_at survive upserts of the same composite key
                let mut updated = registration.clone();
                updated.id = existing.id.clone();
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                updated
            }
            None => registration.clone(),
        };
        registrations.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_registrations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ServiceRegistration>, AppError> {
        self.check_should_fail()?;
        let registrations = self.registrations.lock().unwrap();
        let mut items: Vec<ServiceRegistration> = registrations
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn load_all_registrations(&self) -> Result<Vec<ServiceRegistration>, AppError> {
        self.check_should_fail()?;
        let registrations = self.registrations.lock().unwrap();
        let mut items: Vec<ServiceRegistration> = registrations.values().cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut transfers = self.transfers.lock().unwrap();
        if transfers.contains_key(&transfer.id) {
            return Err(AppError::Database(DatabaseError::Duplicate(
                transfer.id.clone(),
            )));
        }
        transfers.insert(transfer.id.clone(), transfer.clone());
        Ok(())
    }

    async fn get_transfer(&self, id: &str) -> Result<Option<TransferRequest>, AppError> {
        self.check_should_fail()?;
        let transfers = self.transfers.lock().unwrap();
        Ok(transfers.get(id).cloned())
    }

    async fn update_transfer(
        &self,
        transfer: &TransferRequest,
        expected_version: i64,
    ) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut transfers = self.transfers.lock().unwrap();
        let Some(stored) = transfers.get_mut(&transfer.id) else {
            return Err(AppError::Database(DatabaseError::NotFound(
                transfer.id.clone(),
            )));
        };
        if stored.version != expected_version {
            return Err(AppError::InvalidState(format!(
                "Transfer {} was modified concurrently",
                transfer.id
            )));
        }
        let mut updated = transfer.clone();
        updated.version = expected_version + 1;
        updated.updated_at = Utc::now();
        *stored = updated;
        Ok(())
    }

    async fn list_transfers(
        &self,
        tenant_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<PaginatedResponse<TransferRequest>, AppError> {
        self.check_should_fail()?;
        let transfers = self.transfers.lock().unwrap();
        let mut items: Vec<TransferRequest> = transfers
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let items = if let Some(cursor_id) = cursor {
            match items.iter().position(|i| i.id == cursor_id) {
                Some(p) => items.into_iter().skip(p + 1).collect(),
                None => {
                    return Err(AppError::Validation(ValidationError::InvalidField {
                        field: "cursor".to_string(),
                        message: "Invalid cursor".to_string(),
                    }));
                }
            }
        } else {
            items
        };

        let limit = limit.clamp(1, 100) as usize;
        let has_more = items.len() > limit;
        let items: Vec<TransferRequest> = items.into_iter().take(limit).collect();
        let next_cursor = if has_more {
            items.last().map(|i| i.id.clone())
        } else {
            None
        };

        Ok(PaginatedResponse::new(items, next_cursor, has_more))
    }

    async fn insert_screening(&self, record: &ComplianceScreeningRecord) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut screenings = self.screenings.lock().unwrap();
        screenings.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_screening(
        &self,
        id: &str,
    ) -> Result<Option<ComplianceScreeningRecord>, AppError> {
        self.check_should_fail()?;
        let screenings = self.screenings.lock().unwrap();
        Ok(screenings.get(id).cloned())
    }

    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        self.check_should_fail()?;
        let mut audit_entries = self.audit_entries.lock().unwrap();
        audit_entries.push(entry.clone());
        Ok(())
    }

    async fn list_audit_entries(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        self.check_should_fail()?;
        let audit_entries = self.audit_entries.lock().unwrap();
        Ok(audit_entries
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.entity_type == entity_type
                    && e.entity_id == entity_id
            })
            .cloned()
            .collect())
    }
}

/// Mock banking provider for testing transfer execution
pub struct MockBankingProvider {
    name: String,
    config: MockConfig,
    decline: bool,
    fail_ping: bool,
    ping_delay: Option<Duration>,
    execution_delay: Option<Duration>,
    executed: Arc<Mutex<Vec<ExecuteTransferRequest>>>,
}

impl MockBankingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock_bank".to_string(),
            config: MockConfig::success(),
            decline: false,
            fail_ping: false,
            ping_delay: None,
            execution_delay: None,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails `execute_transfer` with a provider-unavailable error
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Self::new()
        }
    }

    /// Fails `execute_transfer` with a provider-declined error
    #[must_use]
    pub fn declining(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            decline: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    #[must_use]
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = Some(delay);
        self
    }

    /// All execution requests received, in call order
    #[must_use]
    pub fn executed_requests(&self) -> Vec<ExecuteTransferRequest> {
        self.executed.lock().unwrap().clone()
    }

    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

impl Default for MockBankingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockBankingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_ping {
            return Err(AppError::Provider(ProviderError::Unavailable(
                "Mock ping failure".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BankingProvider for MockBankingProvider {
    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<TransferReceipt, AppError> {
        if let Some(delay) = self.execution_delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.should_fail {
            let message = self.config.message();
            return Err(AppError::Provider(if self.decline {
                ProviderError::Declined(message)
            } else {
                ProviderError::Unavailable(message)
            }));
        }
        self.executed.lock().unwrap().push(request.clone());
        // Deterministic per transfer id, like an idempotent upstream
        Ok(TransferReceipt {
            transaction_ref: format!("txn_{}", request.transfer_id),
            posted_at: Some(Utc::now()),
        })
    }
}

/// Mock compliance screening provider with a fixed verdict
pub struct MockScreeningProvider {
    name: String,
    verdict: ScreeningVerdict,
    config: MockConfig,
    fail_ping: bool,
    ping_delay: Option<Duration>,
    screen_delay: Option<Duration>,
    screened: Arc<Mutex<Vec<ScreeningRequest>>>,
}

impl MockScreeningProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_verdict(ScreeningVerdict {
            risk_score: Some(1.0),
            approved: true,
            flags: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_verdict(verdict: ScreeningVerdict) -> Self {
        Self {
            name: "mock_screen".to_string(),
            verdict,
            config: MockConfig::success(),
            fail_ping: false,
            ping_delay: None,
            screen_delay: None,
            screened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Approving verdict with the given risk score
    #[must_use]
    pub fn with_score(score: f64) -> Self {
        Self::with_verdict(ScreeningVerdict {
            risk_score: Some(score),
            approved: true,
            flags: Vec::new(),
        })
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure(message),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_screen_delay(mut self, delay: Duration) -> Self {
        self.screen_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    #[must_use]
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn screened_count(&self) -> usize {
        self.screened.lock().unwrap().len()
    }
}

impl Default for MockScreeningProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockScreeningProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_ping {
            return Err(AppError::Provider(ProviderError::Unavailable(
                "Mock ping failure".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ScreeningProvider for MockScreeningProvider {
    async fn screen_entity(
        &self,
        request: &ScreeningRequest,
    ) -> Result<ScreeningVerdict, AppError> {
        if let Some(delay) = self.screen_delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.should_fail {
            return Err(AppError::Provider(ProviderError::Unavailable(
                self.config.message(),
            )));
        }
        self.screened.lock().unwrap().push(request.clone());
        Ok(self.verdict.clone())
    }
}

/// Mock payment provider supporting card and ACH rails only
pub struct MockPaymentProvider {
    name: String,
    config: MockConfig,
}

impl MockPaymentProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock_pay".to_string(),
            config: MockConfig::success(),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            name: "mock_pay".to_string(),
            config: MockConfig::failure(message),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Provider(ProviderError::Unavailable(
                self.config.message(),
            )));
        }
        Ok(())
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockPaymentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_should_fail()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        self.check_should_fail()?;
        Ok(PaymentReceipt {
            payment_ref: format!("pay_{}", order.reference),
            accepted_at: Some(Utc::now()),
        })
    }

    async fn process_ach(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        self.check_should_fail()?;
        Ok(PaymentReceipt {
            payment_ref: format!("ach_{}", order.reference),
            accepted_at: Some(Utc::now()),
        })
    }
}

/// Bare adapter for audit and specialized service slots
pub struct MockAdapter {
    name: String,
    fail_ping: bool,
    ping_delay: Option<Duration>,
}

impl MockAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_ping: false,
            ping_delay: None,
        }
    }

    #[must_use]
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    #[must_use]
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_ping {
            return Err(AppError::Provider(ProviderError::Unavailable(
                "Mock ping failure".to_string(),
            )));
        }
        Ok(())
    }
}

/// Mock provider factory driven by registration configuration.
///
/// Recognized configuration keys:
/// - `ping_fail` (bool): built provider fails pings
/// - `ping_delay_ms` (u64): built provider delays pings
/// - `fail_transfers` (bool): banking provider fails executions
/// - `decline_transfers` (bool): banking provider declines executions
/// - `execution_delay_ms` (u64): banking provider delays executions
/// - `fail_screening` (bool): screening provider errors
/// - `screen_delay_ms` (u64): screening provider delays verdicts
/// - `risk_score` (f64): screening verdict score
/// - `approved` (bool): screening verdict approval
/// - `flags` ([string]): screening verdict flags
pub struct MockProviderFactory {
    rejecting: Option<String>,
    built: Arc<Mutex<Vec<RegistryKey>>>,
}

impl MockProviderFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rejecting: None,
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rejects builds for the named provider with a validation error
    #[must_use]
    pub fn rejecting(provider: impl Into<String>) -> Self {
        Self {
            rejecting: Some(provider.into()),
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Keys of every successful build, in call order
    #[must_use]
    pub fn built_keys(&self) -> Vec<RegistryKey> {
        self.built.lock().unwrap().clone()
    }

    #[must_use]
    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }
}

impl Default for MockProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn config_flag(configuration: &serde_json::Value, key: &str) -> bool {
    configuration
        .get(key)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

fn config_delay(configuration: &serde_json::Value, key: &str) -> Option<Duration> {
    configuration
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .map(Duration::from_millis)
}

impl ProviderFactory for MockProviderFactory {
    fn build(&self, registration: &ServiceRegistration) -> Result<CapabilityHandle, AppError> {
        if self.rejecting.as_deref() == Some(registration.provider.as_str()) {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "provider".to_string(),
                message: format!("Unsupported provider '{}'", registration.provider),
            }));
        }

        let configuration = &registration.configuration;
        let ping_fail = config_flag(configuration, "ping_fail");
        let ping_delay = config_delay(configuration, "ping_delay_ms");

        let handle = match registration.service_type {
            ServiceType::Banking => {
                let mut provider = if config_flag(configuration, "fail_transfers") {
                    MockBankingProvider::failing("Configured to fail transfers")
                } else if config_flag(configuration, "decline_transfers") {
                    MockBankingProvider::declining("Configured to decline transfers")
                } else {
                    MockBankingProvider::new()
                }
                .with_name(&registration.provider);
                if let Some(delay) = config_delay(configuration, "execution_delay_ms") {
                    provider = provider.with_execution_delay(delay);
                }
                if ping_fail {
                    provider = provider.with_failing_ping();
                }
                if let Some(delay) = ping_delay {
                    provider = provider.with_ping_delay(delay);
                }
                CapabilityHandle::Banking(Arc::new(provider))
            }
            ServiceType::Compliance => {
                let mut provider = if config_flag(configuration, "fail_screening") {
                    MockScreeningProvider::failing("Configured to fail screening")
                } else {
                    MockScreeningProvider::with_verdict(ScreeningVerdict {
                        risk_score: configuration
                            .get("risk_score")
                            .and_then(serde_json::Value::as_f64)
                            .or(Some(1.0)),
                        approved: configuration
                            .get("approved")
                            .and_then(serde_json::Value::as_bool)
                            .unwrap_or(true),
                        flags: configuration
                            .get("flags")
                            .and_then(serde_json::Value::as_array)
                            .map(|values| {
                                values
                                    .iter()
                                    .filter_map(|v| v.as_str().map(String::from))
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                }
                .with_name(&registration.provider);
                if let Some(delay) = config_delay(configuration, "screen_delay_ms") {
                    provider = provider.with_screen_delay(delay);
                }
                if ping_fail {
                    provider = provider.with_failing_ping();
                }
                if let Some(delay) = ping_delay {
                    provider = provider.with_ping_delay(delay);
                }
                CapabilityHandle::Compliance(Arc::new(provider))
            }
            ServiceType::Payment => {
                let provider = MockPaymentProvider::new().with_name(&registration.provider);
                CapabilityHandle::Payment(Arc::new(provider))
            }
            ServiceType::Audit | ServiceType::Specialized => {
                let mut adapter = MockAdapter::new(&registration.provider);
                if ping_fail {
                    adapter = adapter.with_failing_ping();
                }
                if let Some(delay) = ping_delay {
                    adapter = adapter.with_ping_delay(delay);
                }
                match registration.service_type {
                    ServiceType::Audit => CapabilityHandle::Audit(Arc::new(adapter)),
                    _ => CapabilityHandle::Specialized(Arc::new(adapter)),
                }
            }
        };

        self.built.lock().unwrap().push(registration.key());
        Ok(handle)
    }
}

/// Shorthand for a registration used across tests
#[must_use]
pub fn test_registration(
    tenant_id: &str,
    service_type: ServiceType,
    provider: &str,
    configuration: serde_json::Value,
) -> ServiceRegistration {
    let now = Utc::now();
    ServiceRegistration {
        id: uuid::Uuid::now_v7().to_string(),
        tenant_id: tenant_id.to_string(),
        service_type,
        provider: provider.to_string(),
        configuration,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
