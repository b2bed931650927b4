//! Domain traits defining contracts for providers and persistence.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::AppError;
use super::types::{
    AccountVerification, AuditLogEntry, CardIssueRequest, ComplianceScreeningRecord,
    ExecuteTransferRequest, IssuedCard, PaginatedResponse, PaymentOrder, PaymentReceipt,
    ScreeningRequest, ScreeningVerdict, ServiceRegistration, ServiceType, TransferReceipt,
    TransferRequest,
};

/// Base contract every provider adapter satisfies.
///
/// Construction doubles as the provider's own configuration schema check:
/// adapters validate their configuration when built by the factory.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registered provider name (lowercase)
    fn name(&self) -> &str;

    /// Lightweight connectivity probe used by registry health checks
    async fn ping(&self) -> Result<(), AppError>;
}

/// Payment rail capabilities; adapters implement the subset they support.
#[async_trait]
pub trait PaymentProvider: ProviderAdapter {
    /// Charge a payment instrument
    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        let _ = order;
        Err(AppError::NotSupported(format!(
            "process_payment not supported by provider '{}'",
            self.name()
        )))
    }

    /// Originate an ACH payment
    async fn process_ach(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        let _ = order;
        Err(AppError::NotSupported(format!(
            "process_ach not supported by provider '{}'",
            self.name()
        )))
    }

    /// Send a wire payment
    async fn process_wire(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        let _ = order;
        Err(AppError::NotSupported(format!(
            "process_wire not supported by provider '{}'",
            self.name()
        )))
    }

    /// Issue a purchasing card
    async fn issue_card(&self, request: &CardIssueRequest) -> Result<IssuedCard, AppError> {
        let _ = request;
        Err(AppError::NotSupported(format!(
            "issue_card not supported by provider '{}'",
            self.name()
        )))
    }
}

/// Banking capabilities used by the approval workflow.
#[async_trait]
pub trait BankingProvider: ProviderAdapter {
    /// Execute an approved transfer; must be timeout-bounded by the caller
    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<TransferReceipt, AppError>;

    /// Verify that an account reference is real and payable
    async fn verify_account(&self, account_ref: &str) -> Result<AccountVerification, AppError> {
        let _ = account_ref;
        Err(AppError::NotSupported(format!(
            "verify_account not supported by provider '{}'",
            self.name()
        )))
    }
}

/// Compliance screening capability.
#[async_trait]
pub trait ScreeningProvider: ProviderAdapter {
    /// Screen one entity and return a verdict with a risk score in [0, 10]
    async fn screen_entity(
        &self,
        request: &ScreeningRequest,
    ) -> Result<ScreeningVerdict, AppError>;
}

/// A configured, ready-to-call provider resolved from the registry.
///
/// The variant fixes which capability set the registration grants; asking for
/// a different one is a typed error rather than an undefined-method fault.
#[derive(Clone)]
pub enum CapabilityHandle {
    Payment(Arc<dyn PaymentProvider>),
    Banking(Arc<dyn BankingProvider>),
    Compliance(Arc<dyn ScreeningProvider>),
    Audit(Arc<dyn ProviderAdapter>),
    Specialized(Arc<dyn ProviderAdapter>),
}

impl CapabilityHandle {
    pub fn service_type(&self) -> ServiceType {
        match self {
            Self::Payment(_) => ServiceType::Payment,
            Self::Banking(_) => ServiceType::Banking,
            Self::Compliance(_) => ServiceType::Compliance,
            Self::Audit(_) => ServiceType::Audit,
            Self::Specialized(_) => ServiceType::Specialized,
        }
    }

    pub fn provider_name(&self) -> &str {
        match self {
            Self::Payment(p) => p.name(),
            Self::Banking(p) => p.name(),
            Self::Compliance(p) => p.name(),
            Self::Audit(p) => p.name(),
            Self::Specialized(p) => p.name(),
        }
    }

    /// Base-contract ping, dispatched to whichever capability backs the handle
    pub async fn ping(&self) -> Result<(), AppError> {
        match self {
            Self::Payment(p) => p.ping().await,
            Self::Banking(p) => p.ping().await,
            Self::Compliance(p) => p.ping().await,
            Self::Audit(p) => p.ping().await,
            Self::Specialized(p) => p.ping().await,
        }
    }

    pub fn as_payment(&self) -> Result<Arc<dyn PaymentProvider>, AppError> {
        match self {
            Self::Payment(p) => Ok(Arc::clone(p)),
            _ => Err(AppError::NotSupported(format!(
                "provider '{}' is registered for {}, not payment",
                self.provider_name(),
                self.service_type()
            ))),
        }
    }

    pub fn as_banking(&self) -> Result<Arc<dyn BankingProvider>, AppError> {
        match self {
            Self::Banking(p) => Ok(Arc::clone(p)),
            _ => Err(AppError::NotSupported(format!(
                "provider '{}' is registered for {}, not banking",
                self.provider_name(),
                self.service_type()
            ))),
        }
    }

    pub fn as_compliance(&self) -> Result<Arc<dyn ScreeningProvider>, AppError> {
        match self {
            Self::Compliance(p) => Ok(Arc::clone(p)),
            _ => Err(AppError::NotSupported(format!(
                "provider '{}' is registered for {}, not compliance",
                self.provider_name(),
                self.service_type()
            ))),
        }
    }
}

impl std::fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("service_type", &self.service_type())
            .field("provider", &self.provider_name())
            .finish()
    }
}

/// Builds a capability handle from a registration.
///
/// Implementations own the catalog of supported provider names and reject
/// unknown names or invalid configuration with a validation error.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, registration: &ServiceRegistration) -> Result<CapabilityHandle, AppError>;
}

/// Database client trait for persistence operations
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Insert or update a registration on its composite key, returning the
    /// stored row (id and created_at survive upserts)
    async fn upsert_registration(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<ServiceRegistration, AppError>;

    /// All registrations for one tenant, active and inactive
    async fn list_registrations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ServiceRegistration>, AppError>;

    /// Every persisted registration; used to hydrate the registry at startup
    async fn load_all_registrations(&self) -> Result<Vec<ServiceRegistration>, AppError>;

    /// Insert a newly created transfer request
    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<(), AppError>;

    /// Get a single transfer request by ID
    async fn get_transfer(&self, id: &str) -> Result<Option<TransferRequest>, AppError>;

    /// Persist a transfer mutation if and only if the stored version still
    /// equals `expected_version`. A lost race surfaces as an invalid-state
    /// error, never as a silent overwrite.
    async fn update_transfer(
        &self,
        transfer: &TransferRequest,
        expected_version: i64,
    ) -> Result<(), AppError>;

    /// List a tenant's transfer requests with cursor-based pagination,
    /// newest first
    async fn list_transfers(
        &self,
        tenant_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<PaginatedResponse<TransferRequest>, AppError>;

    /// Insert one screening record; records are never updated
    async fn insert_screening(&self, record: &ComplianceScreeningRecord) -> Result<(), AppError>;

    /// Get a single screening record by ID
    async fn get_screening(
        &self,
        id: &str,
    ) -> Result<Option<ComplianceScreeningRecord>, AppError>;

    /// Append one audit entry; the audit log has no update or delete path
    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), AppError>;

    /// Audit entries for one entity, oldest first
    async fn list_audit_entries(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal implementations for testing default capability methods
    struct MinimalPaymentProvider;

    #[async_trait]
    impl ProviderAdapter for MinimalPaymentProvider {
        fn name(&self) -> &str {
            "minimal"
        }

        async fn ping(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PaymentProvider for MinimalPaymentProvider {}

    struct MinimalBankingProvider;

    #[async_trait]
    impl ProviderAdapter for MinimalBankingProvider {
        fn name(&self) -> &str {
            "minimal_bank"
        }

        async fn ping(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[async_trait]
    impl BankingProvider for MinimalBankingProvider {
        async fn execute_transfer(
            &self,
            _request: &ExecuteTransferRequest,
        ) -> Result<TransferReceipt, AppError> {
            Ok(TransferReceipt {
                transaction_ref: "txn_123".to_string(),
                posted_at: None,
            })
        }
    }

    #[tokio::test]
    async fn test_payment_capabilities_default_to_not_supported() {
        let provider = MinimalPaymentProvider;
        let order = PaymentOrder {
            tenant_id: "tenant".to_string(),
            amount: rust_decimal_macros::dec!(10.00),
            reference: "ref-1".to_string(),
            description: None,
        };

        assert!(matches!(
            provider.process_payment(&order).await,
            Err(AppError::NotSupported(_))
        ));
        assert!(matches!(
            provider.process_wire(&order).await,
            Err(AppError::NotSupported(_))
        ));

        let card = CardIssueRequest {
            tenant_id: "tenant".to_string(),
            holder_name: "Pat".to_string(),
            spending_limit: None,
        };
        assert!(matches!(
            provider.issue_card(&card).await,
            Err(AppError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_account_defaults_to_not_supported() {
        let provider = MinimalBankingProvider;
        let result = provider.verify_account("acct_1").await;
        assert!(matches!(result, Err(AppError::NotSupported(_))));
    }

    #[tokio::test]
    async fn test_capability_handle_dispatch() {
        let handle = CapabilityHandle::Banking(Arc::new(MinimalBankingProvider));
        assert_eq!(handle.service_type(), ServiceType::Banking);
        assert_eq!(handle.provider_name(), "minimal_bank");
        assert!(handle.ping().await.is_ok());

        let banking = handle.as_banking().unwrap();
        let receipt = banking
            .execute_transfer(&ExecuteTransferRequest {
                transfer_id: "tr_1".to_string(),
                tenant_id: "tenant".to_string(),
                amount: rust_decimal_macros::dec!(100.00),
                recipient_account_ref: "acct_1".to_string(),
                transfer_type: crate::domain::types::TransferType::AchCredit,
                description: None,
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.transaction_ref, "txn_123");
    }

    #[tokio::test]
    async fn test_capability_handle_wrong_capability_is_typed_error() {
        let handle = CapabilityHandle::Banking(Arc::new(MinimalBankingProvider));
        assert!(matches!(
            handle.as_compliance(),
            Err(AppError::NotSupported(_))
        ));
        assert!(matches!(handle.as_payment(), Err(AppError::NotSupported(_))));
    }
}
