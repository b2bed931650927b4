//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, DatabaseError, ProviderError, ValidationError};
pub use traits::{
    BankingProvider, CapabilityHandle, DatabaseClient, PaymentProvider, ProviderAdapter,
    ProviderFactory, ScreeningProvider,
};
pub use types::{
    AccountVerification, ActorContext, ActorRole, Approval, ApprovalDecision,
    ApproveTransferRequest, AuditLogEntry, CardIssueRequest, ComplianceScreeningRecord,
    CreateTransferRequest, ErrorDetail, ErrorResponse, ExecuteTransferApiRequest,
    ExecuteTransferRequest, HealthResponse, HealthStatus, IssuedCard, PaginatedResponse,
    PaymentOrder, PaymentReceipt, ProviderHealthEntry, ProviderScreeningResult,
    RateLimitResponse, RegisterServiceRequest, RegisterServiceResponse, RegistrationSummary,
    RegistryHealthResponse, RegistryKey, RejectTransferRequest, ScreenEntityRequest,
    ScreeningDecision, ScreeningOutcome, ScreeningRequest, ScreeningVerdict,
    ServiceRegistration, ServiceType, TransferListParams, TransferReceipt, TransferRequest,
    TransferStatus, TransferType,
};
