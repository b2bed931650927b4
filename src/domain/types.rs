//! Domain types with validation support.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Transfers at or below this amount are auto-approved on creation.
pub const APPROVAL_THRESHOLD: Decimal = dec!(10000.00);

/// Transfers above this amount require two approval levels.
pub const DUAL_APPROVAL_THRESHOLD: Decimal = dec!(50000.00);

/// Service type a provider registration belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Payment rails (card charges, ACH origination, wires, card issuing)
    Payment,
    /// Bank transfer execution and account verification
    Banking,
    /// Entity risk screening
    Compliance,
    /// External audit/event forwarding
    Audit,
    /// Tenant-specific integrations without a dedicated contract
    Specialized,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Banking => "banking",
            Self::Compliance => "compliance",
            Self::Audit => "audit",
            Self::Specialized => "specialized",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Self::Payment),
            "banking" => Ok(Self::Banking),
            "compliance" => Ok(Self::Compliance),
            "audit" => Ok(Self::Audit),
            "specialized" => Ok(Self::Specialized),
            _ => Err(format!("Invalid service type: {}", s)),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a transfer request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Awaiting the level-1 approval
    #[default]
    Pending,
    /// Auto-approved on creation, not yet executed
    Approved,
    /// Level-1 granted and awaiting level-2, or execution in flight
    Processing,
    /// Executed by the banking provider
    Completed,
    /// Provider execution failed; re-executable with an idempotency key
    Failed,
    /// Rejected before execution
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid transfer status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ACH transfer direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    /// Push funds to the recipient account
    AchCredit,
    /// Pull funds from the counterparty account
    AchDebit,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AchCredit => "ach_credit",
            Self::AchDebit => "ach_debit",
        }
    }
}

impl std::str::FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ach_credit" => Ok(Self::AchCredit),
            "ach_debit" => Ok(Self::AchDebit),
            _ => Err(format!("Invalid transfer type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision recorded in a transfer's approvals list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// Outcome of a compliance screening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningDecision {
    /// All providers approved and the aggregate score is low
    Compliant,
    /// At least one provider rejected with a low aggregate score
    NonCompliant,
    /// Elevated or indeterminate risk; route to a human reviewer
    PendingReview,
}

impl ScreeningDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::PendingReview => "pending_review",
        }
    }
}

impl std::str::FromStr for ScreeningDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compliant" => Ok(Self::Compliant),
            "non_compliant" => Ok(Self::NonCompliant),
            "pending_review" => Ok(Self::PendingReview),
            _ => Err(format!("Invalid screening decision: {}", s)),
        }
    }
}

impl std::fmt::Display for ScreeningDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role attached to the authenticated actor by the upstream gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Manager,
    Clerk,
    Auditor,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Clerk => "clerk",
            Self::Auditor => "auditor",
        }
    }

    /// Approve, reject and execute transfers.
    pub fn can_approve_transfers(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    /// Create and update provider registrations.
    pub fn can_manage_registrations(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Submit new transfer requests.
    pub fn can_initiate_transfers(&self) -> bool {
        !matches!(self, Self::Auditor)
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "clerk" => Ok(Self::Clerk),
            "auditor" => Ok(Self::Auditor),
            _ => Err(format!("Invalid actor role: {}", s)),
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticated actor identity supplied by the upstream gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: String,
    pub role: ActorRole,
    /// Best-effort client address for the audit trail
    pub source_ip: Option<String>,
}

impl ActorContext {
    #[must_use]
    pub fn new(actor_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            source_ip: None,
        }
    }

    #[must_use]
    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }
}

/// Composite key identifying one provider registration.
///
/// Provider names are case-insensitive; tenant ids are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub tenant_id: String,
    pub service_type: ServiceType,
    pub provider: String,
}

impl RegistryKey {
    #[must_use]
    pub fn new(tenant_id: &str, service_type: ServiceType, provider: &str) -> Self {
        Self {
            tenant_id: tenant_id.trim().to_string(),
            service_type,
            provider: provider.trim().to_lowercase(),
        }
    }
}

impl std::fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.service_type, self.provider)
    }
}

/// A tenant's registration of one provider for one service type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServiceRegistration {
    /// Unique identifier (UUIDv7); stable across upserts of the same key
    #[schema(example = "01937b2a-7e7c-7d3e-8f1a-2b3c4d5e6f70")]
    pub id: String,
    #[schema(example = "acme-county")]
    pub tenant_id: String,
    pub service_type: ServiceType,
    /// Provider name from the supported catalog (stored lowercase)
    #[schema(example = "stripe")]
    pub provider: String,
    /// Opaque provider configuration, validated by the provider itself
    #[schema(value_type = Object)]
    pub configuration: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRegistration {
    #[must_use]
    pub fn key(&self) -> RegistryKey {
        RegistryKey::new(&self.tenant_id, self.service_type, &self.provider)
    }
}

/// One approval or rejection recorded on a transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Approval {
    #[schema(example = "manager-17")]
    pub approver_id: String,
    /// Approval level this entry satisfies (1 or 2)
    #[schema(example = 1)]
    pub level: i16,
    pub decision: ApprovalDecision,
    pub comments: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Core transfer request entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TransferRequest {
    /// Unique identifier (UUIDv7)
    #[schema(example = "01937b2a-7e7c-7d3e-8f1a-2b3c4d5e6f71")]
    pub id: String,
    #[schema(example = "acme-county")]
    pub tenant_id: String,
    /// Actor who submitted the transfer
    #[schema(example = "clerk-42")]
    pub initiated_by: String,
    /// Transfer amount, fixed two-decimal scale
    #[schema(value_type = String, example = "75000.00")]
    pub amount: Decimal,
    /// Opaque reference to the recipient account held by the banking provider
    #[schema(example = "acct_9f8e7d6c")]
    pub recipient_account_ref: String,
    pub transfer_type: TransferType,
    pub description: Option<String>,
    /// Banking provider resolved at creation and used for execution
    #[schema(example = "treasury")]
    pub banking_provider: String,
    pub status: TransferStatus,
    /// Number of approvals required before execution (1 or 2)
    #[schema(example = 2)]
    pub required_approval_level: i16,
    /// Ordered approval trail; append-only
    pub approvals: Vec<Approval>,
    /// Transaction reference returned by the banking provider on success
    pub provider_transaction_ref: Option<String>,
    /// Optimistic concurrency counter; bumped on every mutation
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the transfer reaches a terminal status
    pub terminal_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    /// Tiering rule: strictly above 10000.00 requires human approval.
    pub fn requires_approval(amount: Decimal) -> bool {
        amount > APPROVAL_THRESHOLD
    }

    /// Tiering rule: strictly above 50000.00 requires two approval levels.
    pub fn required_level_for(amount: Decimal) -> i16 {
        if amount > DUAL_APPROVAL_THRESHOLD { 2 } else { 1 }
    }

    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        tenant_id: String,
        initiated_by: String,
        amount: Decimal,
        recipient_account_ref: String,
        transfer_type: TransferType,
        description: Option<String>,
        banking_provider: String,
    ) -> Self {
        let now = Utc::now();
        let status = if Self::requires_approval(amount) {
            TransferStatus::Pending
        } else {
            TransferStatus::Approved
        };
        Self {
            id,
            tenant_id,
            initiated_by,
            amount,
            recipient_account_ref,
            transfer_type,
            description,
            banking_provider,
            status,
            required_approval_level: Self::required_level_for(amount),
            approvals: Vec::new(),
            provider_transaction_ref: None,
            version: 0,
            created_at: now,
            updated_at: now,
            terminal_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Count of granted approvals (rejections excluded).
    pub fn approved_count(&self) -> usize {
        self.approvals
            .iter()
            .filter(|a| a.decision == ApprovalDecision::Approved)
            .count()
    }

    pub fn has_approver(&self, approver_id: &str) -> bool {
        self.approvals.iter().any(|a| a.approver_id == approver_id)
    }
}

impl Default for TransferRequest {
    fn default() -> Self {
        Self::new(
            "default_id".to_string(),
            "default_tenant".to_string(),
            "default_actor".to_string(),
            dec!(1.00),
            "default_account".to_string(),
            TransferType::AchCredit,
            None,
            "sandbox".to_string(),
        )
    }
}

/// One provider's contribution to a screening aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ProviderScreeningResult {
    #[schema(example = "ofac")]
    pub provider: String,
    /// Risk score in [0, 10]; null when the provider errored or timed out
    #[schema(example = 2.5)]
    pub risk_score: Option<f64>,
    pub approved: bool,
    /// Provider-reported flags, or `provider_error:<name>` for synthetic entries
    pub flags: Vec<String>,
}

/// Persisted record of one screening event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ComplianceScreeningRecord {
    /// Unique identifier (UUIDv7)
    pub id: String,
    pub tenant_id: String,
    #[schema(example = "vendor")]
    pub entity_type: String,
    #[schema(example = "vendor-301")]
    pub entity_id: String,
    pub provider_results: Vec<ProviderScreeningResult>,
    /// Mean of the non-null provider scores; null when every provider errored
    pub aggregate_risk_score: Option<f64>,
    pub decision: ScreeningDecision,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AuditLogEntry {
    /// Unique identifier (UUIDv7, reconstructs insertion order)
    pub id: String,
    pub tenant_id: String,
    pub actor_id: String,
    /// Action name, e.g. `ach_transfer_approved`
    #[schema(example = "ach_transfer_approved")]
    pub action: String,
    #[schema(example = "transfer_request")]
    pub entity_type: String,
    pub entity_id: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub source_ip: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ==== Provider-facing call types ====

/// Screening input passed to every compliance provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningRequest {
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Entity attributes the provider may inspect (names, addresses, ids)
    pub payload: serde_json::Value,
}

/// A single provider's screening verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningVerdict {
    /// Risk score in [0, 10]
    pub risk_score: Option<f64>,
    pub approved: bool,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Execution order passed to the resolved banking provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteTransferRequest {
    pub transfer_id: String,
    pub tenant_id: String,
    pub amount: Decimal,
    pub recipient_account_ref: String,
    pub transfer_type: TransferType,
    pub description: Option<String>,
    /// Supplied on re-execution so the provider can dedup upstream
    pub idempotency_key: Option<String>,
}

/// Banking provider's acknowledgement of an executed transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferReceipt {
    pub transaction_ref: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Result of a banking account verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountVerification {
    pub account_ref: String,
    pub verified: bool,
    pub detail: Option<String>,
}

/// Payment instruction for card, ACH or wire rails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub tenant_id: String,
    pub amount: Decimal,
    /// Caller-chosen reference echoed back by the provider
    pub reference: String,
    pub description: Option<String>,
}

/// Provider acknowledgement of an accepted payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
    pub payment_ref: String,
    pub accepted_at: Option<DateTime<Utc>>,
}

/// Card issuing request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardIssueRequest {
    pub tenant_id: String,
    pub holder_name: String,
    pub spending_limit: Option<Decimal>,
}

/// Issued card handle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedCard {
    pub card_ref: String,
    pub last_four: String,
}

// ==== API request/response types ====

fn default_configuration() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

/// Request to register (or upsert) a provider for a tenant
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterServiceRequest {
    #[validate(length(min = 1, max = 128, message = "Tenant id is required"))]
    #[schema(example = "acme-county")]
    pub tenant_id: String,
    pub service_type: ServiceType,
    #[validate(length(min = 1, max = 64, message = "Provider name is required"))]
    #[schema(example = "stripe")]
    pub provider: String,
    /// Opaque provider configuration, checked by the provider's own schema
    #[serde(default = "default_configuration")]
    #[schema(value_type = Object)]
    pub configuration: serde_json::Value,
    /// Registering with `false` deactivates the provider
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Response to a successful registration upsert
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterServiceResponse {
    /// Stable registration id for the composite key
    pub registration_id: String,
    pub tenant_id: String,
    pub service_type: ServiceType,
    pub provider: String,
    pub is_active: bool,
}

/// Registration listing entry; configuration values are never echoed back
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationSummary {
    pub id: String,
    pub service_type: ServiceType,
    pub provider: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ServiceRegistration> for RegistrationSummary {
    fn from(registration: &ServiceRegistration) -> Self {
        Self {
            id: registration.id.clone(),
            service_type: registration.service_type,
            provider: registration.provider.clone(),
            is_active: registration.is_active,
            created_at: registration.created_at,
            updated_at: registration.updated_at,
        }
    }
}

/// Request to screen an entity against a tenant's compliance providers
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ScreenEntityRequest {
    #[validate(length(min = 1, max = 128, message = "Tenant id is required"))]
    #[schema(example = "acme-county")]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 64, message = "Entity type is required"))]
    #[schema(example = "vendor")]
    pub entity_type: String,
    #[validate(length(min = 1, max = 128, message = "Entity id is required"))]
    #[schema(example = "vendor-301")]
    pub entity_id: String,
    /// Entity attributes forwarded to every provider
    #[serde(default = "default_configuration")]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Aggregated screening outcome
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScreeningOutcome {
    /// Id of the persisted screening record
    pub record_id: String,
    pub approved: bool,
    pub aggregate_risk_score: Option<f64>,
    pub requires_review: bool,
    pub decision: ScreeningDecision,
    pub results: Vec<ProviderScreeningResult>,
}

/// Request to submit a new transfer
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[validate(length(min = 1, max = 128, message = "Tenant id is required"))]
    #[schema(example = "acme-county")]
    pub tenant_id: String,
    /// Amount with at most two decimal places, strictly positive
    #[schema(value_type = String, example = "75000.00")]
    pub amount: Decimal,
    #[validate(length(min = 1, max = 256, message = "Recipient account ref is required"))]
    #[schema(example = "acct_9f8e7d6c")]
    pub recipient_account_ref: String,
    pub transfer_type: TransferType,
    #[validate(length(max = 1024, message = "Description too long"))]
    pub description: Option<String>,
    /// Explicit banking provider; optional when the tenant has exactly one
    #[validate(length(min = 1, max = 64, message = "Banking provider must not be blank"))]
    pub banking_provider: Option<String>,
}

/// Approval action body
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ApproveTransferRequest {
    #[validate(length(max = 1024, message = "Comments too long"))]
    pub comments: Option<String>,
}

/// Rejection action body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RejectTransferRequest {
    #[validate(length(min = 1, max = 1024, message = "Rejection reason is required"))]
    #[schema(example = "Vendor failed verification")]
    pub reason: String,
}

/// Execution / re-execution body
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExecuteTransferApiRequest {
    /// Required when re-executing a failed transfer
    #[validate(length(min = 1, max = 128, message = "Idempotency key must not be blank"))]
    pub idempotency_key: Option<String>,
}

fn default_limit() -> i64 {
    20
}

/// Query parameters for the transfer listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransferListParams {
    #[validate(length(min = 1, max = 128, message = "Tenant id is required"))]
    pub tenant_id: String,
    /// Maximum number of items to return (1-100, default: 20)
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    #[serde(default = "default_limit")]
    #[schema(example = 20)]
    pub limit: i64,
    /// Cursor for pagination (ID to start after)
    pub cursor: Option<String>,
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// List of items
    pub items: Vec<T>,
    /// Cursor for next page (null if no more items)
    pub next_cursor: Option<String>,
    /// Whether more items exist
    pub has_more: bool,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but functional
    Degraded,
    /// Critical systems unavailable
    Unhealthy,
}

/// One provider's ping outcome in a registry health check
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderHealthEntry {
    pub service_type: ServiceType,
    pub provider: String,
    pub status: HealthStatus,
    /// Ping failure detail, absent when healthy
    pub error: Option<String>,
}

/// Per-tenant registry health fan-out result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistryHealthResponse {
    pub tenant_id: String,
    pub providers: Vec<ProviderHealthEntry>,
    pub checked_at: DateTime<Utc>,
}

/// Service health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Database health status
    pub database: HealthStatus,
    /// Count of active provider registrations across all tenants
    pub registered_providers: u64,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus, registered_providers: u64) -> Self {
        Self {
            status: database,
            database,
            registered_providers,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "invalid_state")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "Transfer tr_1 is completed; no further transitions")]
    pub message: String,
}

/// Rate limit exceeded response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Seconds until rate limit resets
    #[schema(example = 60)]
    pub retry_after: u64,
}
