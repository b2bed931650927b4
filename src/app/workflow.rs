//! Amount-tiered ACH approval workflow.
//!
//! Transfers above 10000.00 need one human approval, above 50000.00 two.
//! Every transition is applied under an optimistic version check, so two
//! concurrent decisions on the same transfer can never both land: the loser
//! gets an invalid-state error instead of a silent double-append.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::audit::{AuditTrail, actions, entities};
use crate::app::registry::ServiceRegistry;
use crate::domain::{
    ActorContext, AppError, Approval, ApprovalDecision, ApproveTransferRequest, AuditLogEntry,
    CreateTransferRequest, DatabaseClient, ExecuteTransferApiRequest, ExecuteTransferRequest,
    PaginatedResponse, ProviderError, RejectTransferRequest, TransferListParams, TransferReceipt,
    TransferRequest, TransferStatus, ValidationError,
};

/// Default budget for one banking provider execution call
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// State machine owning a transfer request's lifecycle.
///
/// Execution happens synchronously inside the final approval (or an explicit
/// execute call): the transfer is first claimed via a version-checked write,
/// then the banking provider is invoked, then the terminal state is written.
/// The claim is what prevents two racing finalizers from both executing.
pub struct AchApprovalWorkflow {
    db: Arc<dyn DatabaseClient>,
    registry: Arc<ServiceRegistry>,
    audit: Arc<AuditTrail>,
    execution_timeout: Duration,
}

impl AchApprovalWorkflow {
    #[must_use]
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        registry: Arc<ServiceRegistry>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            db,
            registry,
            audit,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    /// Override the banking provider execution budget.
    #[must_use]
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Submit a new transfer request.
    ///
    /// Amounts at or below 10000.00 auto-approve; above that the transfer
    /// waits for one approval, above 50000.00 for two. The banking provider
    /// is resolved now and pinned to the transfer for its whole lifetime.
    #[instrument(
        skip(self, request, actor),
        fields(tenant_id = %request.tenant_id, amount = %request.amount)
    )]
    pub async fn create_transfer(
        &self,
        request: &CreateTransferRequest,
        actor: &ActorContext,
    ) -> Result<TransferRequest, AppError> {
        if !actor.role.can_initiate_transfers() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot initiate transfers",
                actor.role
            )));
        }
        request.validate()?;
        let amount = normalize_amount(request.amount)?;

        let banking_provider = self
            .registry
            .resolve_banking_provider(&request.tenant_id, request.banking_provider.as_deref())?;

        let transfer = TransferRequest::new(
            Uuid::now_v7().to_string(),
            request.tenant_id.clone(),
            actor.actor_id.clone(),
            amount,
            request.recipient_account_ref.clone(),
            request.transfer_type,
            request.description.clone(),
            banking_provider,
        );
        self.db.insert_transfer(&transfer).await?;

        self.audit
            .record(
                &transfer.tenant_id,
                actor,
                actions::TRANSFER_CREATED,
                entities::TRANSFER_REQUEST,
                &transfer.id,
                serde_json::json!({
                    "amount": transfer.amount,
                    "status": transfer.status,
                    "required_approval_level": transfer.required_approval_level,
                    "banking_provider": transfer.banking_provider,
                }),
            )
            .await?;

        info!(
            id = %transfer.id,
            status = %transfer.status.as_str(),
            required_approval_level = transfer.required_approval_level,
            "Transfer request created"
        );
        Ok(transfer)
    }

    /// Record one approval, executing the transfer when it is the last one.
    ///
    /// On a dual-approval transfer the first approval moves it to processing
    /// and returns without any provider call. The final approval claims the
    /// transfer, invokes the banking provider and lands on completed or
    /// failed; a failed execution keeps the approval trail and is retriable
    /// through `execute`.
    #[instrument(skip(self, request, actor), fields(approver = %actor.actor_id))]
    pub async fn approve(
        &self,
        id: &str,
        request: &ApproveTransferRequest,
        actor: &ActorContext,
    ) -> Result<TransferRequest, AppError> {
        if !actor.role.can_approve_transfers() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot approve transfers",
                actor.role
            )));
        }
        request.validate()?;

        let mut transfer = self.load(id).await?;
        if transfer.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Transfer {} is {} and admits no further transitions",
                id,
                transfer.status.as_str()
            )));
        }
        if transfer.has_approver(&actor.actor_id) {
            return Err(AppError::InvalidState(format!(
                "Actor '{}' already recorded a decision on transfer {}",
                actor.actor_id, id
            )));
        }

        let loaded_version = transfer.version;
        let pending_approvals =
            (transfer.approved_count() as i16) < transfer.required_approval_level;

        match (transfer.status, transfer.required_approval_level) {
            (TransferStatus::Pending, 2) => {
                transfer.approvals.push(Approval {
                    approver_id: actor.actor_id.clone(),
                    level: 1,
                    decision: ApprovalDecision::Approved,
                    comments: request.comments.clone(),
                    timestamp: Utc::now(),
                });
                transfer.status = TransferStatus::Processing;
                self.db.update_transfer(&transfer, loaded_version).await?;
                transfer.version = loaded_version + 1;

                self.audit
                    .record(
                        &transfer.tenant_id,
                        actor,
                        actions::TRANSFER_APPROVED,
                        entities::TRANSFER_REQUEST,
                        &transfer.id,
                        serde_json::json!({
                            "level": 1,
                            "amount": transfer.amount,
                            "comments": request.comments,
                        }),
                    )
                    .await?;

                info!(id = %transfer.id, "Level-1 approval recorded, awaiting level-2");
                Ok(transfer)
            }
            (TransferStatus::Pending, 1) | (TransferStatus::Processing, 2)
                if pending_approvals =>
            {
                let level = transfer.required_approval_level;
                transfer.approvals.push(Approval {
                    approver_id: actor.actor_id.clone(),
                    level,
                    decision: ApprovalDecision::Approved,
                    comments: request.comments.clone(),
                    timestamp: Utc::now(),
                });
                transfer.status = TransferStatus::Processing;
                // Claim before calling out; a racing approver loses here,
                // not after the money moved
                self.db.update_transfer(&transfer, loaded_version).await?;
                transfer.version = loaded_version + 1;

                let execution_error = self.finalize_execution(&mut transfer, None).await?;

                self.audit
                    .record(
                        &transfer.tenant_id,
                        actor,
                        actions::TRANSFER_APPROVED,
                        entities::TRANSFER_REQUEST,
                        &transfer.id,
                        serde_json::json!({
                            "level": level,
                            "amount": transfer.amount,
                            "comments": request.comments,
                            "execution": transfer.status.as_str(),
                            "error": execution_error,
                        }),
                    )
                    .await?;

                Ok(transfer)
            }
            _ => Err(AppError::InvalidState(format!(
                "Transfer {} cannot be approved in status '{}'",
                id,
                transfer.status.as_str()
            ))),
        }
    }

    /// Cancel a transfer awaiting approval, recording rejector and reason.
    #[instrument(skip(self, request, actor), fields(rejector = %actor.actor_id))]
    pub async fn reject(
        &self,
        id: &str,
        request: &RejectTransferRequest,
        actor: &ActorContext,
    ) -> Result<TransferRequest, AppError> {
        if !actor.role.can_approve_transfers() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot reject transfers",
                actor.role
            )));
        }
        request.validate()?;

        let mut transfer = self.load(id).await?;
        if transfer.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Transfer {} is {} and admits no further transitions",
                id,
                transfer.status.as_str()
            )));
        }
        if transfer.status == TransferStatus::Approved {
            return Err(AppError::InvalidState(format!(
                "Transfer {} was auto-approved and cannot be rejected",
                id
            )));
        }
        // A fully approved processing transfer is mid-execution
        if transfer.status == TransferStatus::Processing
            && (transfer.approved_count() as i16) >= transfer.required_approval_level
        {
            return Err(AppError::InvalidState(format!(
                "Transfer {} is executing and can no longer be rejected",
                id
            )));
        }

        let loaded_version = transfer.version;
        let level = (transfer.approved_count() + 1) as i16;
        transfer.approvals.push(Approval {
            approver_id: actor.actor_id.clone(),
            level,
            decision: ApprovalDecision::Rejected,
            comments: Some(request.reason.clone()),
            timestamp: Utc::now(),
        });
        transfer.status = TransferStatus::Cancelled;
        transfer.terminal_at = Some(Utc::now());
        self.db.update_transfer(&transfer, loaded_version).await?;
        transfer.version = loaded_version + 1;

        self.audit
            .record(
                &transfer.tenant_id,
                actor,
                actions::TRANSFER_REJECTED,
                entities::TRANSFER_REQUEST,
                &transfer.id,
                serde_json::json!({
                    "reason": request.reason,
                    "amount": transfer.amount,
                }),
            )
            .await?;

        warn!(id = %transfer.id, reason = %request.reason, "Transfer rejected");
        Ok(transfer)
    }

    /// Execute an auto-approved transfer, or retry a failed execution.
    ///
    /// Retrying requires an idempotency key so the banking provider can
    /// dedup a transfer that actually went through before the failure
    /// reached us.
    #[instrument(skip(self, request, actor), fields(actor = %actor.actor_id))]
    pub async fn execute(
        &self,
        id: &str,
        request: &ExecuteTransferApiRequest,
        actor: &ActorContext,
    ) -> Result<TransferRequest, AppError> {
        if !actor.role.can_approve_transfers() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot execute transfers",
                actor.role
            )));
        }
        request.validate()?;

        let mut transfer = self.load(id).await?;
        match transfer.status {
            TransferStatus::Approved => {}
            TransferStatus::Failed => {
                if request.idempotency_key.is_none() {
                    return Err(AppError::Validation(ValidationError::MissingField(
                        "idempotency_key".to_string(),
                    )));
                }
            }
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Transfer {} cannot be executed in status '{}'",
                    id,
                    transfer.status.as_str()
                )));
            }
        }

        let loaded_version = transfer.version;
        transfer.status = TransferStatus::Processing;
        transfer.terminal_at = None;
        // Claim: a concurrent execute of the same transfer loses the version race
        self.db.update_transfer(&transfer, loaded_version).await?;
        transfer.version = loaded_version + 1;

        let execution_error = self
            .finalize_execution(&mut transfer, request.idempotency_key.clone())
            .await?;

        self.audit
            .record(
                &transfer.tenant_id,
                actor,
                actions::TRANSFER_EXECUTED,
                entities::TRANSFER_REQUEST,
                &transfer.id,
                serde_json::json!({
                    "amount": transfer.amount,
                    "outcome": transfer.status.as_str(),
                    "error": execution_error,
                    "idempotency_key": request.idempotency_key,
                }),
            )
            .await?;

        Ok(transfer)
    }

    /// Get a transfer request by id.
    #[instrument(skip(self))]
    pub async fn get_transfer(&self, id: &str) -> Result<Option<TransferRequest>, AppError> {
        self.db.get_transfer(id).await
    }

    /// List a tenant's transfers, newest first.
    #[instrument(skip(self, params), fields(tenant_id = %params.tenant_id))]
    pub async fn list_transfers(
        &self,
        params: &TransferListParams,
    ) -> Result<PaginatedResponse<TransferRequest>, AppError> {
        params.validate()?;
        self.db
            .list_transfers(&params.tenant_id, params.limit, params.cursor.as_deref())
            .await
    }

    /// Full audit trail of one transfer, oldest entry first.
    #[instrument(skip(self))]
    pub async fn audit_trail(&self, id: &str) -> Result<Vec<AuditLogEntry>, AppError> {
        let transfer = self.load(id).await?;
        self.audit
            .entries_for(&transfer.tenant_id, entities::TRANSFER_REQUEST, id)
            .await
    }

    async fn load(&self, id: &str) -> Result<TransferRequest, AppError> {
        self.db
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", id)))
    }

    /// Run the provider call on an already-claimed transfer and persist the
    /// terminal state. Returns the execution error detail, if any; the error
    /// itself lives in the transfer's failed status, not in the result.
    async fn finalize_execution(
        &self,
        transfer: &mut TransferRequest,
        idempotency_key: Option<String>,
    ) -> Result<Option<String>, AppError> {
        let claimed_version = transfer.version;
        let execution_error = match self.call_banking_provider(transfer, idempotency_key).await {
            Ok(receipt) => {
                transfer.status = TransferStatus::Completed;
                transfer.provider_transaction_ref = Some(receipt.transaction_ref);
                None
            }
            Err(e) => {
                warn!(id = %transfer.id, error = %e, "Transfer execution failed");
                transfer.status = TransferStatus::Failed;
                Some(e.to_string())
            }
        };
        transfer.terminal_at = Some(Utc::now());
        self.db.update_transfer(transfer, claimed_version).await?;
        transfer.version = claimed_version + 1;

        if execution_error.is_none() {
            info!(
                id = %transfer.id,
                transaction_ref = transfer.provider_transaction_ref.as_deref(),
                "Transfer completed"
            );
        }
        Ok(execution_error)
    }

    async fn call_banking_provider(
        &self,
        transfer: &TransferRequest,
        idempotency_key: Option<String>,
    ) -> Result<TransferReceipt, AppError> {
        let provider = self
            .registry
            .banking_for(&transfer.tenant_id, &transfer.banking_provider)?;
        let request = ExecuteTransferRequest {
            transfer_id: transfer.id.clone(),
            tenant_id: transfer.tenant_id.clone(),
            amount: transfer.amount,
            recipient_account_ref: transfer.recipient_account_ref.clone(),
            transfer_type: transfer.transfer_type,
            description: transfer.description.clone(),
            idempotency_key,
        };
        match tokio::time::timeout(self.execution_timeout, provider.execute_transfer(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Provider(ProviderError::Timeout(format!(
                "execute_transfer exceeded {}ms budget",
                self.execution_timeout.as_millis()
            )))),
        }
    }
}

fn normalize_amount(amount: Decimal) -> Result<Decimal, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(ValidationError::InvalidField {
            field: "amount".to_string(),
            message: "Amount must be positive".to_string(),
        }));
    }
    if amount.scale() > 2 {
        return Err(AppError::Validation(ValidationError::InvalidField {
            field: "amount".to_string(),
            message: "Amount must have at most two decimal places".to_string(),
        }));
    }
    let mut amount = amount;
    amount.rescale(2);
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorRole, RegisterServiceRequest, ServiceType, TransferType};
    use crate::test_utils::mocks::{MockDatabaseClient, MockProviderFactory};
    use rust_decimal_macros::dec;

    struct Harness {
        db: Arc<MockDatabaseClient>,
        registry: Arc<ServiceRegistry>,
        workflow: AchApprovalWorkflow,
    }

    async fn harness() -> Harness {
        let db = Arc::new(MockDatabaseClient::new());
        let audit = Arc::new(AuditTrail::new(db.clone()));
        let registry = Arc::new(ServiceRegistry::new(
            db.clone(),
            Arc::new(MockProviderFactory::new()),
            audit.clone(),
        ));
        let workflow = AchApprovalWorkflow::new(db.clone(), registry.clone(), audit);
        let h = Harness {
            db,
            registry,
            workflow,
        };
        register_banking(&h, "treasury", serde_json::json!({})).await;
        h
    }

    async fn register_banking(harness: &Harness, provider: &str, configuration: serde_json::Value) {
        harness
            .registry
            .register(
                &RegisterServiceRequest {
                    tenant_id: "tenant-1".to_string(),
                    service_type: ServiceType::Banking,
                    provider: provider.to_string(),
                    configuration,
                    is_active: true,
                },
                &ActorContext::new("admin-1", ActorRole::Admin),
            )
            .await
            .unwrap();
    }

    fn clerk() -> ActorContext {
        ActorContext::new("clerk-1", ActorRole::Clerk)
    }

    fn manager(id: &str) -> ActorContext {
        ActorContext::new(id, ActorRole::Manager)
    }

    fn create_request(amount: Decimal) -> CreateTransferRequest {
        CreateTransferRequest {
            tenant_id: "tenant-1".to_string(),
            amount,
            recipient_account_ref: "acct_9f8e7d6c".to_string(),
            transfer_type: TransferType::AchCredit,
            description: Some("Road resurfacing invoice".to_string()),
            banking_provider: None,
        }
    }

    async fn create(harness: &Harness, amount: Decimal) -> TransferRequest {
        harness
            .workflow
            .create_transfer(&create_request(amount), &clerk())
            .await
            .unwrap()
    }

    async fn transfer_audit_actions(harness: &Harness, id: &str) -> Vec<String> {
        harness
            .workflow
            .audit_trail(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    #[tokio::test]
    async fn test_create_at_threshold_auto_approves() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(10000.00)).await;

        assert_eq!(transfer.status, TransferStatus::Approved);
        assert_eq!(transfer.required_approval_level, 1);
        assert_eq!(transfer.banking_provider, "treasury");
        assert_eq!(transfer.initiated_by, "clerk-1");
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created"]
        );
    }

    #[tokio::test]
    async fn test_create_above_threshold_needs_one_approval() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(10000.01)).await;
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.required_approval_level, 1);
    }

    #[tokio::test]
    async fn test_create_at_dual_threshold_needs_one_approval() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(50000.00)).await;
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.required_approval_level, 1);
    }

    #[tokio::test]
    async fn test_create_above_dual_threshold_needs_two_approvals() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(50000.01)).await;
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.required_approval_level, 2);
    }

    #[tokio::test]
    async fn test_create_normalizes_amount_scale() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(150)).await;
        assert_eq!(transfer.amount, dec!(150.00));
        assert_eq!(transfer.amount.scale(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_amounts() {
        let harness = harness().await;
        for amount in [dec!(0), dec!(-5.00), dec!(10.123)] {
            let result = harness
                .workflow
                .create_transfer(&create_request(amount), &clerk())
                .await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "amount {} should be rejected",
                amount
            );
        }
        assert_eq!(harness.db.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_create_denied_for_auditor() {
        let harness = harness().await;
        let result = harness
            .workflow
            .create_transfer(
                &create_request(dec!(100.00)),
                &ActorContext::new("auditor-1", ActorRole::Auditor),
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_create_with_unknown_banking_provider_rejected() {
        let harness = harness().await;
        let mut request = create_request(dec!(100.00));
        request.banking_provider = Some("unregistered".to_string());
        let result = harness.workflow.create_transfer(&request, &clerk()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_single_approval_executes_and_completes() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;

        let approved = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest {
                    comments: Some("Invoice checks out".to_string()),
                },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(approved.status, TransferStatus::Completed);
        assert_eq!(approved.approvals.len(), 1);
        assert_eq!(approved.approvals[0].level, 1);
        assert_eq!(approved.approvals[0].decision, ApprovalDecision::Approved);
        assert_eq!(
            approved.provider_transaction_ref.as_deref(),
            Some(format!("txn_{}", transfer.id).as_str())
        );
        assert!(approved.terminal_at.is_some());
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created", "ach_transfer_approved"]
        );
    }

    #[tokio::test]
    async fn test_dual_approval_flow_writes_three_audit_entries() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(75000.00)).await;
        assert_eq!(transfer.required_approval_level, 2);

        let first = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();
        assert_eq!(first.status, TransferStatus::Processing);
        assert_eq!(first.approvals.len(), 1);
        assert!(first.provider_transaction_ref.is_none());

        let second = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-2"),
            )
            .await
            .unwrap();
        assert_eq!(second.status, TransferStatus::Completed);
        assert_eq!(second.approvals.len(), 2);
        assert_eq!(second.approvals[0].level, 1);
        assert_eq!(second.approvals[1].level, 2);
        assert!(second.provider_transaction_ref.is_some());

        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec![
                "ach_transfer_created",
                "ach_transfer_approved",
                "ach_transfer_approved",
            ]
        );
    }

    #[tokio::test]
    async fn test_same_approver_cannot_satisfy_both_levels() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(75000.00)).await;
        let approver = manager("manager-1");
        let body = ApproveTransferRequest { comments: None };

        harness
            .workflow
            .approve(&transfer.id, &body, &approver)
            .await
            .unwrap();
        let second = harness.workflow.approve(&transfer.id, &body, &approver).await;
        assert!(matches!(second, Err(AppError::InvalidState(_))));

        let stored = harness
            .workflow
            .get_transfer(&transfer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransferStatus::Processing);
        assert_eq!(stored.approvals.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_auto_approved_transfer_is_invalid() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(500.00)).await;
        let result = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_approve_terminal_transfer_is_invalid() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;
        harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        let again = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-2"),
            )
            .await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_clerk_cannot_approve() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;
        let result = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &clerk(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_approve_missing_transfer_is_not_found() {
        let harness = harness().await;
        let result = harness
            .workflow
            .approve(
                "no-such-id",
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_execution_failure_marks_failed_and_keeps_trail() {
        let harness = harness().await;
        register_banking(
            &harness,
            "failbank",
            serde_json::json!({"fail_transfers": true}),
        )
        .await;
        let mut request = create_request(dec!(20000.00));
        request.banking_provider = Some("failbank".to_string());
        let transfer = harness
            .workflow
            .create_transfer(&request, &clerk())
            .await
            .unwrap();

        let approved = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(approved.status, TransferStatus::Failed);
        assert_eq!(approved.approvals.len(), 1);
        assert!(approved.provider_transaction_ref.is_none());
        assert!(approved.terminal_at.is_some());
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created", "ach_transfer_approved"]
        );
    }

    #[tokio::test]
    async fn test_failed_transfer_retries_with_idempotency_key() {
        let harness = harness().await;
        register_banking(
            &harness,
            "failbank",
            serde_json::json!({"fail_transfers": true}),
        )
        .await;
        let mut request = create_request(dec!(20000.00));
        request.banking_provider = Some("failbank".to_string());
        let transfer = harness
            .workflow
            .create_transfer(&request, &clerk())
            .await
            .unwrap();
        harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        // Retry without a key is rejected outright
        let missing_key = harness
            .workflow
            .execute(
                &transfer.id,
                &ExecuteTransferApiRequest {
                    idempotency_key: None,
                },
                &manager("manager-1"),
            )
            .await;
        assert!(matches!(
            missing_key,
            Err(AppError::Validation(ValidationError::MissingField(_)))
        ));

        // Re-registering the provider swaps in a working adapter
        register_banking(&harness, "failbank", serde_json::json!({})).await;
        let executed = harness
            .workflow
            .execute(
                &transfer.id,
                &ExecuteTransferApiRequest {
                    idempotency_key: Some("retry-1".to_string()),
                },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(executed.status, TransferStatus::Completed);
        assert!(executed.provider_transaction_ref.is_some());
        // Approval trail from the failed run is still there
        assert_eq!(executed.approvals.len(), 1);

        let entries = harness.workflow.audit_trail(&transfer.id).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "ach_transfer_created",
                "ach_transfer_approved",
                "ach_transfer_executed",
            ]
        );
        assert_eq!(
            entries[2].metadata.get("idempotency_key"),
            Some(&serde_json::json!("retry-1"))
        );
    }

    #[tokio::test]
    async fn test_execute_auto_approved_transfer() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(500.00)).await;
        assert_eq!(transfer.status, TransferStatus::Approved);

        let executed = harness
            .workflow
            .execute(
                &transfer.id,
                &ExecuteTransferApiRequest::default(),
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(executed.status, TransferStatus::Completed);
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created", "ach_transfer_executed"]
        );
    }

    #[tokio::test]
    async fn test_execute_pending_transfer_is_invalid() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;
        let result = harness
            .workflow
            .execute(
                &transfer.id,
                &ExecuteTransferApiRequest::default(),
                &manager("manager-1"),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_timeout_marks_failed() {
        let db = Arc::new(MockDatabaseClient::new());
        let audit = Arc::new(AuditTrail::new(db.clone()));
        let registry = Arc::new(ServiceRegistry::new(
            db.clone(),
            Arc::new(MockProviderFactory::new()),
            audit.clone(),
        ));
        let workflow = AchApprovalWorkflow::new(db.clone(), registry.clone(), audit)
            .with_execution_timeout(Duration::from_millis(50));
        let harness = Harness {
            db,
            registry,
            workflow,
        };
        register_banking(
            &harness,
            "slowbank",
            serde_json::json!({"execution_delay_ms": 5000}),
        )
        .await;

        let transfer = create(&harness, dec!(20000.00)).await;
        let approved = harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(approved.status, TransferStatus::Failed);
        let entries = harness.workflow.audit_trail(&transfer.id).await.unwrap();
        let error = entries[1].metadata.get("error").and_then(|v| v.as_str());
        assert!(error.is_some_and(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_reject_pending_transfer_cancels() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;

        let rejected = harness
            .workflow
            .reject(
                &transfer.id,
                &RejectTransferRequest {
                    reason: "Vendor failed verification".to_string(),
                },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        assert_eq!(rejected.status, TransferStatus::Cancelled);
        assert_eq!(rejected.approvals.len(), 1);
        assert_eq!(rejected.approvals[0].decision, ApprovalDecision::Rejected);
        assert_eq!(
            rejected.approvals[0].comments.as_deref(),
            Some("Vendor failed verification")
        );
        assert!(rejected.terminal_at.is_some());
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created", "ach_transfer_rejected"]
        );
    }

    #[tokio::test]
    async fn test_reject_at_level_two_cancels() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(75000.00)).await;
        harness
            .workflow
            .approve(
                &transfer.id,
                &ApproveTransferRequest { comments: None },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        let rejected = harness
            .workflow
            .reject(
                &transfer.id,
                &RejectTransferRequest {
                    reason: "Amount does not match contract".to_string(),
                },
                &manager("manager-2"),
            )
            .await
            .unwrap();

        assert_eq!(rejected.status, TransferStatus::Cancelled);
        assert_eq!(rejected.approvals.len(), 2);
        assert_eq!(rejected.approvals[1].level, 2);
        assert_eq!(rejected.approvals[1].decision, ApprovalDecision::Rejected);
    }

    #[tokio::test]
    async fn test_reject_auto_approved_is_invalid() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(500.00)).await;
        let result = harness
            .workflow
            .reject(
                &transfer.id,
                &RejectTransferRequest {
                    reason: "Too late".to_string(),
                },
                &manager("manager-1"),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_reject_terminal_is_invalid() {
        let harness = harness().await;
        let transfer = create(&harness, dec!(20000.00)).await;
        harness
            .workflow
            .reject(
                &transfer.id,
                &RejectTransferRequest {
                    reason: "First rejection".to_string(),
                },
                &manager("manager-1"),
            )
            .await
            .unwrap();

        let again = harness
            .workflow
            .reject(
                &transfer.id,
                &RejectTransferRequest {
                    reason: "Second rejection".to_string(),
                },
                &manager("manager-2"),
            )
            .await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_final_approvals_one_wins() {
        let harness = Arc::new(harness().await);
        let transfer = create(&harness, dec!(20000.00)).await;

        let h1 = harness.clone();
        let h2 = harness.clone();
        let id1 = transfer.id.clone();
        let id2 = transfer.id.clone();
        let (first, second) = tokio::join!(
            async move {
                h1.workflow
                    .approve(
                        &id1,
                        &ApproveTransferRequest { comments: None },
                        &manager("manager-1"),
                    )
                    .await
            },
            async move {
                h2.workflow
                    .approve(
                        &id2,
                        &ApproveTransferRequest { comments: None },
                        &manager("manager-2"),
                    )
                    .await
            },
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one approval may win");
        for result in [&first, &second] {
            if let Err(e) = result {
                assert!(matches!(e, AppError::InvalidState(_)));
            }
        }

        let stored = harness
            .workflow
            .get_transfer(&transfer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert_eq!(stored.approvals.len(), 1);
        assert_eq!(
            transfer_audit_actions(&harness, &transfer.id).await,
            vec!["ach_transfer_created", "ach_transfer_approved"]
        );
    }

    #[tokio::test]
    async fn test_list_transfers_paginates_newest_first() {
        let harness = harness().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(create(&harness, dec!(100.00)).await.id);
        }

        let first_page = harness
            .workflow
            .list_transfers(&TransferListParams {
                tenant_id: "tenant-1".to_string(),
                limit: 2,
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(first_page.items.len(), 2);
        assert!(first_page.has_more);
        assert_eq!(first_page.items[0].id, ids[2]);

        let second_page = harness
            .workflow
            .list_transfers(&TransferListParams {
                tenant_id: "tenant-1".to_string(),
                limit: 2,
                cursor: first_page.next_cursor.clone(),
            })
            .await
            .unwrap();
        assert_eq!(second_page.items.len(), 1);
        assert!(!second_page.has_more);
        assert_eq!(second_page.items[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_audit_trail_missing_transfer_is_not_found() {
        let harness = harness().await;
        let result = harness.workflow.audit_trail("no-such-id").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
