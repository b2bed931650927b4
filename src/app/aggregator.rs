//! Fan-out compliance screening across a tenant's registered providers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::audit::{AuditTrail, actions, entities};
use crate::app::registry::ServiceRegistry;
use crate::domain::{
    ActorContext, AppError, ComplianceScreeningRecord, DatabaseClient, ProviderScreeningResult,
    ScreenEntityRequest, ScreeningDecision, ScreeningOutcome, ScreeningRequest,
};

/// Default budget for a single provider's `screen_entity` call
pub const DEFAULT_SCREENING_TIMEOUT: Duration = Duration::from_secs(10);

/// Aggregate score above which a screening cannot be auto-approved
const MAX_APPROVED_RISK_SCORE: f64 = 7.0;

/// Aggregate score above which a human reviewer is required
const REVIEW_RISK_SCORE: f64 = 5.0;

/// Screens entities against every active compliance provider of a tenant.
///
/// Provider calls run concurrently, each under its own timeout. A failing or
/// slow provider contributes a synthetic error result instead of sinking the
/// whole screening. Dropping the returned future aborts outstanding calls.
pub struct ComplianceAggregator {
    registry: Arc<ServiceRegistry>,
    db: Arc<dyn DatabaseClient>,
    audit: Arc<AuditTrail>,
    screening_timeout: Duration,
}

impl ComplianceAggregator {
    #[must_use]
    pub fn new(
        registry: Arc<ServiceRegistry>,
        db: Arc<dyn DatabaseClient>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            registry,
            db,
            audit,
            screening_timeout: DEFAULT_SCREENING_TIMEOUT,
        }
    }

    /// Override the per-provider screening budget.
    #[must_use]
    pub fn with_screening_timeout(mut self, timeout: Duration) -> Self {
        self.screening_timeout = timeout;
        self
    }

    /// Screen one entity, persist the record and return the aggregate outcome.
    ///
    /// A tenant with no compliance providers gets `pending_review` with empty
    /// results; screening is never silently skipped.
    #[instrument(
        skip(self, request, actor),
        fields(tenant_id = %request.tenant_id, entity_id = %request.entity_id)
    )]
    pub async fn screen(
        &self,
        request: &ScreenEntityRequest,
        actor: &ActorContext,
    ) -> Result<ScreeningOutcome, AppError> {
        if !actor.role.can_initiate_transfers() {
            return Err(AppError::Authorization(format!(
                "Role '{}' cannot request screenings",
                actor.role
            )));
        }
        request.validate()?;

        let providers = self.registry.compliance_providers(&request.tenant_id);
        if providers.is_empty() {
            warn!("No compliance providers registered, forcing manual review");
        }

        let screening_request = ScreeningRequest {
            tenant_id: request.tenant_id.clone(),
            entity_type: request.entity_type.clone(),
            entity_id: request.entity_id.clone(),
            payload: request.payload.clone(),
        };

        // JoinSet aborts remaining tasks on drop, so cancelling the screening
        // cancels its outstanding provider calls too
        let mut tasks = JoinSet::new();
        for (name, provider) in providers {
            let call = screening_request.clone();
            let timeout = self.screening_timeout;
            tasks.spawn(async move {
                match tokio::time::timeout(timeout, provider.screen_entity(&call)).await {
                    Ok(Ok(verdict)) => {
                        let risk_score = verdict.risk_score.map(|score| {
                            if (0.0..=10.0).contains(&score) {
                                score
                            } else {
                                warn!(provider = %name, score, "Risk score out of range, clamping");
                                score.clamp(0.0, 10.0)
                            }
                        });
                        ProviderScreeningResult {
                            provider: name,
                            risk_score,
                            approved: verdict.approved,
                            flags: verdict.flags,
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(provider = %name, error = %e, "Screening provider failed");
                        synthetic_error_result(name)
                    }
                    Err(_) => {
                        warn!(provider = %name, "Screening provider timed out");
                        synthetic_error_result(name)
                    }
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "Screening task failed"),
            }
        }
        results.sort_by(|a, b| a.provider.cmp(&b.provider));

        let (aggregate_risk_score, approved, requires_review, decision) = evaluate(&results);

        let record = ComplianceScreeningRecord {
            id: Uuid::now_v7().to_string(),
            tenant_id: request.tenant_id.clone(),
            entity_type: request.entity_type.clone(),
            entity_id: request.entity_id.clone(),
            provider_results: results.clone(),
            aggregate_risk_score,
            decision,
            created_at: Utc::now(),
        };
        self.db.insert_screening(&record).await?;

        self.audit
            .record(
                &request.tenant_id,
                actor,
                actions::ENTITY_SCREENED,
                entities::COMPLIANCE_SCREENING,
                &record.id,
                serde_json::json!({
                    "entity_type": request.entity_type,
                    "entity_id": request.entity_id,
                    "decision": decision,
                    "aggregate_risk_score": aggregate_risk_score,
                }),
            )
            .await?;

        info!(
            record_id = %record.id,
            decision = %decision.as_str(),
            "Entity screening complete"
        );

        Ok(ScreeningOutcome {
            record_id: record.id,
            approved,
            aggregate_risk_score,
            requires_review,
            decision,
            results,
        })
    }

    /// Fetch a persisted screening record.
    #[instrument(skip(self))]
    pub async fn screening(
        &self,
        id: &str,
    ) -> Result<Option<ComplianceScreeningRecord>, AppError> {
        self.db.get_screening(id).await
    }
}

fn synthetic_error_result(provider: String) -> ProviderScreeningResult {
    let flag = format!("provider_error:{}", provider);
    ProviderScreeningResult {
        provider,
        risk_score: None,
        approved: false,
        flags: vec![flag],
    }
}

/// Decision policy over the collected provider results.
///
/// The aggregate is the mean of the non-null scores; error entries stay in the
/// results but never enter the mean. An undefined aggregate (every provider
/// errored, or none exist) always routes to manual review.
fn evaluate(
    results: &[ProviderScreeningResult],
) -> (Option<f64>, bool, bool, ScreeningDecision) {
    let scores: Vec<f64> = results.iter().filter_map(|r| r.risk_score).collect();
    let aggregate = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let approved = match aggregate {
        Some(score) => {
            score <= MAX_APPROVED_RISK_SCORE && results.iter().all(|r| r.approved)
        }
        None => false,
    };
    let requires_review = match aggregate {
        Some(score) => score > REVIEW_RISK_SCORE,
        None => true,
    };
    let decision = if requires_review {
        ScreeningDecision::PendingReview
    } else if approved {
        ScreeningDecision::Compliant
    } else {
        ScreeningDecision::NonCompliant
    };

    (aggregate, approved, requires_review, decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorRole, RegisterServiceRequest, ServiceType};
    use crate::test_utils::mocks::{MockDatabaseClient, MockProviderFactory};

    fn result(provider: &str, risk_score: Option<f64>, approved: bool) -> ProviderScreeningResult {
        ProviderScreeningResult {
            provider: provider.to_string(),
            risk_score,
            approved,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_evaluate_low_risk_all_approved_is_compliant() {
        let results = [result("a", Some(2.0), true), result("b", Some(4.0), true)];
        let (aggregate, approved, requires_review, decision) = evaluate(&results);
        assert_eq!(aggregate, Some(3.0));
        assert!(approved);
        assert!(!requires_review);
        assert_eq!(decision, ScreeningDecision::Compliant);
    }

    #[test]
    fn test_evaluate_mean_above_review_threshold_is_pending() {
        let results = [result("a", Some(4.0), true), result("b", Some(8.0), true)];
        let (aggregate, approved, requires_review, decision) = evaluate(&results);
        assert_eq!(aggregate, Some(6.0));
        // 6.0 is approvable but still above the review line
        assert!(approved);
        assert!(requires_review);
        assert_eq!(decision, ScreeningDecision::PendingReview);
    }

    #[test]
    fn test_evaluate_rejection_with_low_score_is_non_compliant() {
        let results = [result("a", Some(2.0), true), result("b", Some(3.0), false)];
        let (aggregate, approved, requires_review, decision) = evaluate(&results);
        assert_eq!(aggregate, Some(2.5));
        assert!(!approved);
        assert!(!requires_review);
        assert_eq!(decision, ScreeningDecision::NonCompliant);
    }

    #[test]
    fn test_evaluate_error_entries_excluded_from_mean() {
        let results = [result("a", Some(4.0), true), result("b", None, false)];
        let (aggregate, approved, _, _) = evaluate(&results);
        assert_eq!(aggregate, Some(4.0));
        // The errored provider still vetoes approval
        assert!(!approved);
    }

    #[test]
    fn test_evaluate_all_errors_forces_review() {
        let results = [result("a", None, false), result("b", None, false)];
        let (aggregate, approved, requires_review, decision) = evaluate(&results);
        assert_eq!(aggregate, None);
        assert!(!approved);
        assert!(requires_review);
        assert_eq!(decision, ScreeningDecision::PendingReview);
    }

    #[test]
    fn test_evaluate_no_providers_forces_review() {
        let (aggregate, approved, requires_review, decision) = evaluate(&[]);
        assert_eq!(aggregate, None);
        assert!(!approved);
        assert!(requires_review);
        assert_eq!(decision, ScreeningDecision::PendingReview);
    }

    #[test]
    fn test_evaluate_exact_thresholds() {
        // 7.0 is approvable, anything above is not
        let at_approval = [result("a", Some(7.0), true)];
        let (_, approved, requires_review, _) = evaluate(&at_approval);
        assert!(approved);
        assert!(requires_review);

        let above_approval = [result("a", Some(7.1), true)];
        let (_, approved, _, _) = evaluate(&above_approval);
        assert!(!approved);

        // 5.0 needs no review, 5.1 does
        let at_review = [result("a", Some(5.0), true)];
        let (_, _, requires_review, decision) = evaluate(&at_review);
        assert!(!requires_review);
        assert_eq!(decision, ScreeningDecision::Compliant);
    }

    // Async plumbing tests go through a registered mock provider set

    struct Harness {
        db: Arc<MockDatabaseClient>,
        registry: Arc<ServiceRegistry>,
        aggregator: ComplianceAggregator,
    }

    fn harness() -> Harness {
        let db = Arc::new(MockDatabaseClient::new());
        let audit = Arc::new(AuditTrail::new(db.clone()));
        let registry = Arc::new(ServiceRegistry::new(
            db.clone(),
            Arc::new(MockProviderFactory::new()),
            audit.clone(),
        ));
        let aggregator = ComplianceAggregator::new(registry.clone(), db.clone(), audit);
        Harness {
            db,
            registry,
            aggregator,
        }
    }

    async fn register_compliance(
        harness: &Harness,
        provider: &str,
        configuration: serde_json::Value,
    ) {
        harness
            .registry
            .register(
                &RegisterServiceRequest {
                    tenant_id: "tenant-1".to_string(),
                    service_type: ServiceType::Compliance,
                    provider: provider.to_string(),
                    configuration,
                    is_active: true,
                },
                &ActorContext::new("admin-1", ActorRole::Admin),
            )
            .await
            .unwrap();
    }

    fn screen_request() -> ScreenEntityRequest {
        ScreenEntityRequest {
            tenant_id: "tenant-1".to_string(),
            entity_type: "vendor".to_string(),
            entity_id: "vendor-301".to_string(),
            payload: serde_json::json!({"name": "Acme Paving LLC"}),
        }
    }

    #[tokio::test]
    async fn test_screen_aggregates_and_persists() {
        let harness = harness();
        register_compliance(&harness, "ofac", serde_json::json!({"risk_score": 2.0})).await;
        register_compliance(&harness, "lexis", serde_json::json!({"risk_score": 4.0})).await;

        let actor = ActorContext::new("clerk-1", ActorRole::Clerk);
        let outcome = harness
            .aggregator
            .screen(&screen_request(), &actor)
            .await
            .unwrap();

        assert_eq!(outcome.aggregate_risk_score, Some(3.0));
        assert!(outcome.approved);
        assert_eq!(outcome.decision, ScreeningDecision::Compliant);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].provider, "lexis");
        assert_eq!(outcome.results[1].provider, "ofac");

        assert_eq!(harness.db.screening_count(), 1);
        let record = harness
            .aggregator
            .screening(&outcome.record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.decision, ScreeningDecision::Compliant);
        // Two registrations plus the screening itself
        assert_eq!(harness.db.audit_entry_count(), 3);
    }

    #[tokio::test]
    async fn test_screen_failing_provider_yields_synthetic_result() {
        let harness = harness();
        register_compliance(&harness, "ofac", serde_json::json!({"risk_score": 2.0})).await;
        register_compliance(&harness, "flaky", serde_json::json!({"fail_screening": true})).await;

        let actor = ActorContext::new("clerk-1", ActorRole::Clerk);
        let outcome = harness
            .aggregator
            .screen(&screen_request(), &actor)
            .await
            .unwrap();

        let flaky = outcome
            .results
            .iter()
            .find(|r| r.provider == "flaky")
            .unwrap();
        assert_eq!(flaky.risk_score, None);
        assert!(!flaky.approved);
        assert_eq!(flaky.flags, vec!["provider_error:flaky".to_string()]);

        // Error excluded from the mean, but it vetoes approval
        assert_eq!(outcome.aggregate_risk_score, Some(2.0));
        assert!(!outcome.approved);
        assert_eq!(outcome.decision, ScreeningDecision::NonCompliant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_screen_timeout_yields_synthetic_result() {
        let harness = harness();
        let aggregator = ComplianceAggregator::new(
            harness.registry.clone(),
            harness.db.clone(),
            Arc::new(AuditTrail::new(harness.db.clone())),
        )
        .with_screening_timeout(Duration::from_millis(50));
        register_compliance(
            &harness,
            "slow",
            serde_json::json!({"screen_delay_ms": 500, "risk_score": 1.0}),
        )
        .await;

        let actor = ActorContext::new("clerk-1", ActorRole::Clerk);
        let outcome = aggregator.screen(&screen_request(), &actor).await.unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].risk_score, None);
        assert_eq!(outcome.aggregate_risk_score, None);
        assert_eq!(outcome.decision, ScreeningDecision::PendingReview);
    }

    #[tokio::test]
    async fn test_screen_without_providers_forces_review() {
        let harness = harness();
        let actor = ActorContext::new("clerk-1", ActorRole::Clerk);

        let outcome = harness
            .aggregator
            .screen(&screen_request(), &actor)
            .await
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.aggregate_risk_score, None);
        assert!(!outcome.approved);
        assert!(outcome.requires_review);
        assert_eq!(outcome.decision, ScreeningDecision::PendingReview);
        assert_eq!(harness.db.screening_count(), 1);
    }

    #[tokio::test]
    async fn test_screen_rejects_blank_entity() {
        let harness = harness();
        let actor = ActorContext::new("clerk-1", ActorRole::Clerk);
        let mut request = screen_request();
        request.entity_id = String::new();

        let result = harness.aggregator.screen(&request, &actor).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(harness.db.screening_count(), 0);
    }

    #[tokio::test]
    async fn test_screen_denied_for_auditor() {
        let harness = harness();
        let actor = ActorContext::new("auditor-1", ActorRole::Auditor);

        let result = harness.aggregator.screen(&screen_request(), &actor).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
        assert_eq!(harness.db.screening_count(), 0);
    }
}
