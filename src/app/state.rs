//! Application state management.

use std::sync::Arc;
use std::time::Duration;

use crate::app::aggregator::{ComplianceAggregator, DEFAULT_SCREENING_TIMEOUT};
use crate::app::audit::AuditTrail;
use crate::app::registry::{DEFAULT_PING_TIMEOUT, ServiceRegistry};
use crate::app::workflow::{AchApprovalWorkflow, DEFAULT_EXECUTION_TIMEOUT};
use crate::domain::{DatabaseClient, ProviderFactory};

/// Per-call budgets for outbound provider work
#[derive(Debug, Clone, Copy)]
pub struct CallTimeouts {
    pub ping: Duration,
    pub screening: Duration,
    pub execution: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            ping: DEFAULT_PING_TIMEOUT,
            screening: DEFAULT_SCREENING_TIMEOUT,
            execution: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_client: Arc<dyn DatabaseClient>,
    pub registry: Arc<ServiceRegistry>,
    pub aggregator: Arc<ComplianceAggregator>,
    pub workflow: Arc<AchApprovalWorkflow>,
    pub audit: Arc<AuditTrail>,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub fn new(db_client: Arc<dyn DatabaseClient>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self::with_timeouts(db_client, factory, CallTimeouts::default())
    }

    /// Create a new application state with explicit provider call budgets
    #[must_use]
    pub fn with_timeouts(
        db_client: Arc<dyn DatabaseClient>,
        factory: Arc<dyn ProviderFactory>,
        timeouts: CallTimeouts,
    ) -> Self {
        let audit = Arc::new(AuditTrail::new(Arc::clone(&db_client)));
        let registry = Arc::new(
            ServiceRegistry::new(Arc::clone(&db_client), factory, Arc::clone(&audit))
                .with_ping_timeout(timeouts.ping),
        );
        let aggregator = Arc::new(
            ComplianceAggregator::new(
                Arc::clone(&registry),
                Arc::clone(&db_client),
                Arc::clone(&audit),
            )
            .with_screening_timeout(timeouts.screening),
        );
        let workflow = Arc::new(
            AchApprovalWorkflow::new(
                Arc::clone(&db_client),
                Arc::clone(&registry),
                Arc::clone(&audit),
            )
            .with_execution_timeout(timeouts.execution),
        );
        Self {
            db_client,
            registry,
            aggregator,
            workflow,
            audit,
        }
    }
}
