//! Application layer containing business logic and shared state.

pub mod aggregator;
pub mod audit;
pub mod registry;
pub mod state;
pub mod workflow;

pub use aggregator::ComplianceAggregator;
pub use audit::AuditTrail;
pub use registry::ServiceRegistry;
pub use state::{AppState, CallTimeouts};
pub use workflow::AchApprovalWorkflow;
