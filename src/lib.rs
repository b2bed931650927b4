//! Multi-tenant financial provider gateway with tiered ACH approval workflows.
//!
//! The crate is layered hexagonally:
//!
//! - [`domain`]: core types, provider capability traits and the error model.
//!   No I/O, no framework types.
//! - [`app`]: use cases wired against the domain traits: the service
//!   registry, compliance aggregation, the ACH approval workflow and the
//!   audit trail.
//! - [`infra`]: adapters that implement the domain traits against the
//!   outside world: PostgreSQL persistence and the provider integrations.
//! - [`api`]: the axum HTTP surface, OpenAPI documentation and routing.
//!
//! Everything above `infra` depends only on trait objects, so the full
//! stack runs against in-memory doubles in tests.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
