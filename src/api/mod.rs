//! The API layer, containing web handlers and routing.

pub mod handlers;
pub mod registrations;
pub mod router;

pub use handlers::ApiDoc;
pub use registrations::{
    list_registrations_handler, register_service_handler, registry_health_handler,
};
pub use router::{RateLimitConfig, create_router, create_router_with_rate_limit};
