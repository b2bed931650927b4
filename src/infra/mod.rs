//! Infrastructure layer implementations.

pub mod database;
pub mod providers;

pub use database::{PostgresClient, PostgresConfig};
pub use providers::ProviderCatalog;
