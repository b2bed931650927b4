//! Provider adapter implementations and the catalog that builds them.

pub mod factory;
pub mod rest;
pub mod sandbox;

pub use factory::ProviderCatalog;
pub use rest::{
    RestBankingProvider, RestBaseAdapter, RestPaymentProvider, RestScreeningProvider,
};
pub use sandbox::{
    SandboxBankingProvider, SandboxBaseAdapter, SandboxPaymentProvider, SandboxScreeningProvider,
};
