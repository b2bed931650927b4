//! Name-keyed provider catalog.
//!
//! The catalog is the single place that knows which provider names exist for
//! each service type and which adapter implements them. `sandbox*` and
//! `rest*` prefixes are available under every service type so tenants can
//! bring generic integrations without a catalog change.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    AppError, CapabilityHandle, ProviderFactory, ServiceRegistration, ServiceType, ValidationError,
};
use crate::infra::providers::rest::{
    RestBankingProvider, RestBaseAdapter, RestPaymentProvider, RestScreeningProvider,
};
use crate::infra::providers::sandbox::{
    SandboxBankingProvider, SandboxBaseAdapter, SandboxPaymentProvider, SandboxScreeningProvider,
};

/// Builds concrete adapters for every supported provider name
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderCatalog;

impl ProviderCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Supported provider names for one service type, for error messages
    fn supported(service_type: ServiceType) -> &'static [&'static str] {
        match service_type {
            ServiceType::Payment => &["stripe", "paypal", "sandbox*", "rest*"],
            ServiceType::Banking => &["treasury", "chase", "sandbox*", "rest*"],
            ServiceType::Compliance => &["ofac", "lexis", "sandbox*", "rest*"],
            ServiceType::Audit => &["sandbox*", "rest*"],
            ServiceType::Specialized => &["plaid", "sandbox*", "rest*"],
        }
    }

    fn unknown(registration: &ServiceRegistration) -> AppError {
        AppError::Validation(ValidationError::InvalidField {
            field: "provider".to_string(),
            message: format!(
                "Unknown {} provider '{}'; supported: {}",
                registration.service_type,
                registration.provider,
                Self::supported(registration.service_type).join(", ")
            ),
        })
    }
}

impl ProviderFactory for ProviderCatalog {
    fn build(&self, registration: &ServiceRegistration) -> Result<CapabilityHandle, AppError> {
        let name = registration.provider.as_str();
        let configuration = &registration.configuration;
        debug!(
            tenant_id = %registration.tenant_id,
            service_type = %registration.service_type,
            provider = %name,
            "Building provider adapter"
        );

        let handle = match registration.service_type {
            ServiceType::Payment => match name {
                n if n.starts_with("sandbox") => CapabilityHandle::Payment(Arc::new(
                    SandboxPaymentProvider::from_config(name, configuration)?,
                )),
                "stripe" | "paypal" => CapabilityHandle::Payment(Arc::new(
                    RestPaymentProvider::from_config(name, configuration)?,
                )),
                n if n.starts_with("rest") => CapabilityHandle::Payment(Arc::new(
                    RestPaymentProvider::from_config(name, configuration)?,
                )),
                _ => return Err(Self::unknown(registration)),
            },
            ServiceType::Banking => match name {
                n if n.starts_with("sandbox") => CapabilityHandle::Banking(Arc::new(
                    SandboxBankingProvider::from_config(name, configuration)?,
                )),
                "treasury" | "chase" => CapabilityHandle::Banking(Arc::new(
                    RestBankingProvider::from_config(name, configuration)?,
                )),
                n if n.starts_with("rest") => CapabilityHandle::Banking(Arc::new(
                    RestBankingProvider::from_config(name, configuration)?,
                )),
                _ => return Err(Self::unknown(registration)),
            },
            ServiceType::Compliance => match name {
                n if n.starts_with("sandbox") => CapabilityHandle::Compliance(Arc::new(
                    SandboxScreeningProvider::from_config(name, configuration)?,
                )),
                "ofac" | "lexis" => CapabilityHandle::Compliance(Arc::new(
                    RestScreeningProvider::from_config(name, configuration)?,
                )),
                n if n.starts_with("rest") => CapabilityHandle::Compliance(Arc::new(
                    RestScreeningProvider::from_config(name, configuration)?,
                )),
                _ => return Err(Self::unknown(registration)),
            },
            ServiceType::Audit => match name {
                n if n.starts_with("sandbox") => CapabilityHandle::Audit(Arc::new(
                    SandboxBaseAdapter::from_config(name, configuration)?,
                )),
                n if n.starts_with("rest") => CapabilityHandle::Audit(Arc::new(
                    RestBaseAdapter::from_config(name, configuration)?,
                )),
                _ => return Err(Self::unknown(registration)),
            },
            ServiceType::Specialized => match name {
                n if n.starts_with("sandbox") => CapabilityHandle::Specialized(Arc::new(
                    SandboxBaseAdapter::from_config(name, configuration)?,
                )),
                "plaid" => CapabilityHandle::Specialized(Arc::new(RestBaseAdapter::from_config(
                    name,
                    configuration,
                )?)),
                n if n.starts_with("rest") => CapabilityHandle::Specialized(Arc::new(
                    RestBaseAdapter::from_config(name, configuration)?,
                )),
                _ => return Err(Self::unknown(registration)),
            },
        };
        Ok(handle)
    }
}
