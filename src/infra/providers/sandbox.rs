//! Deterministic in-process providers for local mode and tests.
//!
//! Sandbox adapters execute entirely in memory with behavior driven by the
//! registration's configuration, so a tenant can rehearse the full approval
//! and screening flows without any upstream account.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    AccountVerification, AppError, BankingProvider, ExecuteTransferRequest, PaymentOrder,
    PaymentProvider, PaymentReceipt, ProviderAdapter, ProviderError, ScreeningProvider,
    ScreeningRequest, ScreeningVerdict, TransferReceipt, ValidationError,
};

/// Risk score reported when no flag substring matches
pub const DEFAULT_BASE_RISK_SCORE: f64 = 1.0;
/// Risk score reported when the flag substring matches
pub const DEFAULT_FLAGGED_RISK_SCORE: f64 = 9.0;

fn parse_config<T: Default + for<'de> Deserialize<'de>>(
    configuration: &serde_json::Value,
) -> Result<T, AppError> {
    if configuration.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(configuration.clone()).map_err(|e| {
        AppError::Validation(ValidationError::InvalidField {
            field: "configuration".to_string(),
            message: format!("Invalid sandbox configuration: {}", e),
        })
    })
}

fn sandbox_ref() -> String {
    format!("sbx_{}", Uuid::new_v4())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SandboxBankingConfig {
    /// Every execution fails with a provider error
    fail_transfers: bool,
    /// Recipient refs containing this substring are declined
    decline_contains: Option<String>,
}

/// In-memory banking provider
pub struct SandboxBankingProvider {
    name: String,
    config: SandboxBankingConfig,
}

impl SandboxBankingProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            name: name.to_string(),
            config: parse_config(configuration)?,
        })
    }

    fn declines(&self, account_ref: &str) -> bool {
        self.config
            .decline_contains
            .as_deref()
            .is_some_and(|needle| account_ref.contains(needle))
    }
}

#[async_trait]
impl ProviderAdapter for SandboxBankingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl BankingProvider for SandboxBankingProvider {
    #[instrument(skip(self, request), fields(provider = %self.name, transfer_id = %request.transfer_id))]
    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<TransferReceipt, AppError> {
        if self.config.fail_transfers {
            return Err(AppError::Provider(ProviderError::Unavailable(
                "Sandbox banking provider configured to fail transfers".to_string(),
            )));
        }
        if self.declines(&request.recipient_account_ref) {
            return Err(AppError::Provider(ProviderError::Declined(format!(
                "Recipient account '{}' declined by sandbox rule",
                request.recipient_account_ref
            ))));
        }
        debug!(provider = %self.name, transfer_id = %request.transfer_id, "Sandbox transfer executed");
        Ok(TransferReceipt {
            transaction_ref: sandbox_ref(),
            posted_at: Some(Utc::now()),
        })
    }

    async fn verify_account(&self, account_ref: &str) -> Result<AccountVerification, AppError> {
        let declined = self.declines(account_ref);
        Ok(AccountVerification {
            account_ref: account_ref.to_string(),
            verified: !declined,
            detail: declined.then(|| "Matched sandbox decline rule".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SandboxScreeningConfig {
    base_risk_score: f64,
    flagged_risk_score: f64,
    /// Payload substring that triggers the flagged score
    flag_contains: Option<String>,
}

impl Default for SandboxScreeningConfig {
    fn default() -> Self {
        Self {
            base_risk_score: DEFAULT_BASE_RISK_SCORE,
            flagged_risk_score: DEFAULT_FLAGGED_RISK_SCORE,
            flag_contains: None,
        }
    }
}

/// In-memory compliance screening provider
pub struct SandboxScreeningProvider {
    name: String,
    config: SandboxScreeningConfig,
}

impl SandboxScreeningProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            name: name.to_string(),
            config: parse_config(configuration)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for SandboxScreeningProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl ScreeningProvider for SandboxScreeningProvider {
    #[instrument(skip(self, request), fields(provider = %self.name, entity_id = %request.entity_id))]
    async fn screen_entity(
        &self,
        request: &ScreeningRequest,
    ) -> Result<ScreeningVerdict, AppError> {
        let haystack = request.payload.to_string();
        let flagged = self
            .config
            .flag_contains
            .as_deref()
            .is_some_and(|needle| haystack.contains(needle));

        if flagged {
            return Ok(ScreeningVerdict {
                risk_score: Some(self.config.flagged_risk_score),
                approved: false,
                flags: vec!["sandbox_flag_match".to_string()],
            });
        }
        Ok(ScreeningVerdict {
            risk_score: Some(self.config.base_risk_score),
            approved: true,
            flags: Vec::new(),
        })
    }
}

/// In-memory payment provider supporting card and ACH rails only.
///
/// Wire and card issuing are deliberately left on the trait defaults to
/// exercise the typed NotSupported path end to end.
pub struct SandboxPaymentProvider {
    name: String,
}

impl SandboxPaymentProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        // No knobs yet; still reject malformed configuration shapes
        let _: serde_json::Map<String, serde_json::Value> = match configuration {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(AppError::Validation(ValidationError::InvalidField {
                    field: "configuration".to_string(),
                    message: format!("Expected an object, got {}", other),
                }));
            }
        };
        Ok(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for SandboxPaymentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for SandboxPaymentProvider {
    #[instrument(skip(self, order), fields(provider = %self.name, reference = %order.reference))]
    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        debug!(provider = %self.name, reference = %order.reference, "Sandbox payment accepted");
        Ok(PaymentReceipt {
            payment_ref: sandbox_ref(),
            accepted_at: Some(Utc::now()),
        })
    }

    #[instrument(skip(self, order), fields(provider = %self.name, reference = %order.reference))]
    async fn process_ach(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        debug!(provider = %self.name, reference = %order.reference, "Sandbox ACH accepted");
        Ok(PaymentReceipt {
            payment_ref: sandbox_ref(),
            accepted_at: Some(Utc::now()),
        })
    }
}

/// Ping-only sandbox adapter for audit and specialized registrations
pub struct SandboxBaseAdapter {
    name: String,
}

impl SandboxBaseAdapter {
    pub fn from_config(name: &str, _configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for SandboxBaseAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
