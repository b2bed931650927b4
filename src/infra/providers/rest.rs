//! REST provider adapters speaking the shared JSON envelope convention.
//!
//! Every hosted provider integration follows the same wire contract: bearer
//! auth from the registration's `api_key`, JSON request bodies, and responses
//! wrapped in `{"success": bool, "data": ...}` or
//! `{"success": false, "error": {"code", "message"}}`. The adapters here only
//! differ in which capability trait they expose over that plumbing.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::domain::{
    AccountVerification, AppError, BankingProvider, CardIssueRequest, ExecuteTransferRequest,
    IssuedCard, PaymentOrder, PaymentProvider, PaymentReceipt, ProviderAdapter, ProviderError,
    ScreeningProvider, ScreeningRequest, ScreeningVerdict, TransferReceipt, ValidationError,
};

/// Default per-request timeout for provider HTTP calls
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Configuration schema shared by all REST adapters
#[derive(Debug, Deserialize)]
struct RestConfig {
    api_base_url: String,
    api_key: SecretString,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

/// Standard response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Shared HTTP plumbing behind the capability-specific adapters
#[derive(Debug, Clone)]
pub struct RestCore {
    name: String,
    http_client: Client,
    base_url: String,
    api_key: SecretString,
}

impl RestCore {
    /// Build the core from a registration's opaque configuration.
    ///
    /// Missing or malformed `api_base_url`/`api_key` is a validation error at
    /// registration time, never a runtime surprise.
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        let config: RestConfig =
            serde_json::from_value(configuration.clone()).map_err(|e| {
                AppError::Validation(ValidationError::InvalidField {
                    field: "configuration".to_string(),
                    message: format!("Invalid REST provider configuration: {}", e),
                })
            })?;
        if config.api_base_url.trim().is_empty() {
            return Err(AppError::Validation(ValidationError::MissingField(
                "api_base_url".to_string(),
            )));
        }
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(AppError::Validation(ValidationError::MissingField(
                "api_key".to_string(),
            )));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.timeout_ms.min(3_000)))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// POST a JSON body and unwrap the response envelope.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(provider = %self.name, url = %url, "Calling provider API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.name, error = %e, "Provider API request failed");
                AppError::Provider(ProviderError::from(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(provider = %self.name, status = %status, body = %message, "Provider API returned error");
            return Err(AppError::Provider(ProviderError::Api {
                status: status.as_u16(),
                message,
            }));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            error!(provider = %self.name, error = %e, "Failed to parse provider response");
            AppError::Provider(ProviderError::Parse(e.to_string()))
        })?;

        if !envelope.success {
            let (code, message) = envelope
                .error
                .map(|e| (e.code, e.message))
                .unwrap_or((None, "Provider reported failure without detail".to_string()));
            return Err(AppError::Provider(ProviderError::Api {
                status: status.as_u16(),
                message: match code {
                    Some(code) => format!("{}: {}", code, message),
                    None => message,
                },
            }));
        }

        envelope.data.ok_or_else(|| {
            AppError::Provider(ProviderError::Parse(
                "Provider reported success without data".to_string(),
            ))
        })
    }

    /// Connectivity probe; any 2xx from the provider's health path passes.
    async fn ping(&self) -> Result<(), AppError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::Provider(ProviderError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider(ProviderError::Api {
                status: status.as_u16(),
                message: "Health probe failed".to_string(),
            }));
        }
        Ok(())
    }
}

/// Banking integration over the envelope contract
pub struct RestBankingProvider {
    core: RestCore,
}

impl RestBankingProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            core: RestCore::from_config(name, configuration)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for RestBankingProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.core.ping().await
    }
}

#[async_trait]
impl BankingProvider for RestBankingProvider {
    #[instrument(skip(self, request), fields(provider = %self.core.name, transfer_id = %request.transfer_id))]
    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<TransferReceipt, AppError> {
        self.core.post("/transfers", request).await
    }

    #[instrument(skip(self), fields(provider = %self.core.name))]
    async fn verify_account(&self, account_ref: &str) -> Result<AccountVerification, AppError> {
        self.core
            .post(
                "/accounts/verify",
                &serde_json::json!({ "account_ref": account_ref }),
            )
            .await
    }
}

/// Compliance screening integration over the envelope contract
pub struct RestScreeningProvider {
    core: RestCore,
}

impl RestScreeningProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            core: RestCore::from_config(name, configuration)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for RestScreeningProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.core.ping().await
    }
}

#[async_trait]
impl ScreeningProvider for RestScreeningProvider {
    #[instrument(skip(self, request), fields(provider = %self.core.name, entity_id = %request.entity_id))]
    async fn screen_entity(
        &self,
        request: &ScreeningRequest,
    ) -> Result<ScreeningVerdict, AppError> {
        self.core.post("/screenings", request).await
    }
}

/// Payment rail integration over the envelope contract
pub struct RestPaymentProvider {
    core: RestCore,
}

impl RestPaymentProvider {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            core: RestCore::from_config(name, configuration)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for RestPaymentProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.core.ping().await
    }
}

#[async_trait]
impl PaymentProvider for RestPaymentProvider {
    #[instrument(skip(self, order), fields(provider = %self.core.name, reference = %order.reference))]
    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        self.core.post("/payments", order).await
    }

    #[instrument(skip(self, order), fields(provider = %self.core.name, reference = %order.reference))]
    async fn process_ach(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        self.core.post("/payments/ach", order).await
    }

    #[instrument(skip(self, order), fields(provider = %self.core.name, reference = %order.reference))]
    async fn process_wire(&self, order: &PaymentOrder) -> Result<PaymentReceipt, AppError> {
        self.core.post("/payments/wire", order).await
    }

    #[instrument(skip(self, request), fields(provider = %self.core.name))]
    async fn issue_card(&self, request: &CardIssueRequest) -> Result<IssuedCard, AppError> {
        self.core.post("/cards", request).await
    }
}

/// Ping-only adapter for audit and specialized registrations
pub struct RestBaseAdapter {
    core: RestCore,
}

impl RestBaseAdapter {
    pub fn from_config(name: &str, configuration: &serde_json::Value) -> Result<Self, AppError> {
        Ok(Self {
            core: RestCore::from_config(name, configuration)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for RestBaseAdapter {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.core.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> serde_json::Value {
        serde_json::json!({
            "api_base_url": "https://api.example.com/v1",
            "api_key": "sk_test_123",
        })
    }

    #[test]
    fn test_core_from_valid_config() {
        let core = RestCore::from_config("stripe", &valid_config()).unwrap();
        assert_eq!(core.name(), "stripe");
        assert_eq!(core.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_core_strips_trailing_slash() {
        let core = RestCore::from_config(
            "stripe",
            &serde_json::json!({
                "api_base_url": "https://api.example.com/v1/",
                "api_key": "sk_test_123",
            }),
        )
        .unwrap();
        assert_eq!(core.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_core_rejects_missing_api_key() {
        let result = RestCore::from_config(
            "stripe",
            &serde_json::json!({ "api_base_url": "https://api.example.com" }),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_core_rejects_blank_api_key() {
        let result = RestCore::from_config(
            "stripe",
            &serde_json::json!({
                "api_base_url": "https://api.example.com",
                "api_key": "   ",
            }),
        );
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::MissingField(ref f))) if f == "api_key"
        ));
    }

    #[test]
    fn test_core_rejects_blank_base_url() {
        let result = RestCore::from_config(
            "stripe",
            &serde_json::json!({ "api_base_url": "", "api_key": "sk_test_123" }),
        );
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::MissingField(ref f))) if f == "api_base_url"
        ));
    }

    #[test]
    fn test_core_rejects_non_object_config() {
        let result = RestCore::from_config("stripe", &serde_json::json!("not an object"));
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::InvalidField { ref field, .. }))
                if field == "configuration"
        ));
    }

    #[test]
    fn test_envelope_error_deserializes() {
        let envelope: Envelope<ScreeningVerdict> = serde_json::from_value(serde_json::json!({
            "success": false,
            "error": { "code": "rate_limited", "message": "Slow down" },
        }))
        .unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        let error = envelope.error.unwrap();
        assert_eq!(error.code.as_deref(), Some("rate_limited"));
        assert_eq!(error.message, "Slow down");
    }

    #[test]
    fn test_envelope_data_deserializes() {
        let envelope: Envelope<TransferReceipt> = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": { "transaction_ref": "txn_abc", "posted_at": null },
        }))
        .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().transaction_ref, "txn_abc");
    }
}
