//! Paystack transfer API client.
//!
//! Implements the `TransferGateway` port against the Paystack REST API:
//! recipient creation, transfer initiation and the balance read. The API
//! is treated as an opaque external service; every failure maps to
//! `ErrorCode::ProviderError` and the caller decides what is best-effort.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::foundation::{CurrencyCode, DomainError, ErrorCode};
use crate::ports::{TransferGateway, TransferInitiation, TransferRecipient};

use super::webhook_types::{
    PaystackApiResponse, PaystackBalanceData, PaystackRecipientData, PaystackTransferData,
};

const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// Paystack REST client for outbound transfers.
pub struct PaystackTransferClient {
    http: Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaystackTransferClient {
    pub fn new(http: Client, secret_key: SecretString) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key,
        }
    }

    /// Overrides the API base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, DomainError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%path, "paystack api call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(path, &e.to_string()))?;

        let status = response.status();
        let envelope: PaystackApiResponse<T> = response
            .json()
            .await
            .map_err(|e| provider_error(path, &format!("invalid response body: {}", e)))?;

        if !status.is_success() || !envelope.status {
            let message = envelope.message.unwrap_or_else(|| status.to_string());
            warn!(%path, %message, "paystack api rejected request");
            return Err(provider_error(path, &message));
        }
        envelope
            .data
            .ok_or_else(|| provider_error(path, "response missing data"))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, DomainError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| provider_error(path, &e.to_string()))?;

        let status = response.status();
        let envelope: PaystackApiResponse<T> = response
            .json()
            .await
            .map_err(|e| provider_error(path, &format!("invalid response body: {}", e)))?;

        if !status.is_success() || !envelope.status {
            let message = envelope.message.unwrap_or_else(|| status.to_string());
            return Err(provider_error(path, &message));
        }
        envelope
            .data
            .ok_or_else(|| provider_error(path, "response missing data"))
    }
}

fn provider_error(path: &str, message: &str) -> DomainError {
    DomainError::new(
        ErrorCode::ProviderError,
        format!("paystack {}: {}", path, message),
    )
}

#[async_trait]
impl TransferGateway for PaystackTransferClient {
    async fn create_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
        currency: &CurrencyCode,
    ) -> Result<TransferRecipient, DomainError> {
        let data: PaystackRecipientData = self
            .post(
                "/transferrecipient",
                json!({
                    "type": "nuban",
                    "name": name,
                    "account_number": account_number,
                    "bank_code": bank_code,
                    "currency": currency.as_str(),
                }),
            )
            .await?;
        Ok(TransferRecipient {
            recipient_code: data.recipient_code,
        })
    }

    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount_cents: i64,
        currency: &CurrencyCode,
        reference: &str,
        reason: &str,
    ) -> Result<TransferInitiation, DomainError> {
        let data: PaystackTransferData = self
            .post(
                "/transfer",
                json!({
                    "source": "balance",
                    "recipient": recipient_code,
                    "amount": amount_cents,
                    "currency": currency.as_str(),
                    "reference": reference,
                    "reason": reason,
                }),
            )
            .await?;
        Ok(TransferInitiation {
            reference: data.reference.unwrap_or_else(|| reference.to_string()),
            transfer_code: data.transfer_code,
            requires_otp: data.status.as_deref() == Some("otp"),
        })
    }

    async fn balance(&self, currency: &CurrencyCode) -> Result<i64, DomainError> {
        let balances: Vec<PaystackBalanceData> = self.get("/balance").await?;
        Ok(balances
            .iter()
            .find(|b| b.currency.eq_ignore_ascii_case(currency.as_str()))
            .map(|b| b.balance)
            .unwrap_or(0))
    }
}
