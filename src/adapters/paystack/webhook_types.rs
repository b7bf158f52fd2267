//! Paystack-specific types for webhook handling.
//!
//! Paystack delivers `{ "event": "...", "data": { ... } }` with no event
//! id on the envelope, so one is synthesized from the event name plus the
//! payload's stable reference; deterministic across redeliveries, which
//! is what the idempotency ledger needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::webhook::{Provider, ProviderEvent, WebhookError};

/// Raw Paystack webhook envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackWebhookEvent {
    /// Event name, e.g. `charge.success`, `transfer.failed`.
    pub event: String,

    /// Event payload.
    pub data: Value,
}

impl PaystackWebhookEvent {
    /// Parses a raw webhook body into the provider-neutral envelope.
    pub fn parse(body: &[u8]) -> Result<ProviderEvent, WebhookError> {
        let event: PaystackWebhookEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("paystack event: {}", e)))?;
        let id = synthesize_event_id(&event.event, &event.data)?;
        Ok(ProviderEvent {
            provider: Provider::Paystack,
            id,
            event_type: event.event,
            created: None,
            data: event.data,
        })
    }
}

/// Builds a deterministic event id from the payload's stable reference.
///
/// Preference order: transaction `reference`, transfer `reference`,
/// `transfer_code`, `subscription_code`, numeric `id`. Redelivery of the
/// same logical event always reproduces the same id.
fn synthesize_event_id(event: &str, data: &Value) -> Result<String, WebhookError> {
    let stable = data
        .get("reference")
        .and_then(Value::as_str)
        .or_else(|| data.get("transfer_code").and_then(Value::as_str))
        .or_else(|| data.get("subscription_code").and_then(Value::as_str))
        .map(str::to_owned)
        .or_else(|| data.get("id").and_then(Value::as_i64).map(|id| id.to_string()))
        .ok_or(WebhookError::MissingField("reference"))?;
    Ok(format!("{}:{}", event, stable))
}

// ════════════════════════════════════════════════════════════════════════════════
// Paystack Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// `charge.success` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackCharge {
    pub id: i64,

    /// Stable transaction reference.
    pub reference: String,

    /// Amount in minor units (kobo/pesewas).
    pub amount: i64,

    pub currency: String,

    /// Charge status string (`success` on this event).
    pub status: String,

    /// Channel the payer used (`card`, `bank`, `mobile_money`, ...).
    /// Asynchronous channels defer attribution to the follow-up.
    pub channel: Option<String>,

    pub paid_at: Option<String>,

    pub customer: PaystackCustomer,

    pub authorization: Option<PaystackAuthorization>,

    /// Free-form metadata; Paystack may deliver an object, a JSON-encoded
    /// string, or an empty string.
    #[serde(default)]
    pub metadata: Value,

    /// Present when the charge renews a subscription plan.
    pub plan: Option<Value>,
}

impl PaystackCharge {
    /// Metadata as a JSON object regardless of how Paystack encoded it.
    pub fn metadata_object(&self) -> Option<Value> {
        match &self.metadata {
            Value::Object(_) => Some(self.metadata.clone()),
            Value::String(s) if !s.is_empty() => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackCustomer {
    pub email: String,
    pub customer_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackAuthorization {
    /// Reusable charge authorization (AUTH_...); stored encrypted.
    pub authorization_code: Option<String>,
    pub channel: Option<String>,
    pub reusable: Option<bool>,
}

/// `transfer.success` / `transfer.failed` / `transfer.reversed` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackTransfer {
    /// Caller-supplied reference used for reconciliation.
    pub reference: Option<String>,

    /// Provider transfer handle (TRF_...).
    pub transfer_code: Option<String>,

    pub amount: i64,
    pub currency: String,

    /// Transfer status (`success`, `failed`, `reversed`, `otp`).
    pub status: String,

    pub reason: Option<String>,

    pub recipient: Option<PaystackRecipient>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackRecipient {
    pub recipient_code: Option<String>,
    pub name: Option<String>,
}

/// `refund.processed` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackRefund {
    /// Reference of the refunded transaction.
    pub transaction_reference: Option<String>,

    /// Refunded amount, minor units.
    pub amount: i64,

    pub currency: Option<String>,

    pub status: Option<String>,
}

/// `subscription.disable` / `subscription.not_renew` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackSubscription {
    pub subscription_code: Option<String>,
    pub status: Option<String>,
    pub customer: Option<PaystackCustomer>,
    #[serde(default)]
    pub plan: Value,
}

/// `charge.dispute.create` / `charge.dispute.resolve` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackDispute {
    pub id: Option<i64>,

    /// Resolution (`merchant-accepted`, `declined`, ...); absent on
    /// creation.
    pub resolution: Option<String>,

    pub status: Option<String>,

    /// Amount under dispute, minor units.
    pub refund_amount: Option<i64>,

    pub transaction: Option<PaystackDisputeTransaction>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaystackDisputeTransaction {
    pub reference: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

/// API response envelope for outbound Paystack calls.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackApiResponse<T> {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// `data` of a create-recipient response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackRecipientData {
    pub recipient_code: String,
}

/// `data` of an initiate-transfer response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackTransferData {
    pub reference: Option<String>,
    pub transfer_code: Option<String>,
    pub status: Option<String>,
}

/// One balance entry of a check-balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackBalanceData {
    pub currency: String,
    pub balance: i64,
}
