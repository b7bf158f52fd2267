//! Stripe-specific types for webhook handling.
//!
//! These types represent Stripe API objects as they arrive in webhook
//! payloads. Each handler deserializes `ProviderEvent::data.object` into
//! the shape it expects and validates the embedded metadata before
//! trusting any of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::webhook::{Provider, ProviderEvent, WebhookError};

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    /// Event payload containing the affected object.
    pub data: StripeEventData,

    /// Whether this is a live or test event.
    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,

    /// Previous values for updated fields (on update events).
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeWebhookEvent {
    /// Parses a raw webhook body into the provider-neutral envelope.
    pub fn parse(body: &[u8]) -> Result<ProviderEvent, WebhookError> {
        let event: StripeWebhookEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("stripe event: {}", e)))?;
        Ok(ProviderEvent {
            provider: Provider::Stripe,
            id: event.id,
            event_type: event.event_type,
            created: Some(event.created),
            data: event.data.object,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Customer ID if a customer was created/attached.
    pub customer: Option<String>,

    /// Customer email used during checkout.
    pub customer_email: Option<String>,

    /// Customer details block (email lives here on newer API versions).
    pub customer_details: Option<StripeCustomerDetails>,

    /// Subscription ID if checkout created a subscription.
    pub subscription: Option<String>,

    /// Payment intent for one-time mode.
    pub payment_intent: Option<String>,

    /// Session payment status (`paid`, `unpaid`, `no_payment_required`).
    pub payment_status: String,

    /// Payment mode (`payment`, `setup`, `subscription`).
    pub mode: String,

    /// Amount the payer was charged, minor units.
    pub amount_total: Option<i64>,

    /// ISO currency code, lowercase as Stripe sends it.
    pub currency: Option<String>,

    /// Custom metadata attached at session creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl StripeCheckoutSession {
    pub fn payer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: String,

    /// Subscription status string.
    pub status: String,

    /// Current period end (Unix timestamp).
    pub current_period_end: Option<i64>,

    /// Whether the subscription cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// When cancellation was requested (Unix timestamp).
    pub canceled_at: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: Option<String>,

    /// Subscription this invoice bills.
    pub subscription: Option<String>,

    /// Charge created for this invoice.
    pub charge: Option<String>,

    /// Amount actually paid, minor units.
    #[serde(default)]
    pub amount_paid: i64,

    /// Amount due, minor units.
    #[serde(default)]
    pub amount_due: i64,

    pub currency: Option<String>,

    /// Stripe's own billing reason (`subscription_create`,
    /// `subscription_cycle`, ...).
    pub billing_reason: Option<String>,

    /// Fee assessed by the platform, when the integration records it via
    /// the application-fee mechanism.
    pub application_fee_amount: Option<i64>,

    /// Next payment attempt (Unix timestamp), present on failures.
    pub next_payment_attempt: Option<i64>,

    /// Period end this invoice pays for (Unix timestamp).
    pub period_end: Option<i64>,

    #[serde(default)]
    pub attempt_count: i32,
}

/// Stripe Charge object (as delivered on `charge.refunded`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCharge {
    /// Unique charge identifier (ch_...).
    pub id: String,

    pub customer: Option<String>,
    pub payment_intent: Option<String>,

    /// Original charge amount, minor units.
    pub amount: i64,

    /// Total refunded so far, minor units.
    #[serde(default)]
    pub amount_refunded: i64,

    pub currency: Option<String>,

    #[serde(default)]
    pub refunded: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Dispute object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeDispute {
    /// Unique dispute identifier (dp_...).
    pub id: String,

    /// Disputed charge (ch_...).
    pub charge: String,

    /// Disputed amount, minor units.
    pub amount: i64,

    pub currency: Option<String>,

    /// Dispute status (`warning_needs_response`, `won`, `lost`, ...).
    pub status: String,
}

/// Stripe Payout object (Connect account payout).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePayout {
    /// Unique payout identifier (po_...).
    pub id: String,

    pub amount: i64,
    pub currency: String,

    /// Payout status (`paid`, `failed`, `in_transit`, ...).
    pub status: String,

    /// Failure classification when status is `failed`.
    pub failure_code: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Account object (Connect), as delivered on `account.updated`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeAccount {
    /// Account identifier (acct_...).
    pub id: String,

    #[serde(default)]
    pub charges_enabled: bool,

    #[serde(default)]
    pub payouts_enabled: bool,

    pub requirements: Option<StripeAccountRequirements>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeAccountRequirements {
    /// Present when the provider disabled the account.
    pub disabled_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_event_envelope_into_provider_event() {
        let body = json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": { "id": "in_1" } }
        });
        let event = StripeWebhookEvent::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.provider, Provider::Stripe);
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "invoice.paid");
        assert_eq!(event.created, Some(1_700_000_000));
        assert_eq!(event.data["id"], "in_1");
    }

    #[test]
    fn rejects_unparseable_body() {
        let err = StripeWebhookEvent::parse(b"not json").unwrap_err();
        assert!(matches!(err, WebhookError::ParseError(_)));
    }

    #[test]
    fn checkout_session_prefers_customer_details_email() {
        let session: StripeCheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "customer_email": "fallback@example.com",
            "customer_details": { "email": "primary@example.com", "name": null },
            "payment_status": "paid",
            "mode": "subscription"
        }))
        .unwrap();
        assert_eq!(session.payer_email(), Some("primary@example.com"));
    }

    #[test]
    fn invoice_defaults_optional_amounts() {
        let invoice: StripeInvoice = serde_json::from_value(json!({
            "id": "in_1",
            "subscription": "sub_1"
        }))
        .unwrap();
        assert_eq!(invoice.amount_paid, 0);
        assert_eq!(invoice.attempt_count, 0);
        assert!(invoice.application_fee_amount.is_none());
    }
}
