//! Webhook HTTP surface.
//!
//! Two endpoints, no auth middleware; authenticity comes from the
//! provider signature on the raw body. The raw bytes are verified before
//! any parsing; a parse or signature failure is the provider's problem
//! (400), everything after the envelope is the router's decision.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use tracing::warn;

use crate::adapters::paystack::PaystackWebhookEvent;
use crate::adapters::stripe::StripeWebhookEvent;
use crate::application::WebhookRouter;
use crate::domain::webhook::{Provider, ProviderEvent, WebhookError};
use crate::ports::SignatureVerifier;

/// Shared state for the webhook endpoints.
#[derive(Clone)]
pub struct WebhookAppState {
    pub verifier: Arc<dyn SignatureVerifier>,
    pub router: Arc<WebhookRouter>,
}

impl WebhookAppState {
    pub fn new(verifier: Arc<dyn SignatureVerifier>, router: Arc<WebhookRouter>) -> Self {
        Self { verifier, router }
    }
}

/// `POST /webhooks/stripe` and `POST /webhooks/paystack`.
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/paystack", post(handle_paystack_webhook))
}

async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    handle_provider_webhook(&state, Provider::Stripe, "stripe-signature", &headers, &body).await
}

async fn handle_paystack_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    handle_provider_webhook(
        &state,
        Provider::Paystack,
        "x-paystack-signature",
        &headers,
        &body,
    )
    .await
}

async fn handle_provider_webhook(
    state: &WebhookAppState,
    provider: Provider,
    signature_header_name: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let Some(signature) = headers
        .get(signature_header_name)
        .and_then(|v| v.to_str().ok())
    else {
        return bad_request(format!("missing {} header", signature_header_name));
    };

    if let Err(err) = state.verifier.verify(provider, body, signature).await {
        warn!(provider = %provider, error = %err, "webhook signature rejected");
        return bad_request("signature verification failed".to_string());
    }

    let event = match parse_event(provider, body) {
        Ok(event) => event,
        Err(err) => {
            warn!(provider = %provider, error = %err, "webhook payload unparseable");
            return bad_request(err.to_string());
        }
    };

    let response = state.router.handle(&event).await;
    (response.status, Json(response.body)).into_response()
}

fn parse_event(provider: Provider, body: &[u8]) -> Result<ProviderEvent, WebhookError> {
    match provider {
        Provider::Stripe => StripeWebhookEvent::parse(body),
        Provider::Paystack => PaystackWebhookEvent::parse(body),
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
