//! Event router: handler registry plus the HTTP-level outcome decision.
//!
//! The processor reports what happened; the router decides what the
//! provider should see. Handler failures signal retry so the provider's
//! backoff redelivers, with the failure already recorded in the event
//! ledger; critical event types escalate the failure log to error level.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, info, warn};

use crate::domain::webhook::{
    is_critical_event, EventHandler, HandlerRegistry, IdempotentWebhookProcessor, Provider,
    ProviderEvent, WebhookError, WebhookOutcome,
};
use crate::ports::WebhookEventRepository;

/// Handler lookup keyed by (provider, event-type string).
#[derive(Default)]
pub struct ProviderHandlerRegistry {
    handlers: HashMap<(Provider, &'static str), Arc<dyn EventHandler>>,
}

impl ProviderHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under every event type it declares.
    pub fn register(mut self, provider: Provider, handler: Arc<dyn EventHandler>) -> Self {
        for event_type in handler.event_types() {
            self.handlers.insert((provider, event_type), handler.clone());
        }
        self
    }

}

impl HandlerRegistry for ProviderHandlerRegistry {
    fn handler_for(&self, provider: Provider, event_type: &str) -> Option<&dyn EventHandler> {
        self.handlers
            .iter()
            .find(|((p, t), _)| *p == provider && *t == event_type)
            .map(|(_, handler)| handler.as_ref())
    }
}

/// What the provider sees for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl WebhookResponse {
    fn received() -> Self {
        Self {
            status: StatusCode::OK,
            body: serde_json::json!({ "received": true }),
        }
    }

    fn retry(err: &WebhookError) -> Self {
        Self {
            status: err.status_code(),
            body: serde_json::json!({ "error": err.to_string() }),
        }
    }
}

/// Routes verified events through the idempotent processor and maps the
/// outcome to the HTTP contract.
pub struct WebhookRouter {
    processor: IdempotentWebhookProcessor,
    registry: Arc<ProviderHandlerRegistry>,
}

impl WebhookRouter {
    pub fn new(
        repository: Arc<dyn WebhookEventRepository>,
        registry: Arc<ProviderHandlerRegistry>,
    ) -> Self {
        Self {
            processor: IdempotentWebhookProcessor::new(repository, registry.clone()),
            registry,
        }
    }

    /// Processes one delivery and chooses the provider-visible response.
    pub async fn handle(&self, event: &ProviderEvent) -> WebhookResponse {
        let outcome = match self.processor.process(event).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Ledger failure before dispatch: always retryable.
                error!(
                    event_id = %event.ledger_event_id(),
                    error = %err,
                    "webhook ledger failure"
                );
                return WebhookResponse::retry(&err);
            }
        };

        match outcome {
            WebhookOutcome::Processed => {
                info!(
                    event_id = %event.ledger_event_id(),
                    event_type = %event.event_type,
                    "webhook processed"
                );
                WebhookResponse::received()
            }
            WebhookOutcome::AlreadyProcessed | WebhookOutcome::Skipped => {
                WebhookResponse::received()
            }
            WebhookOutcome::Failed(err) => {
                // A failure here came from a registered handler, and handled
                // events are treated as financial until proven otherwise, so
                // the response always signals retry. The critical list only
                // picks the alert severity.
                if is_critical_event(event.provider, &event.event_type) {
                    error!(
                        event_id = %event.ledger_event_id(),
                        event_type = %event.event_type,
                        error = %err,
                        "critical webhook handler failed, signaling retry"
                    );
                } else {
                    warn!(
                        event_id = %event.ledger_event_id(),
                        event_type = %event.event_type,
                        error = %err,
                        "webhook handler failed, signaling retry"
                    );
                }
                WebhookResponse::retry(&err)
            }
        }
    }
}
