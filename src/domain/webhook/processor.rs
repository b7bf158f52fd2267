//! Idempotent webhook processor.
//!
//! Coordinates the event ledger with the per-event handlers so each
//! provider event takes effect exactly once:
//!
//! 1. Upsert the ledger record by provider-prefixed event id; a row already
//!    `processed` short-circuits without invoking any handler.
//! 2. Mark `processing`, dispatch to the registered handler.
//! 3. Record the terminal status (`processed` / `skipped` / `failed`) with
//!    the processing time. Bookkeeping failures on this last step are
//!    logged and swallowed so they never mask the handler's own result.
//!
//! Concurrent deliveries of the same event race on the ledger's unique
//! constraint; the loser sees the existing row and skips.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::ports::{UpsertOutcome, WebhookEventRepository, WebhookEventStatus};

use super::{Provider, ProviderEvent, WebhookError};

/// Handler for one or more event types of a single provider.
///
/// Implementations are stateless with respect to the event stream: they
/// must be safe to re-invoke with the same event, since a retry response
/// guarantees redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The event-type strings this handler processes.
    fn event_types(&self) -> &'static [&'static str];

    /// Handles the event. `Err(WebhookError::Ignored(_))` means the event
    /// should be acknowledged but recorded as skipped.
    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError>;
}

/// Per-provider handler lookup.
pub trait HandlerRegistry: Send + Sync {
    fn handler_for(&self, provider: Provider, event_type: &str) -> Option<&dyn EventHandler>;
}

/// Result of running one delivery through the processor.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Handler ran to completion on this delivery.
    Processed,
    /// The ledger already holds a `processed` row; no-op.
    AlreadyProcessed,
    /// No handler for the type, or the handler deliberately ignored it.
    Skipped,
    /// Handler failed; whether this becomes a retry signal depends on the
    /// event type's criticality (the router's call, not ours).
    Failed(WebhookError),
}

/// Processes webhook events exactly once against the event ledger.
pub struct IdempotentWebhookProcessor {
    repository: Arc<dyn WebhookEventRepository>,
    registry: Arc<dyn HandlerRegistry>,
}

impl IdempotentWebhookProcessor {
    pub fn new(
        repository: Arc<dyn WebhookEventRepository>,
        registry: Arc<dyn HandlerRegistry>,
    ) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Runs one delivery through the ledger and the handler.
    ///
    /// # Errors
    ///
    /// Only ledger failures *before* dispatch surface as errors; handler
    /// failures come back as [`WebhookOutcome::Failed`] so the router can
    /// weigh them against the event type's criticality.
    pub async fn process(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        let ledger_id = event.ledger_event_id();

        let outcome = self
            .repository
            .upsert_received(&ledger_id, event.provider, &event.event_type, &event.data)
            .await?;

        if let UpsertOutcome::Replayed(record) = &outcome {
            if record.status == WebhookEventStatus::Processed {
                info!(
                    event_id = %ledger_id,
                    event_type = %event.event_type,
                    retry_count = record.retry_count,
                    "duplicate delivery of processed event, skipping"
                );
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
        }

        self.repository.mark_processing(&ledger_id).await?;
        let started = Instant::now();

        let result = match self.registry.handler_for(event.provider, &event.event_type) {
            Some(handler) => handler.handle(event).await,
            None => Err(WebhookError::Ignored(format!(
                "no handler for event type {}",
                event.event_type
            ))),
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let (status, error, outcome) = match result {
            Ok(()) => (WebhookEventStatus::Processed, None, WebhookOutcome::Processed),
            Err(WebhookError::Ignored(reason)) => {
                info!(
                    event_id = %ledger_id,
                    event_type = %event.event_type,
                    %reason,
                    "event skipped"
                );
                (
                    WebhookEventStatus::Skipped,
                    Some(reason),
                    WebhookOutcome::Skipped,
                )
            }
            Err(err) => {
                let message = err.to_string();
                (
                    WebhookEventStatus::Failed,
                    Some(message),
                    WebhookOutcome::Failed(err),
                )
            }
        };

        // The terminal bookkeeping write must never mask the handler's own
        // result.
        if let Err(bookkeeping) = self
            .repository
            .mark_finished(&ledger_id, status, error.as_deref(), elapsed_ms)
            .await
        {
            warn!(
                event_id = %ledger_id,
                error = %bookkeeping,
                "failed to record terminal webhook status"
            );
        }

        Ok(outcome)
    }
}
