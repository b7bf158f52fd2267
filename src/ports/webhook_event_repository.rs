//! WebhookEventRepository port - the durable idempotency/audit ledger.
//!
//! One record per provider event id (provider-prefixed). The ledger catches
//! replay before any business logic runs; the unique event-id columns on
//! the payment table are the second, independent safety net in case ledger
//! bookkeeping itself races.
//!
//! Providers redeliver events after network timeouts, 5xx responses, and
//! lost acknowledgements. Every handler must be idempotent; this ledger is
//! the first layer making that cheap.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::webhook::Provider;

/// Processing lifecycle of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Upserted on receipt, not yet dispatched.
    Received,
    /// Handler dispatch in flight.
    Processing,
    /// Handler completed; all later deliveries short-circuit.
    Processed,
    /// No handler registered, or the handler deliberately ignored it.
    Skipped,
    /// Handler failed; retry_count grows on redelivery.
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Received => "received",
            WebhookEventStatus::Processing => "processing",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Skipped => "skipped",
            WebhookEventStatus::Failed => "failed",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "processing" => WebhookEventStatus::Processing,
            "processed" => WebhookEventStatus::Processed,
            "skipped" => WebhookEventStatus::Skipped,
            "failed" => WebhookEventStatus::Failed,
            _ => WebhookEventStatus::Received,
        }
    }
}

/// One ledger record per provider event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Provider-prefixed event id (`stripe:evt_...`, `paystack:...`);
    /// unique.
    pub event_id: String,
    pub provider: Provider,
    pub event_type: String,
    pub status: WebhookEventStatus,
    /// Number of deliveries beyond the first.
    pub retry_count: i32,
    pub error: Option<String>,
    pub processing_time_ms: Option<i64>,
    /// Minimal payload snapshot for debugging.
    pub payload: serde_json::Value,
    pub received_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookEventRecord {
    /// Fresh record for a first delivery.
    pub fn received(
        event_id: impl Into<String>,
        provider: Provider,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            event_id: event_id.into(),
            provider,
            event_type: event_type.into(),
            status: WebhookEventStatus::Received,
            retry_count: 0,
            error: None,
            processing_time_ms: None,
            payload,
            received_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of the receipt upsert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// First delivery; a fresh `received` row was inserted.
    Inserted(WebhookEventRecord),
    /// Replay; retry_count was incremented and the existing row returned.
    Replayed(WebhookEventRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &WebhookEventRecord {
        match self {
            UpsertOutcome::Inserted(r) | UpsertOutcome::Replayed(r) => r,
        }
    }
}

/// Port for the webhook-event ledger.
///
/// Implementations rely on a unique constraint on `event_id` so concurrent
/// deliveries of the same event cannot both insert.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Upsert on receipt: insert a `received` row for a first delivery, or
    /// increment `retry_count` and return the existing row for a replay.
    async fn upsert_received(
        &self,
        event_id: &str,
        provider: Provider,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, DomainError>;

    /// Set the record to `processing` before handler dispatch.
    async fn mark_processing(&self, event_id: &str) -> Result<(), DomainError>;

    /// Terminal status update after dispatch. `error` is set for `failed`
    /// and holds the ignore reason for `skipped`.
    async fn mark_finished(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
        processing_time_ms: i64,
    ) -> Result<(), DomainError>;

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Retention cleanup; returns the number of rows deleted.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
