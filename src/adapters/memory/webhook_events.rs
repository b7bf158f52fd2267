//! In-memory webhook-event ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::webhook::Provider;
use crate::ports::{UpsertOutcome, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus};

/// Map-backed event ledger with the same upsert semantics as postgres.
#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<String, WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn upsert_received(
        &self,
        event_id: &str,
        provider: Provider,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, DomainError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get_mut(event_id) {
            existing.retry_count += 1;
            existing.updated_at = Timestamp::now();
            Ok(UpsertOutcome::Replayed(existing.clone()))
        } else {
            let record =
                WebhookEventRecord::received(event_id, provider, event_type, payload.clone());
            records.insert(event_id.to_string(), record.clone());
            Ok(UpsertOutcome::Inserted(record))
        }
    }

    async fn mark_processing(&self, event_id: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| {
            DomainError::new(ErrorCode::DatabaseError, "webhook event not found")
        })?;
        record.status = WebhookEventStatus::Processing;
        record.updated_at = Timestamp::now();
        Ok(())
    }

    async fn mark_finished(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
        processing_time_ms: i64,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| {
            DomainError::new(ErrorCode::DatabaseError, "webhook event not found")
        })?;
        record.status = status;
        record.error = error.map(str::to_owned);
        record.processing_time_ms = Some(processing_time_ms);
        record.updated_at = Timestamp::now();
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.received_at.is_before(&cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replay_increments_retry_count() {
        let repo = InMemoryWebhookEventRepository::new();
        let payload = json!({});

        let first = repo
            .upsert_received("stripe:evt_1", Provider::Stripe, "invoice.paid", &payload)
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = repo
            .upsert_received("stripe:evt_1", Provider::Stripe, "invoice.paid", &payload)
            .await
            .unwrap();
        match second {
            UpsertOutcome::Replayed(record) => assert_eq!(record.retry_count, 1),
            other => panic!("expected replay, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn retention_deletes_old_rows() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.upsert_received("stripe:evt_old", Provider::Stripe, "t", &json!({}))
            .await
            .unwrap();

        let deleted = repo.delete_before(Timestamp::now().add_days(1)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.find_by_event_id("stripe:evt_old").await.unwrap().is_none());
    }
}
