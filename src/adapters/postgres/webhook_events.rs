//! PostgreSQL webhook-event ledger.
//!
//! The receipt upsert leans on the unique `event_id` column: concurrent
//! deliveries of one event race on the insert and the loser lands on the
//! ON CONFLICT arm, which is exactly the replay path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::webhook::Provider;
use crate::ports::{
    UpsertOutcome, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus,
};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    provider: String,
    event_type: String,
    status: String,
    retry_count: i32,
    error: Option<String>,
    processing_time_ms: Option<i64>,
    payload: serde_json::Value,
    received_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    // Only the upsert query projects this flag.
    #[sqlx(default)]
    inserted: bool,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let provider = Provider::from_tag(&row.provider).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid provider value: {}", row.provider),
            )
        })?;

        Ok(WebhookEventRecord {
            event_id: row.event_id,
            provider,
            event_type: row.event_type,
            status: WebhookEventStatus::from_tag(&row.status),
            retry_count: row.retry_count,
            error: row.error,
            processing_time_ms: row.processing_time_ms,
            payload: row.payload,
            received_at: Timestamp::from_datetime(row.received_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn upsert_received(
        &self,
        event_id: &str,
        provider: Provider,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<UpsertOutcome, DomainError> {
        // xmax = 0 distinguishes a fresh insert from the conflict arm.
        let row: WebhookEventRow = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (
                event_id, provider, event_type, status, retry_count,
                payload, received_at, updated_at
            ) VALUES ($1, $2, $3, 'received', 0, $4, NOW(), NOW())
            ON CONFLICT (event_id) DO UPDATE SET
                retry_count = webhook_events.retry_count + 1,
                updated_at = NOW()
            RETURNING event_id, provider, event_type, status, retry_count,
                      error, processing_time_ms, payload, received_at,
                      updated_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(event_id)
        .bind(provider.as_str())
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert webhook event", e))?;

        let inserted = row.inserted;
        let record = WebhookEventRecord::try_from(row)?;
        Ok(if inserted {
            UpsertOutcome::Inserted(record)
        } else {
            UpsertOutcome::Replayed(record)
        })
    }

    async fn mark_processing(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processing', updated_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark webhook event processing", e))?;

        Ok(())
    }

    async fn mark_finished(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
        processing_time_ms: i64,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $2, error = $3, processing_time_ms = $4, updated_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(status.as_str())
        .bind(error)
        .bind(processing_time_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to finish webhook event", e))?;

        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, provider, event_type, status, retry_count,
                   error, processing_time_ms, payload, received_at,
                   updated_at, FALSE AS inserted
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_events WHERE received_at < $1
            "#,
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to prune webhook events", e))?;

        Ok(result.rows_affected())
    }
}
