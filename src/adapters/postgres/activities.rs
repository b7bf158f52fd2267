//! PostgreSQL activity log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{ActivityId, CreatorId, DomainError, ErrorCode, SubscriberId, Timestamp};
use crate::domain::ledger::Activity;
use crate::ports::ActivityLog;

pub struct PostgresActivityLog {
    pool: PgPool,
}

impl PostgresActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    creator_id: Uuid,
    subscriber_id: Option<Uuid>,
    activity_type: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: ActivityId::from_uuid(row.id),
            creator_id: CreatorId::from_uuid(row.creator_id),
            subscriber_id: row.subscriber_id.map(SubscriberId::from_uuid),
            activity_type: row.activity_type,
            payload: row.payload,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Shared insert so the transactional subscription-store methods can write
/// the audit row in the same transaction.
pub(crate) async fn insert_activity<'e, E>(
    executor: E,
    activity: &Activity,
) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO activities (id, creator_id, subscriber_id, activity_type, payload, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(activity.id.as_uuid())
    .bind(activity.creator_id.as_uuid())
    .bind(activity.subscriber_id.as_ref().map(|id| *id.as_uuid()))
    .bind(&activity.activity_type)
    .bind(&activity.payload)
    .bind(activity.created_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| db_error("Failed to insert activity", e))?;

    Ok(())
}

#[async_trait]
impl ActivityLog for PostgresActivityLog {
    async fn record(&self, activity: &Activity) -> Result<(), DomainError> {
        insert_activity(&self.pool, activity).await
    }

    async fn recent_for_creator(
        &self,
        creator_id: &CreatorId,
        limit: u32,
    ) -> Result<Vec<Activity>, DomainError> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT id, creator_id, subscriber_id, activity_type, payload, created_at
            FROM activities
            WHERE creator_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(creator_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list activities", e))?;

        Ok(rows.into_iter().map(Activity::from).collect())
    }
}
