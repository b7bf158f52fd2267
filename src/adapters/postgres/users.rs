//! PostgreSQL user directory.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriberId};
use crate::ports::UserDirectory;

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_or_create_by_email(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<SubscriberId, DomainError> {
        let email = email.trim();

        // Upsert against the case-insensitive unique index; the no-op
        // DO UPDATE lets RETURNING yield the existing id on a hit.
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, display_name, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (lower(email)) DO UPDATE SET email = users.email
            RETURNING id
            "#,
        )
        .bind(SubscriberId::new().as_uuid())
        .bind(email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to resolve user by email", e))?;

        Ok(SubscriberId::from_uuid(id))
    }
}
