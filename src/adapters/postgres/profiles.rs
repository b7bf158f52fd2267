//! PostgreSQL profile projection store.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::fees::Purpose;
use crate::domain::foundation::{CreatorId, DomainError, ErrorCode};
use crate::ports::{PayoutStatus, Profile, ProfileStore};

pub struct PostgresProfileStore {
    pool: PgPool,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    creator_id: Uuid,
    email: String,
    payout_status: String,
    platform_debit_cents: i64,
    purpose: String,
    transfer_recipient_code: Option<String>,
    saved_payment_method: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            creator_id: CreatorId::from_uuid(row.creator_id),
            email: row.email,
            payout_status: PayoutStatus::from_tag(&row.payout_status),
            platform_debit_cents: row.platform_debit_cents,
            purpose: match row.purpose.as_str() {
                "service" => Purpose::Service,
                _ => Purpose::Personal,
            },
            transfer_recipient_code: row.transfer_recipient_code.map(SecretString::new),
            saved_payment_method: row.saved_payment_method.map(SecretString::new),
        }
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

fn purpose_tag(purpose: Purpose) -> &'static str {
    match purpose {
        Purpose::Service => "service",
        Purpose::Personal => "personal",
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn find_by_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Option<Profile>, DomainError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT creator_id, email, payout_status, platform_debit_cents,
                   purpose, transfer_recipient_code, saved_payment_method
            FROM creator_profiles
            WHERE creator_id = $1
            "#,
        )
        .bind(creator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find profile", e))?;

        Ok(row.map(Profile::from))
    }

    async fn set_payout_status(
        &self,
        creator_id: &CreatorId,
        status: PayoutStatus,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE creator_profiles SET payout_status = $2, updated_at = NOW()
            WHERE creator_id = $1
            "#,
        )
        .bind(creator_id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to set payout status", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("No profile for creator {}", creator_id),
            ));
        }

        Ok(())
    }

    async fn decrement_platform_debit(
        &self,
        creator_id: &CreatorId,
        cents: i64,
    ) -> Result<i64, DomainError> {
        // Single-statement clamp so concurrent recoveries cannot drive the
        // balance negative.
        let recovered: Option<i64> = sqlx::query_scalar(
            r#"
            WITH prev AS (
                SELECT platform_debit_cents FROM creator_profiles
                WHERE creator_id = $1
                FOR UPDATE
            )
            UPDATE creator_profiles
            SET platform_debit_cents = GREATEST(platform_debit_cents - GREATEST($2, 0), 0),
                updated_at = NOW()
            FROM prev
            WHERE creator_id = $1
            RETURNING prev.platform_debit_cents - creator_profiles.platform_debit_cents
            "#,
        )
        .bind(creator_id.as_uuid())
        .bind(cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to decrement platform debit", e))?;

        recovered.ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("No profile for creator {}", creator_id),
            )
        })
    }

    async fn update(&self, profile: &Profile) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO creator_profiles (
                creator_id, email, payout_status, platform_debit_cents,
                purpose, transfer_recipient_code, saved_payment_method, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (creator_id) DO UPDATE SET
                email = EXCLUDED.email,
                payout_status = EXCLUDED.payout_status,
                platform_debit_cents = EXCLUDED.platform_debit_cents,
                purpose = EXCLUDED.purpose,
                transfer_recipient_code = EXCLUDED.transfer_recipient_code,
                saved_payment_method = EXCLUDED.saved_payment_method,
                updated_at = NOW()
            "#,
        )
        .bind(profile.creator_id.as_uuid())
        .bind(&profile.email)
        .bind(profile.payout_status.as_str())
        .bind(profile.platform_debit_cents)
        .bind(purpose_tag(profile.purpose))
        .bind(
            profile
                .transfer_recipient_code
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
        )
        .bind(
            profile
                .saved_payment_method
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update profile", e))?;

        Ok(())
    }
}
