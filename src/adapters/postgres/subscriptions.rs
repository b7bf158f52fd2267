//! PostgreSQL subscription store.
//!
//! Upserts key on the unique (subscriber_id, creator_id, interval) index
//! so a re-subscription reuses the existing row, and the multi-row write
//! methods run inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::fees::FeeMode;
use crate::domain::foundation::{
    CreatorId, CurrencyCode, DomainError, ErrorCode, SubscriberId, SubscriptionId, Timestamp,
};
use crate::domain::ledger::{Activity, Payment};
use crate::domain::subscription::{Interval, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionStore;

use super::activities::insert_activity;
use super::payments::insert_payment;

const COLUMNS: &str = r#"
    id, creator_id, subscriber_id, tier_id, tier_name,
    amount_cents, currency, interval, status, fee_model, fee_mode, ltv_cents,
    stripe_subscription_id, stripe_customer_id,
    paystack_authorization_code, paystack_customer_code,
    current_period_end, cancel_at_period_end, canceled_at,
    async_view_id, async_request_id,
    status_changed_at, created_at, updated_at
"#;

pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    creator_id: Uuid,
    subscriber_id: Uuid,
    tier_id: Option<String>,
    tier_name: Option<String>,
    amount_cents: i64,
    currency: String,
    interval: String,
    status: String,
    fee_model: Option<String>,
    fee_mode: String,
    ltv_cents: i64,
    stripe_subscription_id: Option<String>,
    stripe_customer_id: Option<String>,
    paystack_authorization_code: Option<String>,
    paystack_customer_code: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    canceled_at: Option<DateTime<Utc>>,
    async_view_id: Option<String>,
    async_request_id: Option<String>,
    status_changed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::parse(&row.currency).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency: {}", e))
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            creator_id: CreatorId::from_uuid(row.creator_id),
            subscriber_id: SubscriberId::from_uuid(row.subscriber_id),
            tier_id: row.tier_id,
            tier_name: row.tier_name,
            amount_cents: row.amount_cents,
            currency,
            interval: Interval::from_tag(&row.interval),
            status: SubscriptionStatus::from_provider(&row.status),
            fee_model: row.fee_model,
            fee_mode: FeeMode::from_tag(Some(&row.fee_mode)),
            ltv_cents: row.ltv_cents,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_customer_id: row.stripe_customer_id,
            paystack_authorization_code: row
                .paystack_authorization_code
                .map(SecretString::new),
            paystack_customer_code: row.paystack_customer_code,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            async_view_id: row.async_view_id,
            async_request_id: row.async_request_id,
            status_changed_at: Timestamp::from_datetime(row.status_changed_at),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Upsert on the parties key; reusable inside and outside a transaction.
async fn upsert_subscription<'e, E>(
    executor: E,
    subscription: &Subscription,
) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, creator_id, subscriber_id, tier_id, tier_name,
            amount_cents, currency, interval, status, fee_model, fee_mode, ltv_cents,
            stripe_subscription_id, stripe_customer_id,
            paystack_authorization_code, paystack_customer_code,
            current_period_end, cancel_at_period_end, canceled_at,
            async_view_id, async_request_id,
            status_changed_at, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
        )
        ON CONFLICT (subscriber_id, creator_id, interval) DO UPDATE SET
            tier_id = EXCLUDED.tier_id,
            tier_name = EXCLUDED.tier_name,
            amount_cents = EXCLUDED.amount_cents,
            currency = EXCLUDED.currency,
            status = EXCLUDED.status,
            fee_model = EXCLUDED.fee_model,
            fee_mode = EXCLUDED.fee_mode,
            ltv_cents = EXCLUDED.ltv_cents,
            stripe_subscription_id = EXCLUDED.stripe_subscription_id,
            stripe_customer_id = EXCLUDED.stripe_customer_id,
            paystack_authorization_code = EXCLUDED.paystack_authorization_code,
            paystack_customer_code = EXCLUDED.paystack_customer_code,
            current_period_end = EXCLUDED.current_period_end,
            cancel_at_period_end = EXCLUDED.cancel_at_period_end,
            canceled_at = EXCLUDED.canceled_at,
            async_view_id = EXCLUDED.async_view_id,
            async_request_id = EXCLUDED.async_request_id,
            status_changed_at = EXCLUDED.status_changed_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(subscription.id.as_uuid())
    .bind(subscription.creator_id.as_uuid())
    .bind(subscription.subscriber_id.as_uuid())
    .bind(&subscription.tier_id)
    .bind(&subscription.tier_name)
    .bind(subscription.amount_cents)
    .bind(subscription.currency.as_str())
    .bind(subscription.interval.as_str())
    .bind(subscription.status.as_str())
    .bind(&subscription.fee_model)
    .bind(subscription.fee_mode.tag())
    .bind(subscription.ltv_cents)
    .bind(&subscription.stripe_subscription_id)
    .bind(&subscription.stripe_customer_id)
    .bind(
        subscription
            .paystack_authorization_code
            .as_ref()
            .map(|s| s.expose_secret().to_string()),
    )
    .bind(&subscription.paystack_customer_code)
    .bind(subscription.current_period_end.as_ref().map(|t| *t.as_datetime()))
    .bind(subscription.cancel_at_period_end)
    .bind(subscription.canceled_at.as_ref().map(|t| *t.as_datetime()))
    .bind(&subscription.async_view_id)
    .bind(&subscription.async_request_id)
    .bind(subscription.status_changed_at.as_datetime())
    .bind(subscription.created_at.as_datetime())
    .bind(subscription.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| db_error("Failed to upsert subscription", e))?;

    Ok(())
}

async fn update_subscription<'e, E>(
    executor: E,
    subscription: &Subscription,
) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET
            tier_id = $2, tier_name = $3, amount_cents = $4, currency = $5,
            status = $6, fee_model = $7, fee_mode = $8, ltv_cents = $9,
            stripe_subscription_id = $10, stripe_customer_id = $11,
            paystack_authorization_code = $12, paystack_customer_code = $13,
            current_period_end = $14, cancel_at_period_end = $15, canceled_at = $16,
            async_view_id = $17, async_request_id = $18,
            status_changed_at = $19, updated_at = $20
        WHERE id = $1
        "#,
    )
    .bind(subscription.id.as_uuid())
    .bind(&subscription.tier_id)
    .bind(&subscription.tier_name)
    .bind(subscription.amount_cents)
    .bind(subscription.currency.as_str())
    .bind(subscription.status.as_str())
    .bind(&subscription.fee_model)
    .bind(subscription.fee_mode.tag())
    .bind(subscription.ltv_cents)
    .bind(&subscription.stripe_subscription_id)
    .bind(&subscription.stripe_customer_id)
    .bind(
        subscription
            .paystack_authorization_code
            .as_ref()
            .map(|s| s.expose_secret().to_string()),
    )
    .bind(&subscription.paystack_customer_code)
    .bind(subscription.current_period_end.as_ref().map(|t| *t.as_datetime()))
    .bind(subscription.cancel_at_period_end)
    .bind(subscription.canceled_at.as_ref().map(|t| *t.as_datetime()))
    .bind(&subscription.async_view_id)
    .bind(&subscription.async_request_id)
    .bind(subscription.status_changed_at.as_datetime())
    .bind(subscription.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| db_error("Failed to update subscription", e))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::new(
            ErrorCode::SubscriptionNotFound,
            "Subscription not found",
        ));
    }

    Ok(())
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_for_parties(
        &self,
        subscriber_id: &SubscriberId,
        creator_id: &CreatorId,
        interval: Interval,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE subscriber_id = $1 AND creator_id = $2 AND interval = $3
            "#,
            COLUMNS
        ))
        .bind(subscriber_id.as_uuid())
        .bind(creator_id.as_uuid())
        .bind(interval.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription for parties", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE stripe_subscription_id = $1",
            COLUMNS
        ))
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription by provider id", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_paystack_customer(
        &self,
        paystack_customer_code: &str,
        creator_id: &CreatorId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE paystack_customer_code = $1 AND creator_id = $2
            "#,
            COLUMNS
        ))
        .bind(paystack_customer_code)
        .bind(creator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription by customer code", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        update_subscription(&self.pool, subscription).await
    }

    async fn upsert_with_records(
        &self,
        subscription: &Subscription,
        payment: Option<&Payment>,
        activity: &Activity,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        if let Some(payment) = payment {
            insert_payment(&mut *tx, payment).await?;
        }
        upsert_subscription(&mut *tx, subscription).await?;
        insert_activity(&mut *tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit subscription upsert", e))?;

        Ok(())
    }

    async fn record_renewal(
        &self,
        subscription: &Subscription,
        payment: &Payment,
        activity: &Activity,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // The unique event-id columns surface DuplicatePayment here and
        // roll the whole renewal back.
        insert_payment(&mut *tx, payment).await?;
        update_subscription(&mut *tx, subscription).await?;
        insert_activity(&mut *tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit renewal", e))?;

        Ok(())
    }
}
