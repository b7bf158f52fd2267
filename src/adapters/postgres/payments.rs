//! PostgreSQL payment ledger store.
//!
//! The provider event-id columns carry unique indexes; a violation on
//! either maps to `DuplicatePayment` so handlers treat redelivery as a
//! no-op instead of a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CreatorId, CurrencyCode, DomainError, ErrorCode, PaymentId, SubscriberId, SubscriptionId,
    Timestamp,
};
use crate::domain::ledger::{Payment, PaymentStatus, PaymentType};
use crate::ports::PaymentStore;

const COLUMNS: &str = r#"
    id, subscription_id, creator_id, subscriber_id, payment_type, status,
    amount_cents, gross_cents, fee_cents, net_cents, currency,
    fee_model, fee_effective_rate_bps, fee_was_capped,
    stripe_event_id, stripe_charge_id, stripe_payment_intent_id, stripe_dispute_id,
    paystack_event_id, paystack_transaction_ref, paystack_transfer_code,
    transfer_reference, occurred_at, created_at
"#;

pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Option<Uuid>,
    creator_id: Uuid,
    subscriber_id: Option<Uuid>,
    payment_type: String,
    status: String,
    amount_cents: i64,
    gross_cents: Option<i64>,
    fee_cents: i64,
    net_cents: i64,
    currency: String,
    fee_model: Option<String>,
    fee_effective_rate_bps: Option<i64>,
    fee_was_capped: bool,
    stripe_event_id: Option<String>,
    stripe_charge_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    stripe_dispute_id: Option<String>,
    paystack_event_id: Option<String>,
    paystack_transaction_ref: Option<String>,
    paystack_transfer_code: Option<String>,
    transfer_reference: Option<String>,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::parse(&row.currency).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency: {}", e))
        })?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            creator_id: CreatorId::from_uuid(row.creator_id),
            subscriber_id: row.subscriber_id.map(SubscriberId::from_uuid),
            payment_type: PaymentType::from_tag(&row.payment_type),
            status: PaymentStatus::from_tag(&row.status),
            amount_cents: row.amount_cents,
            gross_cents: row.gross_cents,
            fee_cents: row.fee_cents,
            net_cents: row.net_cents,
            currency,
            fee_model: row.fee_model,
            fee_effective_rate_bps: row.fee_effective_rate_bps,
            fee_was_capped: row.fee_was_capped,
            stripe_event_id: row.stripe_event_id,
            stripe_charge_id: row.stripe_charge_id,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            stripe_dispute_id: row.stripe_dispute_id,
            paystack_event_id: row.paystack_event_id,
            paystack_transaction_ref: row.paystack_transaction_ref,
            paystack_transfer_code: row.paystack_transfer_code,
            transfer_reference: row.transfer_reference,
            occurred_at: Timestamp::from_datetime(row.occurred_at),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Maps a unique-index violation on either event-id column to
/// `DuplicatePayment`.
pub(crate) fn map_insert_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DomainError::new(
                ErrorCode::DuplicatePayment,
                "Payment for this provider event already recorded",
            );
        }
    }
    db_error("Failed to insert payment", err)
}

/// Shared insert so the transactional subscription-store methods reuse the
/// exact same statement and error mapping.
pub(crate) async fn insert_payment<'e, E>(executor: E, payment: &Payment) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, subscription_id, creator_id, subscriber_id, payment_type, status,
            amount_cents, gross_cents, fee_cents, net_cents, currency,
            fee_model, fee_effective_rate_bps, fee_was_capped,
            stripe_event_id, stripe_charge_id, stripe_payment_intent_id, stripe_dispute_id,
            paystack_event_id, paystack_transaction_ref, paystack_transfer_code,
            transfer_reference, occurred_at, created_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
        )
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.subscription_id.as_ref().map(|id| *id.as_uuid()))
    .bind(payment.creator_id.as_uuid())
    .bind(payment.subscriber_id.as_ref().map(|id| *id.as_uuid()))
    .bind(payment.payment_type.as_str())
    .bind(payment.status.as_str())
    .bind(payment.amount_cents)
    .bind(payment.gross_cents)
    .bind(payment.fee_cents)
    .bind(payment.net_cents)
    .bind(payment.currency.as_str())
    .bind(&payment.fee_model)
    .bind(payment.fee_effective_rate_bps)
    .bind(payment.fee_was_capped)
    .bind(&payment.stripe_event_id)
    .bind(&payment.stripe_charge_id)
    .bind(&payment.stripe_payment_intent_id)
    .bind(&payment.stripe_dispute_id)
    .bind(&payment.paystack_event_id)
    .bind(&payment.paystack_transaction_ref)
    .bind(&payment.paystack_transfer_code)
    .bind(&payment.transfer_reference)
    .bind(payment.occurred_at.as_datetime())
    .bind(payment.created_at.as_datetime())
    .execute(executor)
    .await
    .map_err(map_insert_error)?;

    Ok(())
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        insert_payment(&self.pool, payment).await
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = $2, stripe_dispute_id = $3
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.stripe_dispute_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update payment", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "Payment not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {} FROM payments WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_provider_event(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE stripe_event_id = $1 OR paystack_event_id = $1",
            COLUMNS
        ))
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment by event", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_stripe_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payments
            WHERE stripe_charge_id = $1 AND payment_type IN ('one_time', 'recurring')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            COLUMNS
        ))
        .bind(stripe_charge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment by charge", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_paystack_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payments
            WHERE paystack_transaction_ref = $1 AND payment_type IN ('one_time', 'recurring')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            COLUMNS
        ))
        .bind(transaction_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment by reference", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn refunded_total_for_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<i64, DomainError> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(-amount_cents) FROM payments
            WHERE stripe_charge_id = $1 AND payment_type = 'refund'
            "#,
        )
        .bind(stripe_charge_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum refunds for charge", e))?;

        Ok(total.unwrap_or(0))
    }

    async fn refunded_total_for_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<i64, DomainError> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(-amount_cents) FROM payments
            WHERE paystack_transaction_ref = $1 AND payment_type = 'refund'
            "#,
        )
        .bind(transaction_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum refunds for reference", e))?;

        Ok(total.unwrap_or(0))
    }

    async fn find_payout_by_reference(
        &self,
        transfer_reference: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payments
            WHERE transfer_reference = $1 AND payment_type = 'payout'
            "#,
            COLUMNS
        ))
        .bind(transfer_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payout", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_open_dispute(
        &self,
        creator_id: &CreatorId,
        dispute_id: Option<&str>,
        amount_cents: i64,
    ) -> Result<Option<Payment>, DomainError> {
        if let Some(dispute_id) = dispute_id {
            let row: Option<PaymentRow> = sqlx::query_as(&format!(
                r#"
                SELECT {} FROM payments
                WHERE creator_id = $1 AND payment_type = 'dispute'
                  AND status = 'disputed' AND stripe_dispute_id = $2
                "#,
                COLUMNS
            ))
            .bind(creator_id.as_uuid())
            .bind(dispute_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find dispute by id", e))?;

            if let Some(row) = row {
                return Ok(Some(Payment::try_from(row)?));
            }
        }

        // Legacy rows without a dispute id: oldest open hold matching the
        // disputed amount.
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payments
            WHERE creator_id = $1 AND payment_type = 'dispute'
              AND status = 'disputed' AND amount_cents = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            COLUMNS
        ))
        .bind(creator_id.as_uuid())
        .bind(-amount_cents.abs())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find dispute by amount", e))?;

        row.map(Payment::try_from).transpose()
    }
}
