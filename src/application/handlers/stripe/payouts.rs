//! Handlers for `payout.paid` / `payout.failed`.
//!
//! Settlement webhooks reconcile against the payout row created at
//! initiation. The match is on the stored transfer reference plus an
//! exact amount and currency check; any disagreement parks the row as
//! disputed and forces a retryable failure so a human looks at it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::adapters::stripe::StripePayout;
use crate::application::handlers::support::payload;
use crate::domain::foundation::CurrencyCode;
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{
    payout_lock_key, with_lock, ActivityLog, DistributedLock, LockOutcome, PaymentStore, LOCK_TTL,
};

pub struct PayoutSettlementHandler {
    payments: Arc<dyn PaymentStore>,
    activities: Arc<dyn ActivityLog>,
    lock: Arc<dyn DistributedLock>,
}

impl PayoutSettlementHandler {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        activities: Arc<dyn ActivityLog>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            payments,
            activities,
            lock,
        }
    }
}

/// Verifies the webhook-reported amount/currency against the stored row.
/// On mismatch the row is parked as disputed and the delivery fails; the
/// discrepancy is never auto-corrected.
pub(crate) async fn reconcile_payout(
    payments: &dyn PaymentStore,
    activities: &dyn ActivityLog,
    event: &ProviderEvent,
    row: &mut Payment,
    reported_amount_cents: i64,
    reported_currency: &str,
) -> Result<(), WebhookError> {
    let currency_matches = CurrencyCode::parse(reported_currency)
        .map(|c| c == row.currency)
        .unwrap_or(false);
    if row.amount_cents != reported_amount_cents || !currency_matches {
        error!(
            event_id = %event.id,
            stored_cents = row.amount_cents,
            reported_cents = reported_amount_cents,
            stored_currency = %row.currency,
            reported_currency = %reported_currency,
            "payout settlement does not match the stored row"
        );
        if row.status != PaymentStatus::Disputed {
            row.transition_to(PaymentStatus::Disputed)?;
            payments.update(row).await?;
        }
        let activity = Activity::new(
            row.creator_id,
            None,
            "payout_mismatch",
            serde_json::json!({
                "payment_id": row.id.to_string(),
                "stored_cents": row.amount_cents,
                "reported_cents": reported_amount_cents,
                "reported_currency": reported_currency,
            }),
        );
        activities.record(&activity).await?;
        return Err(WebhookError::PayoutMismatch(format!(
            "stored {} {} vs reported {} {}",
            row.amount_cents, row.currency, reported_amount_cents, reported_currency
        )));
    }
    Ok(())
}

#[async_trait]
impl EventHandler for PayoutSettlementHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["payout.paid", "payout.failed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let payout: StripePayout = payload(event)?;

        let key = payout_lock_key(&payout.id);
        let outcome = with_lock(self.lock.as_ref(), &key, LOCK_TTL, || async {
            let mut row = self
                .payments
                .find_payout_by_reference(&payout.id)
                .await?
                .ok_or_else(|| WebhookError::PaymentNotFound(payout.id.clone()))?;

            reconcile_payout(
                self.payments.as_ref(),
                self.activities.as_ref(),
                event,
                &mut row,
                payout.amount,
                &payout.currency,
            )
            .await?;

            let target = match event.event_type.as_str() {
                "payout.paid" => PaymentStatus::Succeeded,
                _ => PaymentStatus::Failed,
            };
            if row.status == target {
                info!(event_id = %event.id, "payout already settled");
                return Ok(());
            }
            row.transition_to(target)?;
            self.payments.update(&row).await?;

            if target == PaymentStatus::Failed {
                let activity = Activity::new(
                    row.creator_id,
                    None,
                    "payout_failed",
                    serde_json::json!({
                        "payout_id": payout.id,
                        "amount_cents": payout.amount,
                        "failure_code": payout.failure_code,
                    }),
                );
                self.activities.record(&activity).await?;
            }
            Ok(())
        })
        .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Ok(()),
        }
    }
}
