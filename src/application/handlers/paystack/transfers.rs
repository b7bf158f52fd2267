//! Handlers for Paystack `transfer.success` / `transfer.failed` /
//! `transfer.reversed`.
//!
//! Same reconciliation contract as the Stripe payout handler: match on
//! the stored transfer reference, verify amount and currency exactly,
//! park mismatches as disputed. A reversal of an already-settled payout
//! becomes a refunded row; a reversal before settlement is a failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::paystack::PaystackTransfer;
use crate::application::handlers::stripe::reconcile_payout;
use crate::application::handlers::support::payload;
use crate::domain::ledger::{Activity, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{
    payout_lock_key, with_lock, ActivityLog, DistributedLock, LockOutcome, PaymentStore, LOCK_TTL,
};

pub struct PaystackTransferHandler {
    payments: Arc<dyn PaymentStore>,
    activities: Arc<dyn ActivityLog>,
    lock: Arc<dyn DistributedLock>,
}

impl PaystackTransferHandler {
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

#[async_trait]
impl EventHandler for PaystackTransferHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["transfer.success", "transfer.failed", "transfer.reversed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let transfer: PaystackTransfer = payload(event)?;
        let reference = transfer
            .reference
            .as_deref()
            .or(transfer.transfer_code.as_deref())
            .ok_or(WebhookError::MissingField("reference"))?;

        let key = payout_lock_key(reference);
        let outcome = with_lock(self.lock.as_ref(), &key, LOCK_TTL, || async {
            let mut row = self
                .payments
                .find_payout_by_reference(reference)
                .await?
                .ok_or_else(|| WebhookError::PaymentNotFound(reference.to_string()))?;

            reconcile_payout(
                self.payments.as_ref(),
                self.activities.as_ref(),
                event,
                &mut row,
                transfer.amount,
                &transfer.currency,
            )
            .await?;

            let target = match event.event_type.as_str() {
                "transfer.success" => PaymentStatus::Succeeded,
                "transfer.reversed" if row.status == PaymentStatus::Succeeded => {
                    PaymentStatus::Refunded
                }
                _ => PaymentStatus::Failed,
            };
            if row.status == target {
                info!(event_id = %event.id, "transfer already settled");
                return Ok(());
            }
            row.transition_to(target)?;
            self.payments.update(&row).await?;

            if target != PaymentStatus::Succeeded {
                let activity = Activity::new(
                    row.creator_id,
                    None,
                    if target == PaymentStatus::Refunded {
                        "payout_reversed"
                    } else {
                        "payout_failed"
                    },
                    serde_json::json!({
                        "reference": reference,
                        "transfer_code": transfer.transfer_code,
                        "amount_cents": transfer.amount,
                        "reason": transfer.reason,
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
