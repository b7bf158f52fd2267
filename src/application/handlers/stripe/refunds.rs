//! Handler for `charge.refunded`.
//!
//! Stripe reports the cumulative `amount_refunded` on the charge, so the
//! new reversal is the delta against what the ledger already holds for
//! that charge. A redelivery computes a zero delta and becomes a no-op
//! without ever touching the event-id constraint.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::stripe::StripeCharge;
use crate::application::handlers::support::payload;
use crate::domain::foundation::ErrorCode;
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, PaymentStore, SubscriptionStore};

pub struct ChargeRefundedHandler {
    payments: Arc<dyn PaymentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl ChargeRefundedHandler {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        activities: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            payments,
            subscriptions,
            activities,
        }
    }
}

#[async_trait]
impl EventHandler for ChargeRefundedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["charge.refunded"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let charge: StripeCharge = payload(event)?;

        let mut original = self
            .payments
            .find_by_stripe_charge(&charge.id)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(charge.id.clone()))?;

        let already_refunded = self.payments.refunded_total_for_charge(&charge.id).await?;
        let delta = charge.amount_refunded - already_refunded;
        if delta <= 0 {
            return Err(WebhookError::Ignored(format!(
                "refund total {} already ledgered for {}",
                already_refunded, charge.id
            )));
        }

        let mut refund = Payment::refund_of(&original, delta, event.occurred_at())?;
        refund.stripe_event_id = Some(event.id.clone());

        match self.payments.insert(&refund).await {
            Err(err) if err.code == ErrorCode::DuplicatePayment => {
                info!(event_id = %event.id, "refund already recorded");
                return Ok(());
            }
            other => other?,
        }

        // Reverse the creator's earnings by the refunded net, never the
        // gross. refund rows carry negative amounts.
        if let Some(subscription_id) = original.subscription_id {
            if let Some(mut subscription) =
                self.subscriptions.find_by_id(&subscription_id).await?
            {
                subscription.debit_ltv(-refund.net_cents);
                self.subscriptions.update(&subscription).await?;
            }
        }

        if charge.amount_refunded >= original.amount_cents {
            original.transition_to(PaymentStatus::Refunded)?;
            self.payments.update(&original).await?;
        }

        let activity = Activity::new(
            original.creator_id,
            original.subscriber_id,
            "payment_refunded",
            serde_json::json!({
                "charge_id": charge.id,
                "refunded_cents": delta,
                "net_reversed_cents": -refund.net_cents,
                "full_refund": charge.amount_refunded >= original.amount_cents,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}
