//! Handler for Paystack `refund.processed`.
//!
//! Paystack reports each refund's own amount rather than a cumulative
//! total, but refunds can be split and redelivered, so the ledgered total
//! is still consulted and only the uncovered remainder is reversed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::paystack::PaystackRefund;
use crate::application::handlers::support::payload;
use crate::domain::foundation::ErrorCode;
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, PaymentStore, SubscriptionStore};

pub struct PaystackRefundHandler {
    payments: Arc<dyn PaymentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl PaystackRefundHandler {
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
impl EventHandler for PaystackRefundHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["refund.processed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let refund_event: PaystackRefund = payload(event)?;
        let reference = refund_event
            .transaction_reference
            .as_deref()
            .ok_or(WebhookError::MissingField("transaction_reference"))?;

        let mut original = self
            .payments
            .find_by_paystack_reference(reference)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(reference.to_string()))?;

        let already_refunded = self
            .payments
            .refunded_total_for_reference(reference)
            .await?;
        let remaining = original.amount_cents - already_refunded;
        let delta = refund_event.amount.min(remaining);
        if delta <= 0 {
            return Err(WebhookError::Ignored(format!(
                "refund total {} already ledgered for {}",
                already_refunded, reference
            )));
        }

        let mut refund = Payment::refund_of(&original, delta, event.occurred_at())?;
        refund.paystack_event_id = Some(event.id.clone());

        match self.payments.insert(&refund).await {
            Err(err) if err.code == ErrorCode::DuplicatePayment => {
                info!(event_id = %event.id, "refund already recorded");
                return Ok(());
            }
            other => other?,
        }

        if let Some(subscription_id) = original.subscription_id {
            if let Some(mut subscription) =
                self.subscriptions.find_by_id(&subscription_id).await?
            {
                subscription.debit_ltv(-refund.net_cents);
                self.subscriptions.update(&subscription).await?;
            }
        }

        let fully_refunded = already_refunded + delta >= original.amount_cents;
        if fully_refunded && original.status == PaymentStatus::Succeeded {
            original.transition_to(PaymentStatus::Refunded)?;
            self.payments.update(&original).await?;
        }

        let activity = Activity::new(
            original.creator_id,
            original.subscriber_id,
            "payment_refunded",
            serde_json::json!({
                "reference": reference,
                "refunded_cents": delta,
                "net_reversed_cents": -refund.net_cents,
                "full_refund": fully_refunded,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}
