//! Handler for `invoice.payment_failed`.
//!
//! Marks the subscription past due. No ledger row: nothing settled. The
//! provider keeps retrying the charge on its own schedule, and a later
//! `invoice.paid` pulls the subscription back to active.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::stripe::StripeInvoice;
use crate::application::handlers::support::payload;
use crate::domain::foundation::Timestamp;
use crate::domain::ledger::Activity;
use crate::domain::subscription::SubscriptionStatus;
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, SubscriptionStore};

pub struct InvoiceFailedHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl InvoiceFailedHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        activities: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            subscriptions,
            activities,
        }
    }
}

#[async_trait]
impl EventHandler for InvoiceFailedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["invoice.payment_failed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let invoice: StripeInvoice = payload(event)?;
        let subscription_id = invoice
            .subscription
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription"))?;

        let mut subscription = self
            .subscriptions
            .find_by_stripe_subscription(subscription_id)
            .await?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(subscription_id.to_string()))?;

        match subscription.status {
            // Straggler after cancellation; nothing to dun.
            SubscriptionStatus::Canceled => {
                info!(event_id = %event.id, "payment failure for a canceled subscription, ignoring");
                return Err(WebhookError::Ignored("subscription already canceled".into()));
            }
            // Retry cycles deliver one failure event per attempt; the row
            // is already where it should be.
            SubscriptionStatus::PastDue => {}
            _ => {
                subscription.mark_past_due(Timestamp::now())?;
                self.subscriptions.update(&subscription).await?;
            }
        }

        let activity = Activity::new(
            subscription.creator_id,
            Some(subscription.subscriber_id),
            "payment_failed",
            serde_json::json!({
                "invoice_id": invoice.id,
                "amount_cents": invoice.amount_due,
                "attempt_count": invoice.attempt_count,
                "next_payment_attempt": invoice.next_payment_attempt,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}
