//! Handlers for Paystack subscription lifecycle events.
//!
//! Paystack does not put a subscription handle on every event shape, so
//! lookups go through the customer code scoped to the creator embedded in
//! the plan/customer metadata where available, falling back to ignoring
//! events we cannot attribute.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::paystack::PaystackSubscription;
use crate::application::handlers::support::payload;
use crate::domain::foundation::{CreatorId, Timestamp};
use crate::domain::ledger::Activity;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, SubscriptionStore};

pub struct PaystackSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl PaystackSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        activities: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            subscriptions,
            activities,
        }
    }

    async fn find_subscription(
        &self,
        remote: &PaystackSubscription,
    ) -> Result<Subscription, WebhookError> {
        let customer_code = remote
            .customer
            .as_ref()
            .and_then(|c| c.customer_code.as_deref())
            .ok_or(WebhookError::MissingField("customer_code"))?;

        // The plan metadata carries the creator the plan belongs to.
        let creator_id = remote
            .plan
            .get("metadata")
            .and_then(|m| m.get("creator_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<CreatorId>().ok())
            .ok_or(WebhookError::MissingMetadata("creator_id"))?;

        self.subscriptions
            .find_by_paystack_customer(customer_code, &creator_id)
            .await?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(customer_code.to_string()))
    }
}

#[async_trait]
impl EventHandler for PaystackSubscriptionHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &[
            "subscription.disable",
            "subscription.not_renew",
            "invoice.payment_failed",
        ]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let remote: PaystackSubscription = payload(event)?;
        let mut subscription = self.find_subscription(&remote).await?;
        let now = Timestamp::now();

        match event.event_type.as_str() {
            "subscription.disable" => {
                subscription.cancel(now);
                self.subscriptions.update(&subscription).await?;
                let activity = Activity::new(
                    subscription.creator_id,
                    Some(subscription.subscriber_id),
                    "subscription_canceled",
                    serde_json::json!({
                        "subscription_code": remote.subscription_code,
                        "interval": subscription.interval.as_str(),
                    }),
                );
                self.activities.record(&activity).await?;
            }
            "subscription.not_renew" => {
                // The subscriber turned off renewal; the period runs out
                // on its own.
                subscription.cancel_at_period_end = true;
                subscription.updated_at = now;
                self.subscriptions.update(&subscription).await?;
            }
            "invoice.payment_failed" => match subscription.status {
                SubscriptionStatus::Canceled => {
                    info!(event_id = %event.id, "payment failure for a canceled subscription, ignoring");
                    return Err(WebhookError::Ignored("subscription already canceled".into()));
                }
                SubscriptionStatus::PastDue => {}
                _ => {
                    subscription.mark_past_due(now)?;
                    self.subscriptions.update(&subscription).await?;
                    let activity = Activity::new(
                        subscription.creator_id,
                        Some(subscription.subscriber_id),
                        "payment_failed",
                        serde_json::json!({
                            "subscription_code": remote.subscription_code,
                        }),
                    );
                    self.activities.record(&activity).await?;
                }
            },
            other => return Err(WebhookError::Ignored(format!("unexpected type {}", other))),
        }
        Ok(())
    }
}
