//! Handler for `customer.subscription.deleted`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::stripe::StripeSubscription;
use crate::application::handlers::support::payload;
use crate::domain::foundation::Timestamp;
use crate::domain::ledger::Activity;
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, SubscriptionStore};

pub struct SubscriptionDeletedHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl SubscriptionDeletedHandler {
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
impl EventHandler for SubscriptionDeletedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["customer.subscription.deleted"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let remote: StripeSubscription = payload(event)?;

        let Some(mut subscription) = self
            .subscriptions
            .find_by_stripe_subscription(&remote.id)
            .await?
        else {
            return Err(WebhookError::Ignored(format!(
                "no subscription for {}",
                remote.id
            )));
        };

        // cancel() is idempotent, so a redelivery just rewrites the row.
        subscription.cancel(Timestamp::now());
        self.subscriptions.update(&subscription).await?;

        let activity = Activity::new(
            subscription.creator_id,
            Some(subscription.subscriber_id),
            "subscription_canceled",
            serde_json::json!({
                "stripe_subscription_id": remote.id,
                "interval": subscription.interval.as_str(),
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}
