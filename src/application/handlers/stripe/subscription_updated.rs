//! Handler for `customer.subscription.updated`.
//!
//! Projects the provider-reported status onto our state machine. These
//! events carry no money; a stale one (older than the last applied status
//! change) is dropped so it cannot regress a newer state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::stripe::StripeSubscription;
use crate::application::handlers::support::payload;
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::StatusProjection;
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::SubscriptionStore;

pub struct SubscriptionUpdatedHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl SubscriptionUpdatedHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self { subscriptions }
    }
}

#[async_trait]
impl EventHandler for SubscriptionUpdatedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["customer.subscription.updated"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let remote: StripeSubscription = payload(event)?;

        let Some(mut subscription) = self
            .subscriptions
            .find_by_stripe_subscription(&remote.id)
            .await?
        else {
            // Updates can race ahead of the checkout that creates the row;
            // the status will be re-reported on the next cycle.
            return Err(WebhookError::Ignored(format!(
                "no subscription for {}",
                remote.id
            )));
        };

        let now = Timestamp::now();
        match subscription.apply_provider_status(&remote.status, event.occurred_at(), now) {
            StatusProjection::IgnoredStale => {
                info!(
                    event_id = %event.id,
                    provider_status = %remote.status,
                    "stale status update dropped"
                );
                return Ok(());
            }
            StatusProjection::Applied(status) => {
                info!(event_id = %event.id, status = %status.as_str(), "subscription status applied");
            }
        }

        subscription.cancel_at_period_end = remote.cancel_at_period_end;
        subscription.current_period_end = remote.current_period_end.map(Timestamp::from_unix_secs);
        if let Some(at) = remote.canceled_at {
            subscription.canceled_at = Some(Timestamp::from_unix_secs(at));
        }
        self.subscriptions.update(&subscription).await?;
        Ok(())
    }
}
