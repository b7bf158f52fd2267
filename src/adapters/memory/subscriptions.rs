//! In-memory subscription store.
//!
//! Composes the in-memory payment store and activity log so the
//! multi-row write methods keep their all-or-nothing contract: the
//! payment insert runs first and a `DuplicatePayment` hit aborts before
//! any subscription row changes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CreatorId, DomainError, ErrorCode, SubscriberId, SubscriptionId};
use crate::domain::ledger::{Activity, Payment};
use crate::domain::subscription::{Interval, Subscription};
use crate::ports::{ActivityLog, PaymentStore, SubscriptionStore};

use super::{InMemoryActivityLog, InMemoryPaymentStore};

pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    payments: Arc<InMemoryPaymentStore>,
    activities: Arc<InMemoryActivityLog>,
}

impl InMemorySubscriptionStore {
    pub fn new(payments: Arc<InMemoryPaymentStore>, activities: Arc<InMemoryActivityLog>) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            payments,
            activities,
        }
    }

    pub async fn seed(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription);
    }

    async fn parties_row_id(
        &self,
        subscriber_id: &SubscriberId,
        creator_id: &CreatorId,
        interval: Interval,
    ) -> Option<SubscriptionId> {
        self.subscriptions
            .read()
            .await
            .values()
            .find(|s| {
                &s.subscriber_id == subscriber_id
                    && &s.creator_id == creator_id
                    && s.interval == interval
            })
            .map(|s| s.id)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_for_parties(
        &self,
        subscriber_id: &SubscriberId,
        creator_id: &CreatorId,
        interval: Interval,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| {
                &s.subscriber_id == subscriber_id
                    && &s.creator_id == creator_id
                    && s.interval == interval
            })
            .cloned())
    }

    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .cloned())
    }

    async fn find_by_paystack_customer(
        &self,
        paystack_customer_code: &str,
        creator_id: &CreatorId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| {
                s.paystack_customer_code.as_deref() == Some(paystack_customer_code)
                    && &s.creator_id == creator_id
            })
            .cloned())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        if !subscriptions.contains_key(&subscription.id) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("subscription {} not found", subscription.id),
            ));
        }
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn upsert_with_records(
        &self,
        subscription: &Subscription,
        payment: Option<&Payment>,
        activity: &Activity,
    ) -> Result<(), DomainError> {
        if let Some(payment) = payment {
            self.payments.insert(payment).await?;
        }

        // Upsert on the parties key: a re-subscription replaces the
        // existing row rather than growing a second one.
        let existing = self
            .parties_row_id(
                &subscription.subscriber_id,
                &subscription.creator_id,
                subscription.interval,
            )
            .await;
        let mut subscriptions = self.subscriptions.write().await;
        if let Some(old_id) = existing {
            if old_id != subscription.id {
                subscriptions.remove(&old_id);
            }
        }
        subscriptions.insert(subscription.id, subscription.clone());
        drop(subscriptions);

        self.activities.record(activity).await
    }

    async fn record_renewal(
        &self,
        subscription: &Subscription,
        payment: &Payment,
        activity: &Activity,
    ) -> Result<(), DomainError> {
        // Duplicate event id aborts before any subscription mutation.
        self.payments.insert(payment).await?;
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription.clone());
        self.activities.record(activity).await
    }
}
