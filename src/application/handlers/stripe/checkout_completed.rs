//! Handler for `checkout.session.completed`.
//!
//! Creates or reactivates the subscription under the parties lock. For
//! one-time sessions the Payment row lands here; for recurring sessions
//! it is deferred to `invoice.paid` so the first cycle is never counted
//! twice. Sessions completing unpaid (asynchronous payment methods) get
//! their attribution deferred onto the subscription row.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::stripe::StripeCheckoutSession;
use crate::application::handlers::support::{currency, payload};
use crate::application::metadata::CheckoutMetadata;
use crate::domain::fees::{self, FeeBreakdown, FeeInput, FeeMode, FeeModel, Purpose};
use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::domain::ledger::{Activity, Payment, PaymentType};
use crate::domain::subscription::{Interval, Subscription};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{
    subscription_lock_key, with_lock, DistributedLock, LockOutcome, ProfileStore,
    SubscriptionStore, UserDirectory, LOCK_TTL,
};

pub struct CheckoutCompletedHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    profiles: Arc<dyn ProfileStore>,
    users: Arc<dyn UserDirectory>,
    lock: Arc<dyn DistributedLock>,
}

impl CheckoutCompletedHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        profiles: Arc<dyn ProfileStore>,
        users: Arc<dyn UserDirectory>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            users,
            lock,
        }
    }

    async fn purpose_for(&self, metadata: &CheckoutMetadata) -> Result<Purpose, WebhookError> {
        Ok(self
            .profiles
            .find_by_creator(&metadata.creator_id)
            .await?
            .map(|p| p.purpose)
            .unwrap_or(Purpose::Personal))
    }

    /// Recovers the creator's set price (the fee base) from the session.
    ///
    /// In absorb mode the charged total *is* the base; in pass mode the
    /// total includes the fee, so the base comes from the checkout layer's
    /// recorded metadata.
    fn fee_base(
        session: &StripeCheckoutSession,
        metadata: &CheckoutMetadata,
    ) -> Result<i64, WebhookError> {
        let amount_total = session
            .amount_total
            .ok_or(WebhookError::MissingField("amount_total"))?;
        match metadata.fee_mode {
            FeeMode::PassToSubscriber => Ok(metadata
                .net_amount_cents
                .or_else(|| metadata.service_fee_cents.map(|fee| amount_total - fee))
                .unwrap_or(amount_total)),
            FeeMode::Absorb | FeeMode::Split => Ok(amount_total),
        }
    }

    fn cross_check_fee(event_id: &str, metadata: &CheckoutMetadata, breakdown: &FeeBreakdown) {
        if let Some(quoted) = metadata.service_fee_cents {
            if quoted != breakdown.fee_cents {
                warn!(
                    event_id = %event_id,
                    quoted_fee = quoted,
                    computed_fee = breakdown.fee_cents,
                    "checkout fee differs from recomputed fee"
                );
            }
        }
    }
}

#[async_trait]
impl EventHandler for CheckoutCompletedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["checkout.session.completed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let session: StripeCheckoutSession = payload(event)?;
        let metadata = CheckoutMetadata::from_string_map(&session.metadata)?;

        let email = session
            .payer_email()
            .ok_or(WebhookError::MissingField("customer_email"))?;
        let display_name = session
            .customer_details
            .as_ref()
            .and_then(|d| d.name.as_deref());
        let subscriber_id = self.users.find_or_create_by_email(email, display_name).await?;

        let currency = currency(session.currency.as_deref())?;
        let purpose = self.purpose_for(&metadata).await?;
        let base = Self::fee_base(&session, &metadata)?;
        let model = FeeModel::from_tag(metadata.fee_model.as_deref());
        let breakdown = fees::compute(
            model,
            &FeeInput {
                amount_cents: base,
                currency: currency.clone(),
                purpose,
                mode: metadata.fee_mode,
                cross_border: metadata.cross_border,
            },
        );
        Self::cross_check_fee(&event.id, &metadata, &breakdown);

        let paid = session.payment_status == "paid";
        let occurred_at = event.occurred_at();
        let now = Timestamp::now();

        let key = subscription_lock_key(&subscriber_id, &metadata.creator_id, metadata.interval);
        let outcome = with_lock(self.lock.as_ref(), &key, LOCK_TTL, || async {
            let mut subscription = match self
                .subscriptions
                .find_for_parties(&subscriber_id, &metadata.creator_id, metadata.interval)
                .await?
            {
                Some(mut existing) => {
                    // Reactivation path: price and tier may have changed
                    // since the old row; fee mode comes from this
                    // checkout, not the stale row.
                    existing.amount_cents = base;
                    existing.currency = currency.clone();
                    existing.tier_id = metadata.tier_id.clone();
                    existing.tier_name = metadata.tier_name.clone();
                    existing.fee_model = metadata.fee_model.clone();
                    existing.fee_mode = metadata.fee_mode;
                    existing
                }
                None => {
                    let mut fresh = Subscription::from_first_charge(
                        metadata.creator_id,
                        subscriber_id,
                        base,
                        currency.clone(),
                        metadata.interval,
                        model,
                        metadata.fee_mode,
                        now,
                    );
                    fresh.tier_id = metadata.tier_id.clone();
                    fresh.tier_name = metadata.tier_name.clone();
                    fresh
                }
            };

            subscription.stripe_customer_id = session.customer.clone();
            subscription.stripe_subscription_id = session.subscription.clone();

            if !paid {
                // Asynchronous payment method: the session completed but
                // money has not moved. Park the attribution for the later
                // success event and record nothing in the ledger.
                subscription.defer_attribution(
                    metadata.view_id.clone(),
                    metadata.request_id.clone(),
                );
                let activity = Activity::new(
                    metadata.creator_id,
                    Some(subscriber_id),
                    "checkout_pending",
                    serde_json::json!({
                        "session_id": session.id,
                        "interval": metadata.interval.as_str(),
                    }),
                );
                self.subscriptions
                    .upsert_with_records(&subscription, None, &activity)
                    .await?;
                return Ok(());
            }

            subscription.apply_successful_charge(None, now);

            // One-time payments settle in this event; recurring firsts are
            // settled by the invoice.paid that follows.
            let payment = if metadata.interval == Interval::OneTime {
                let mut p = Payment::charge(
                    PaymentType::OneTime,
                    Some(subscription.id),
                    metadata.creator_id,
                    Some(subscriber_id),
                    currency.clone(),
                    &breakdown,
                    occurred_at,
                );
                p.stripe_event_id = Some(event.id.clone());
                p.stripe_payment_intent_id = session.payment_intent.clone();
                subscription.credit_ltv(p.net_cents)?;
                Some(p)
            } else {
                None
            };

            let activity = Activity::new(
                metadata.creator_id,
                Some(subscriber_id),
                "new_subscription",
                serde_json::json!({
                    "tier_name": subscription.tier_name,
                    "amount_cents": subscription.amount_cents,
                    "interval": metadata.interval.as_str(),
                    "view_id": metadata.view_id,
                    "request_id": metadata.request_id,
                }),
            );

            match self
                .subscriptions
                .upsert_with_records(&subscription, payment.as_ref(), &activity)
                .await
            {
                Err(err) if err.code == ErrorCode::DuplicatePayment => {
                    info!(event_id = %event.id, "checkout payment already recorded");
                    Ok(())
                }
                other => other.map_err(WebhookError::from),
            }
        })
        .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Ok(()),
        }
    }
}
