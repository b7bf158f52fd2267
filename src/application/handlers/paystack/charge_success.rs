//! Handler for Paystack `charge.success`.
//!
//! The single settlement event for both first charges and plan renewals;
//! money has always moved by the time it arrives, including for
//! asynchronous channels whose checkout completed earlier. Attribution
//! deferred by such a checkout is consumed here.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use crate::adapters::paystack::PaystackCharge;
use crate::application::handlers::support::{currency, payload};
use crate::application::metadata::CheckoutMetadata;
use crate::domain::fees::{self, FeeInput, FeeMode, FeeModel, Purpose};
use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::domain::ledger::{Activity, Payment, PaymentType};
use crate::domain::subscription::{Interval, Subscription};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{
    subscription_lock_key, with_lock, DistributedLock, LockOutcome, ProfileStore,
    SubscriptionStore, UserDirectory, LOCK_TTL,
};

pub struct PaystackChargeHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    profiles: Arc<dyn ProfileStore>,
    users: Arc<dyn UserDirectory>,
    lock: Arc<dyn DistributedLock>,
}

impl PaystackChargeHandler {
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
}

fn display_name(charge: &PaystackCharge) -> Option<String> {
    match (
        charge.customer.first_name.as_deref(),
        charge.customer.last_name.as_deref(),
    ) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(first), None) => Some(first.to_string()),
        (None, Some(last)) => Some(last.to_string()),
        (None, None) => None,
    }
}

#[async_trait]
impl EventHandler for PaystackChargeHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["charge.success"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let charge: PaystackCharge = payload(event)?;
        let metadata_value = charge
            .metadata_object()
            .ok_or(WebhookError::MissingMetadata("metadata"))?;
        let metadata = CheckoutMetadata::from_json(&metadata_value)?;

        let name = display_name(&charge);
        let subscriber_id = self
            .users
            .find_or_create_by_email(&charge.customer.email, name.as_deref())
            .await?;

        let currency = currency(Some(&charge.currency))?;
        let purpose = self
            .profiles
            .find_by_creator(&metadata.creator_id)
            .await?
            .map(|p| p.purpose)
            .unwrap_or(Purpose::Personal);

        // A plan on the charge marks a recurring relationship even when
        // the checkout metadata predates the plan assignment.
        let interval = if charge.plan.as_ref().is_some_and(|p| !p.is_null()) {
            Interval::Month
        } else {
            metadata.interval
        };

        let base = match metadata.fee_mode {
            FeeMode::PassToSubscriber => metadata
                .net_amount_cents
                .or_else(|| metadata.service_fee_cents.map(|fee| charge.amount - fee))
                .unwrap_or(charge.amount),
            FeeMode::Absorb | FeeMode::Split => charge.amount,
        };
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

        let occurred_at = event.occurred_at();
        let now = Timestamp::now();

        let key = subscription_lock_key(&subscriber_id, &metadata.creator_id, interval);
        let outcome = with_lock(self.lock.as_ref(), &key, LOCK_TTL, || async {
            let existing = self
                .subscriptions
                .find_for_parties(&subscriber_id, &metadata.creator_id, interval)
                .await?;
            let is_renewal = existing.is_some();

            let mut subscription = match existing {
                Some(row) => row,
                None => {
                    let mut fresh = Subscription::from_first_charge(
                        metadata.creator_id,
                        subscriber_id,
                        base,
                        currency.clone(),
                        interval,
                        model,
                        metadata.fee_mode,
                        now,
                    );
                    fresh.tier_id = metadata.tier_id.clone();
                    fresh.tier_name = metadata.tier_name.clone();
                    fresh
                }
            };

            subscription.apply_successful_charge(None, now);
            subscription.paystack_customer_code = charge.customer.customer_code.clone();
            if let Some(code) = charge
                .authorization
                .as_ref()
                .and_then(|a| a.authorization_code.clone())
            {
                subscription.paystack_authorization_code = Some(SecretString::new(code));
            }

            let payment_type = match interval {
                Interval::OneTime => PaymentType::OneTime,
                Interval::Month => PaymentType::Recurring,
            };
            let mut payment = Payment::charge(
                payment_type,
                Some(subscription.id),
                metadata.creator_id,
                Some(subscriber_id),
                currency.clone(),
                &breakdown,
                occurred_at,
            );
            payment.paystack_event_id = Some(event.id.clone());
            payment.paystack_transaction_ref = Some(charge.reference.clone());
            subscription.credit_ltv(payment.net_cents)?;

            // Attribution set during an async checkout takes precedence;
            // renewals carry none of their own.
            let (deferred_view, deferred_request) = subscription.take_deferred_attribution();
            let view_id = deferred_view.or_else(|| metadata.view_id.clone());
            let request_id = deferred_request.or_else(|| metadata.request_id.clone());

            let activity = Activity::new(
                metadata.creator_id,
                Some(subscriber_id),
                if is_renewal {
                    "subscription_renewed"
                } else {
                    "new_subscription"
                },
                serde_json::json!({
                    "reference": charge.reference,
                    "amount_cents": charge.amount,
                    "channel": charge.channel,
                    "interval": interval.as_str(),
                    "view_id": view_id,
                    "request_id": request_id,
                }),
            );

            let result = if is_renewal {
                self.subscriptions
                    .record_renewal(&subscription, &payment, &activity)
                    .await
            } else {
                self.subscriptions
                    .upsert_with_records(&subscription, Some(&payment), &activity)
                    .await
            };
            match result {
                Err(err) if err.code == ErrorCode::DuplicatePayment => {
                    info!(event_id = %event.id, "charge already recorded");
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
