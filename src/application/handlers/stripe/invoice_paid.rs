//! Handler for `invoice.paid` / `invoice.payment_succeeded`.
//!
//! Records the ledger row for a billing-cycle charge, advances the
//! subscription period, and credits creator LTV. The invoice lock plus
//! the unique event-id column make replays and the paid/succeeded double
//! delivery converge on exactly one Payment.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::stripe::StripeInvoice;
use crate::application::handlers::support::{currency, payload};
use crate::application::DEBIT_RECOVERY_CAP_CENTS;
use crate::domain::fees::{self, FeeInput, Purpose};
use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::domain::ledger::{Activity, Payment, PaymentType};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{
    invoice_lock_key, with_lock, DistributedLock, LockOutcome, PaymentStore, ProfileStore,
    SubscriptionStore, LOCK_TTL,
};

pub struct InvoicePaidHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    payments: Arc<dyn PaymentStore>,
    profiles: Arc<dyn ProfileStore>,
    activities: Arc<dyn crate::ports::ActivityLog>,
    lock: Arc<dyn DistributedLock>,
}

impl InvoicePaidHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        payments: Arc<dyn PaymentStore>,
        profiles: Arc<dyn ProfileStore>,
        activities: Arc<dyn crate::ports::ActivityLog>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            subscriptions,
            payments,
            profiles,
            activities,
            lock,
        }
    }

    /// Claws back part of an outstanding platform debit after a settled
    /// renewal. Best-effort: a failure here is recorded as an activity and
    /// never fails the webhook, the ledger row has already landed.
    async fn recover_platform_debit(&self, event: &ProviderEvent, payment: &Payment) {
        let profile = match self.profiles.find_by_creator(&payment.creator_id).await {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "debit recovery profile lookup failed");
                return;
            }
        };
        if profile.purpose != Purpose::Service
            || profile.platform_debit_cents <= 0
            || profile.saved_payment_method.is_none()
        {
            return;
        }

        let attempt = profile.platform_debit_cents.min(DEBIT_RECOVERY_CAP_CENTS);
        match self
            .profiles
            .decrement_platform_debit(&payment.creator_id, attempt)
            .await
        {
            Ok(recovered) if recovered > 0 => {
                let activity = Activity::new(
                    payment.creator_id,
                    payment.subscriber_id,
                    "platform_debit_recovered",
                    serde_json::json!({
                        "recovered_cents": recovered,
                        "payment_id": payment.id.to_string(),
                    }),
                );
                if let Err(err) = self.activities.record(&activity).await {
                    warn!(event_id = %event.id, error = %err, "debit recovery activity failed");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "debit recovery failed");
                let activity = Activity::side_effect_failure(
                    payment.creator_id,
                    "debit_recovery_failed",
                    &err.to_string(),
                    serde_json::json!({ "payment_id": payment.id.to_string() }),
                );
                if let Err(err) = self.activities.record(&activity).await {
                    warn!(event_id = %event.id, error = %err, "debit recovery activity failed");
                }
            }
        }
    }
}

#[async_trait]
impl EventHandler for InvoicePaidHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["invoice.paid", "invoice.payment_succeeded"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let invoice: StripeInvoice = payload(event)?;
        let subscription_id = invoice
            .subscription
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription"))?;

        let key = invoice_lock_key(&invoice.id);
        let outcome = with_lock(self.lock.as_ref(), &key, LOCK_TTL, || async {
            // paid and payment_succeeded arrive for the same invoice under
            // distinct event ids, so dedupe on both the event id and the
            // underlying charge. The first one to land wins.
            if self
                .payments
                .find_by_provider_event(&event.id)
                .await?
                .is_some()
            {
                info!(event_id = %event.id, "invoice payment already recorded");
                return Ok(());
            }
            if let Some(charge_id) = invoice.charge.as_deref() {
                if self
                    .payments
                    .find_by_stripe_charge(charge_id)
                    .await?
                    .is_some()
                {
                    info!(event_id = %event.id, charge_id, "invoice charge already recorded");
                    return Ok(());
                }
            }

            let mut subscription = self
                .subscriptions
                .find_by_stripe_subscription(subscription_id)
                .await?
                .ok_or_else(|| {
                    WebhookError::SubscriptionNotFound(subscription_id.to_string())
                })?;

            let currency = currency(invoice.currency.as_deref())
                .unwrap_or_else(|_| subscription.currency.clone());
            let purpose = self
                .profiles
                .find_by_creator(&subscription.creator_id)
                .await?
                .map(|p| p.purpose)
                .unwrap_or(Purpose::Personal);

            // Recompute under the subscription's locked-in model, then
            // reconcile with what the provider actually assessed. On
            // disagreement the provider's figure wins: the ledger mirrors
            // money that moved, not what the engine thinks should have.
            let expected = fees::compute(
                subscription.fee_model(),
                &FeeInput {
                    amount_cents: subscription.amount_cents,
                    currency: currency.clone(),
                    purpose,
                    mode: subscription.fee_mode,
                    cross_border: false,
                },
            );
            let gross = invoice.amount_paid;
            let fee = invoice.application_fee_amount.unwrap_or(expected.fee_cents);
            if fee != expected.fee_cents {
                warn!(
                    event_id = %event.id,
                    assessed_fee = fee,
                    expected_fee = expected.fee_cents,
                    "provider fee differs from recomputed fee"
                );
            }
            let net = gross - fee;

            let mut payment = Payment::charge(
                PaymentType::Recurring,
                Some(subscription.id),
                subscription.creator_id,
                Some(subscription.subscriber_id),
                currency,
                &expected,
                event.occurred_at(),
            );
            payment.amount_cents = gross - expected.subscriber_fee_cents;
            payment.gross_cents = Some(gross);
            payment.fee_cents = fee;
            payment.net_cents = net;
            payment.stripe_event_id = Some(event.id.clone());
            payment.stripe_charge_id = invoice.charge.clone();

            let now = Timestamp::now();
            subscription
                .apply_successful_charge(invoice.period_end.map(Timestamp::from_unix_secs), now);
            subscription.credit_ltv(net)?;
            let (view_id, request_id) = subscription.take_deferred_attribution();

            let activity = Activity::new(
                subscription.creator_id,
                Some(subscription.subscriber_id),
                "subscription_renewed",
                serde_json::json!({
                    "invoice_id": invoice.id,
                    "amount_cents": gross,
                    "net_cents": net,
                    "billing_reason": invoice.billing_reason,
                    "view_id": view_id,
                    "request_id": request_id,
                }),
            );

            match self
                .subscriptions
                .record_renewal(&subscription, &payment, &activity)
                .await
            {
                Err(err) if err.code == ErrorCode::DuplicatePayment => {
                    info!(event_id = %event.id, "invoice payment already recorded");
                    return Ok(());
                }
                Err(err) => return Err(WebhookError::from(err)),
                Ok(()) => {}
            }

            self.recover_platform_debit(event, &payment).await;
            Ok(())
        })
        .await?;

        match outcome {
            LockOutcome::Completed(result) => result,
            LockOutcome::Busy => Ok(()),
        }
    }
}
