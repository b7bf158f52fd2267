//! Handlers for `charge.dispute.created` / `charge.dispute.closed`.
//!
//! A new dispute writes a held-funds reversal row and debits LTV
//! immediately; funds are gone from the creator's balance the moment the
//! provider pulls them. Closure resolves the held row to won or lost,
//! crediting the money back on a win.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::stripe::StripeDispute;
use crate::application::handlers::support::payload;
use crate::domain::foundation::ErrorCode;
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, PaymentStore, SubscriptionStore};

pub struct DisputeHandler {
    payments: Arc<dyn PaymentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl DisputeHandler {
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

    async fn adjust_ltv(
        &self,
        payment: &Payment,
        delta_net_cents: i64,
    ) -> Result<(), WebhookError> {
        let Some(subscription_id) = payment.subscription_id else {
            return Ok(());
        };
        let Some(mut subscription) = self.subscriptions.find_by_id(&subscription_id).await? else {
            return Ok(());
        };
        if delta_net_cents >= 0 {
            subscription.credit_ltv(delta_net_cents)?;
        } else {
            subscription.debit_ltv(-delta_net_cents);
        }
        self.subscriptions.update(&subscription).await?;
        Ok(())
    }

    async fn dispute_created(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let dispute: StripeDispute = payload(event)?;

        let mut original = self
            .payments
            .find_by_stripe_charge(&dispute.charge)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(dispute.charge.clone()))?;

        let mut hold = Payment::dispute_hold(
            &original,
            dispute.amount,
            Some(dispute.id.clone()),
            event.occurred_at(),
        )?;
        hold.stripe_event_id = Some(event.id.clone());

        match self.payments.insert(&hold).await {
            Err(err) if err.code == ErrorCode::DuplicatePayment => {
                info!(event_id = %event.id, "dispute hold already recorded");
                return Ok(());
            }
            other => other?,
        }

        self.adjust_ltv(&hold, hold.net_cents).await?;

        if original.status == PaymentStatus::Succeeded {
            original.transition_to(PaymentStatus::Disputed)?;
            self.payments.update(&original).await?;
        }

        let activity = Activity::new(
            original.creator_id,
            original.subscriber_id,
            "payment_disputed",
            serde_json::json!({
                "dispute_id": dispute.id,
                "charge_id": dispute.charge,
                "amount_cents": dispute.amount,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }

    async fn dispute_closed(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let dispute: StripeDispute = payload(event)?;

        let won = match dispute.status.as_str() {
            "won" => true,
            "lost" => false,
            other => {
                return Err(WebhookError::Ignored(format!(
                    "dispute closed with non-final status {}",
                    other
                )))
            }
        };

        let original = self
            .payments
            .find_by_stripe_charge(&dispute.charge)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(dispute.charge.clone()))?;

        let mut hold = self
            .payments
            .find_open_dispute(&original.creator_id, Some(&dispute.id), dispute.amount)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(dispute.id.clone()))?;

        if won {
            hold.transition_to(PaymentStatus::DisputeWon)?;
            // The provider returns the held funds; put the net back.
            self.adjust_ltv(&hold, -hold.net_cents).await?;
        } else {
            hold.transition_to(PaymentStatus::DisputeLost)?;
        }
        self.payments.update(&hold).await?;

        let activity = Activity::new(
            original.creator_id,
            original.subscriber_id,
            "dispute_resolved",
            serde_json::json!({
                "dispute_id": dispute.id,
                "charge_id": dispute.charge,
                "outcome": if won { "won" } else { "lost" },
                "amount_cents": dispute.amount,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for DisputeHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["charge.dispute.created", "charge.dispute.closed"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        match event.event_type.as_str() {
            "charge.dispute.created" => self.dispute_created(event).await,
            "charge.dispute.closed" => self.dispute_closed(event).await,
            other => Err(WebhookError::Ignored(format!("unexpected type {}", other))),
        }
    }
}
