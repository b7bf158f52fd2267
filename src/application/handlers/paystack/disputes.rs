//! Handlers for Paystack `charge.dispute.create` / `charge.dispute.resolve`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::paystack::PaystackDispute;
use crate::application::handlers::support::payload;
use crate::domain::foundation::ErrorCode;
use crate::domain::ledger::{Activity, Payment, PaymentStatus};
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{ActivityLog, PaymentStore, SubscriptionStore};

pub struct PaystackDisputeHandler {
    payments: Arc<dyn PaymentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    activities: Arc<dyn ActivityLog>,
}

impl PaystackDisputeHandler {
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

    async fn find_original(
        &self,
        dispute: &PaystackDispute,
    ) -> Result<Payment, WebhookError> {
        let reference = dispute
            .transaction
            .as_ref()
            .and_then(|t| t.reference.as_deref())
            .ok_or(WebhookError::MissingField("transaction.reference"))?;
        self.payments
            .find_by_paystack_reference(reference)
            .await?
            .ok_or_else(|| WebhookError::PaymentNotFound(reference.to_string()))
    }

    fn disputed_amount(dispute: &PaystackDispute, original: &Payment) -> i64 {
        dispute
            .refund_amount
            .or_else(|| dispute.transaction.as_ref().and_then(|t| t.amount))
            .unwrap_or(original.amount_cents)
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
        let dispute: PaystackDispute = payload(event)?;
        let mut original = self.find_original(&dispute).await?;
        let amount = Self::disputed_amount(&dispute, &original);

        let mut hold = Payment::dispute_hold(
            &original,
            amount,
            dispute.id.map(|id| id.to_string()),
            event.occurred_at(),
        )?;
        hold.paystack_event_id = Some(event.id.clone());

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
                "amount_cents": amount,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }

    async fn dispute_resolved(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let dispute: PaystackDispute = payload(event)?;

        // `merchant-accepted` means we conceded the money; anything the
        // provider declined comes back.
        let won = match dispute.resolution.as_deref() {
            Some("merchant-accepted") => false,
            Some("declined") => true,
            other => {
                return Err(WebhookError::Ignored(format!(
                    "dispute resolved with unmapped resolution {:?}",
                    other
                )))
            }
        };

        let original = self.find_original(&dispute).await?;
        let amount = Self::disputed_amount(&dispute, &original);
        let dispute_id = dispute.id.map(|id| id.to_string());

        let mut hold = self
            .payments
            .find_open_dispute(&original.creator_id, dispute_id.as_deref(), amount)
            .await?
            .ok_or_else(|| {
                WebhookError::PaymentNotFound(dispute_id.unwrap_or_else(|| "dispute".into()))
            })?;

        if won {
            hold.transition_to(PaymentStatus::DisputeWon)?;
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
                "outcome": if won { "won" } else { "lost" },
                "amount_cents": amount,
            }),
        );
        self.activities.record(&activity).await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for PaystackDisputeHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["charge.dispute.create", "charge.dispute.resolve"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        match event.event_type.as_str() {
            "charge.dispute.create" => self.dispute_created(event).await,
            "charge.dispute.resolve" => self.dispute_resolved(event).await,
            other => Err(WebhookError::Ignored(format!("unexpected type {}", other))),
        }
    }
}
