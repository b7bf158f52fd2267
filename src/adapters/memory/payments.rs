//! In-memory payment store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CreatorId, DomainError, ErrorCode, PaymentId};
use crate::domain::ledger::{Payment, PaymentStatus, PaymentType};
use crate::ports::PaymentStore;

/// Map-backed ledger enforcing the unique provider event-id columns.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, for test assertions.
    pub async fn all(&self) -> Vec<Payment> {
        self.payments.read().await.values().cloned().collect()
    }

    fn duplicate_check(existing: &Payment, candidate: &Payment) -> bool {
        let stripe_hit = candidate.stripe_event_id.is_some()
            && existing.stripe_event_id == candidate.stripe_event_id;
        let paystack_hit = candidate.paystack_event_id.is_some()
            && existing.paystack_event_id == candidate.paystack_event_id;
        stripe_hit || paystack_hit
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.payments.write().await;
        if payments
            .values()
            .any(|existing| Self::duplicate_check(existing, payment))
        {
            return Err(DomainError::new(
                ErrorCode::DuplicatePayment,
                "provider event id already recorded",
            ));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.id) {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "payment does not exist",
            ));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn find_by_provider_event(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| {
                p.stripe_event_id.as_deref() == Some(provider_event_id)
                    || p.paystack_event_id.as_deref() == Some(provider_event_id)
            })
            .cloned())
    }

    async fn find_by_stripe_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| {
                p.stripe_charge_id.as_deref() == Some(stripe_charge_id)
                    && matches!(p.payment_type, PaymentType::OneTime | PaymentType::Recurring)
            })
            .cloned())
    }

    async fn find_by_paystack_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| {
                p.paystack_transaction_ref.as_deref() == Some(transaction_ref)
                    && matches!(p.payment_type, PaymentType::OneTime | PaymentType::Recurring)
            })
            .cloned())
    }

    async fn refunded_total_for_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<i64, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|p| {
                p.payment_type == PaymentType::Refund
                    && p.stripe_charge_id.as_deref() == Some(stripe_charge_id)
            })
            .map(|p| -p.amount_cents)
            .sum())
    }

    async fn refunded_total_for_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<i64, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|p| {
                p.payment_type == PaymentType::Refund
                    && p.paystack_transaction_ref.as_deref() == Some(transaction_ref)
            })
            .map(|p| -p.amount_cents)
            .sum())
    }

    async fn find_payout_by_reference(
        &self,
        transfer_reference: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| {
                p.payment_type == PaymentType::Payout
                    && p.transfer_reference.as_deref() == Some(transfer_reference)
            })
            .cloned())
    }

    async fn find_open_dispute(
        &self,
        creator_id: &CreatorId,
        dispute_id: Option<&str>,
        amount_cents: i64,
    ) -> Result<Option<Payment>, DomainError> {
        let payments = self.payments.read().await;
        let open = payments.values().filter(|p| {
            p.payment_type == PaymentType::Dispute
                && p.status == PaymentStatus::Disputed
                && p.creator_id == *creator_id
        });

        if let Some(dispute_id) = dispute_id {
            if let Some(hit) = open
                .clone()
                .find(|p| p.stripe_dispute_id.as_deref() == Some(dispute_id))
            {
                return Ok(Some(hit.clone()));
            }
        }
        // Legacy fallback: match by held amount for rows predating the
        // dispute-id column.
        Ok(open
            .filter(|p| p.amount_cents == -amount_cents.abs())
            .min_by_key(|p| p.created_at.as_unix_secs())
            .cloned())
    }
}
