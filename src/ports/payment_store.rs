//! Payment store port.
//!
//! Ledger rows are immutable after insert except for the narrow status
//! transitions; implementations enforce unique `stripe_event_id` /
//! `paystack_event_id` columns; the row-level idempotency guard layered
//! under the webhook-event ledger.

use async_trait::async_trait;

use crate::domain::foundation::{CreatorId, DomainError, PaymentId};
use crate::domain::ledger::Payment;

/// Store port for payment ledger persistence.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new ledger row.
    ///
    /// # Errors
    ///
    /// - `DuplicatePayment` when a unique event-id column already holds
    ///   this value (idempotency hit; callers treat it as a no-op)
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Persist a status transition (and dispute-id backfill) on an
    /// existing row.
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Idempotency probe by provider event id (either column).
    async fn find_by_provider_event(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Original-payment lookup for refunds: charge id is the stable
    /// correlation key, preferred over any customer-based lookup.
    async fn find_by_stripe_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    async fn find_by_paystack_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Magnitude already refunded against a Stripe charge (sum over refund
    /// rows). Providers report cumulative refund totals; the delta between
    /// that and this is what a new reversal row records.
    async fn refunded_total_for_charge(
        &self,
        stripe_charge_id: &str,
    ) -> Result<i64, DomainError>;

    /// Paystack counterpart of [`Self::refunded_total_for_charge`].
    async fn refunded_total_for_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<i64, DomainError>;

    /// Payout-row lookup by the stable transfer reference.
    async fn find_payout_by_reference(
        &self,
        transfer_reference: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Finds the open (still `disputed`) dispute row by dispute id,
    /// falling back to an amount match for legacy rows that predate the
    /// id column. Implementations must never return a resolved row.
    async fn find_open_dispute(
        &self,
        creator_id: &CreatorId,
        dispute_id: Option<&str>,
        amount_cents: i64,
    ) -> Result<Option<Payment>, DomainError>;
}
