//! Subscription store port (write side).
//!
//! Persistence contract for the Subscription aggregate. Implementations
//! must keep the unique constraint on (subscriber, creator, interval),
//! the second line of defense behind the distributed lock against
//! concurrent duplicate creation, and run the multi-row write methods in
//! a single transaction.

use async_trait::async_trait;

use crate::domain::foundation::{CreatorId, DomainError, SubscriberId, SubscriptionId};
use crate::domain::ledger::{Activity, Payment};
use crate::domain::subscription::{Interval, Subscription};

/// Store port for Subscription aggregate persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Primary lookup: one row per (subscriber, creator, interval).
    async fn find_for_parties(
        &self,
        subscriber_id: &SubscriberId,
        creator_id: &CreatorId,
        interval: Interval,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Lookup by the provider's subscription handle.
    async fn find_by_stripe_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Lookup by Paystack customer code scoped to a creator (Paystack has
    /// no per-subscription webhook handle on all event shapes).
    async fn find_by_paystack_customer(
        &self,
        paystack_customer_code: &str,
        creator_id: &CreatorId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Update an existing row.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the row does not exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Upsert the subscription and, atomically with it, insert the
    /// optional first payment and the audit activity.
    ///
    /// Runs in one transaction: either all rows land or none do. An upsert
    /// on the parties key means re-subscription reuses the existing row.
    async fn upsert_with_records(
        &self,
        subscription: &Subscription,
        payment: Option<&Payment>,
        activity: &Activity,
    ) -> Result<(), DomainError>;

    /// Persist a renewal: subscription update + payment insert + activity,
    /// atomically.
    ///
    /// # Errors
    ///
    /// - `DuplicatePayment` if the payment's provider event id already
    ///   exists (idempotency hit; caller treats as a no-op)
    async fn record_renewal(
        &self,
        subscription: &Subscription,
        payment: &Payment,
        activity: &Activity,
    ) -> Result<(), DomainError>;
}
