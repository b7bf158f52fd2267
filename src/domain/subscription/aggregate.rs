//! Subscription aggregate.
//!
//! One row per (subscriber, creator, interval): re-subscription after
//! cancellation reuses the row (upsert), never creates a second one. The
//! stored `amount_cents` is the creator's set price; the fee-calculation
//! base; not the gross charged or the net received, which differ by fee
//! mode. That semantic is locked for the life of the subscription so that
//! renewal fee recalculation stays correct.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::fees::{FeeMode, FeeModel};
use crate::domain::foundation::{
    CreatorId, CurrencyCode, DomainError, ErrorCode, StateMachine, SubscriberId, SubscriptionId,
    Timestamp,
};

use super::SubscriptionStatus;

/// Billing cadence. Part of the uniqueness key: the same pair of people can
/// hold one recurring and one one-time relationship simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Month,
    OneTime,
}

impl Interval {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "one_time" => Interval::OneTime,
            _ => Interval::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Month => "month",
            Interval::OneTime => "one_time",
        }
    }
}

/// Outcome of projecting a provider-reported status onto the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusProjection {
    /// The provider status was applied.
    Applied(SubscriptionStatus),
    /// The event predates the last applied change; ignored to avoid
    /// regressing a newer state from a stale, out-of-order delivery.
    IgnoredStale,
}

/// The creator/subscriber payment relationship.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub creator_id: CreatorId,
    pub subscriber_id: SubscriberId,
    pub tier_id: Option<String>,
    pub tier_name: Option<String>,

    /// Creator's set price in minor units; the fee base.
    pub amount_cents: i64,
    pub currency: CurrencyCode,
    pub interval: Interval,
    pub status: SubscriptionStatus,

    /// Pricing model this subscription was created under; `None` for rows
    /// predating model tagging (legacy flat).
    pub fee_model: Option<String>,
    /// Locked at creation; never mutated on renewal.
    pub fee_mode: FeeMode,

    /// Lifetime net earnings accrual. Never negative.
    pub ltv_cents: i64,

    // Provider correlation.
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub paystack_authorization_code: Option<SecretString>,
    pub paystack_customer_code: Option<String>,

    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<Timestamp>,

    /// Deferred attribution for asynchronous payment methods: set by the
    /// checkout event, consumed exactly once by the later charge-succeeded
    /// follow-up.
    pub async_view_id: Option<String>,
    pub async_request_id: Option<String>,

    /// When `status` last changed; the stale-transition guard for
    /// out-of-order provider status events.
    pub status_changed_at: Timestamp,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a subscription activated by its first successful charge.
    #[allow(clippy::too_many_arguments)]
    pub fn from_first_charge(
        creator_id: CreatorId,
        subscriber_id: SubscriberId,
        amount_cents: i64,
        currency: CurrencyCode,
        interval: Interval,
        fee_model: FeeModel,
        fee_mode: FeeMode,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            creator_id,
            subscriber_id,
            tier_id: None,
            tier_name: None,
            amount_cents,
            currency,
            interval,
            status: SubscriptionStatus::Active,
            fee_model: fee_model.tag().map(str::to_owned),
            fee_mode,
            ltv_cents: 0,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            paystack_authorization_code: None,
            paystack_customer_code: None,
            current_period_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            async_view_id: None,
            async_request_id: None,
            status_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// The pricing model this subscription computes under.
    pub fn fee_model(&self) -> FeeModel {
        FeeModel::from_tag(self.fee_model.as_deref())
    }

    /// Applies a successful charge: (re)activate, clear cancellation
    /// markers, roll the billing period forward.
    ///
    /// This is deliberately valid from any state, including `Canceled`
    /// (re-subscription is an upsert) and `PastDue` (recovery without
    /// waiting on the provider's separate status webhook).
    pub fn apply_successful_charge(&mut self, period_end: Option<Timestamp>, now: Timestamp) {
        if self.status != SubscriptionStatus::Active {
            self.status = SubscriptionStatus::Active;
            self.status_changed_at = now;
        }
        self.canceled_at = None;
        self.cancel_at_period_end = false;
        if period_end.is_some() {
            self.current_period_end = period_end;
        }
        self.updated_at = now;
    }

    /// Marks the subscription past due after a failed charge.
    ///
    /// # Errors
    ///
    /// Fails if the subscription is canceled (terminal).
    pub fn mark_past_due(&mut self, now: Timestamp) -> Result<(), DomainError> {
        let next = self.status.transition_to(SubscriptionStatus::PastDue)?;
        self.status = next;
        self.status_changed_at = now;
        self.updated_at = now;
        Ok(())
    }

    /// Terminal cancellation from an explicit deletion event or user
    /// action. Idempotent.
    pub fn cancel(&mut self, now: Timestamp) {
        if self.status != SubscriptionStatus::Canceled {
            self.status = SubscriptionStatus::Canceled;
            self.status_changed_at = now;
            self.canceled_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Projects a provider-reported subscription status.
    ///
    /// Events older than the last applied status change are ignored: a
    /// stale `past_due` delivered after a newer `active` must not regress
    /// the state.
    pub fn apply_provider_status(
        &mut self,
        provider_status: &str,
        event_at: Timestamp,
        now: Timestamp,
    ) -> StatusProjection {
        if event_at.is_before(&self.status_changed_at) {
            return StatusProjection::IgnoredStale;
        }
        let target = SubscriptionStatus::from_provider(provider_status);
        if target == self.status {
            self.updated_at = now;
            return StatusProjection::Applied(target);
        }
        if !self.status.can_transition_to(&target) {
            // Canceled is terminal; anything else the machine rejects is
            // also stale by construction.
            return StatusProjection::IgnoredStale;
        }
        self.status = target;
        self.status_changed_at = event_at;
        if target == SubscriptionStatus::Canceled {
            self.canceled_at = Some(now);
        }
        self.updated_at = now;
        StatusProjection::Applied(target)
    }

    /// Accrues net earnings. Gross never goes into LTV.
    pub fn credit_ltv(&mut self, net_cents: i64) -> Result<(), DomainError> {
        if net_cents < 0 {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "LTV credit must be non-negative",
            ));
        }
        self.ltv_cents += net_cents;
        Ok(())
    }

    /// Reverses earnings for a refund or dispute, clamped at zero: LTV
    /// never goes negative regardless of decrement order or amount.
    pub fn debit_ltv(&mut self, cents: i64) {
        self.ltv_cents = (self.ltv_cents - cents.max(0)).max(0);
    }

    /// Stores deferred attribution for an asynchronous payment method.
    pub fn defer_attribution(&mut self, view_id: Option<String>, request_id: Option<String>) {
        self.async_view_id = view_id;
        self.async_request_id = request_id;
    }

    /// Consumes the deferred attribution fields, clearing them so the
    /// follow-up runs exactly once.
    pub fn take_deferred_attribution(&mut self) -> (Option<String>, Option<String>) {
        (self.async_view_id.take(), self.async_request_id.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fees::Direction;

    fn test_subscription() -> Subscription {
        Subscription::from_first_charge(
            CreatorId::new(),
            SubscriberId::new(),
            1_000,
            CurrencyCode::parse("USD").unwrap(),
            Interval::Month,
            FeeModel::FlatV1,
            FeeMode::Absorb,
            Timestamp::now(),
        )
    }

    #[test]
    fn first_charge_creates_active_subscription() {
        let sub = test_subscription();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.ltv_cents, 0);
        assert_eq!(sub.fee_model.as_deref(), Some("flat"));
    }

    #[test]
    fn successful_charge_recovers_past_due() {
        let mut sub = test_subscription();
        let now = Timestamp::now();
        sub.mark_past_due(now).unwrap();

        sub.apply_successful_charge(Some(now.add_days(30)), now.plus_secs(5));

        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn successful_charge_reactivates_canceled_row() {
        let mut sub = test_subscription();
        let now = Timestamp::now();
        sub.cancel(now);
        assert!(sub.canceled_at.is_some());

        sub.apply_successful_charge(None, now.plus_secs(5));

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.canceled_at.is_none());
        assert!(!sub.cancel_at_period_end);
    }

    #[test]
    fn past_due_fails_on_canceled_subscription() {
        let mut sub = test_subscription();
        let now = Timestamp::now();
        sub.cancel(now);
        assert!(sub.mark_past_due(now).is_err());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut sub = test_subscription();
        let first = Timestamp::now();
        sub.cancel(first);
        let recorded = sub.canceled_at;
        sub.cancel(first.add_days(1));
        assert_eq!(sub.canceled_at, recorded);
    }

    #[test]
    fn stale_provider_status_is_ignored() {
        let mut sub = test_subscription();
        let now = Timestamp::now();
        // A fresh charge moved us to active "now"...
        sub.apply_successful_charge(None, now);

        // ...then a past_due event from a day ago straggles in.
        let projection = sub.apply_provider_status("past_due", now.minus_days(1), now);

        assert_eq!(projection, StatusProjection::IgnoredStale);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn fresh_provider_status_applies() {
        let mut sub = test_subscription();
        let later = Timestamp::now().plus_secs(60);

        let projection = sub.apply_provider_status("past_due", later, later);

        assert_eq!(
            projection,
            StatusProjection::Applied(SubscriptionStatus::PastDue)
        );
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
    }

    #[test]
    fn unmapped_provider_status_pauses() {
        let mut sub = test_subscription();
        let later = Timestamp::now().plus_secs(60);
        sub.apply_provider_status("incomplete", later, later);
        assert_eq!(sub.status, SubscriptionStatus::Paused);
    }

    #[test]
    fn ltv_accrues_net_and_clamps_at_zero() {
        let mut sub = test_subscription();
        sub.credit_ltv(900).unwrap();
        assert_eq!(sub.ltv_cents, 900);

        sub.debit_ltv(500);
        assert_eq!(sub.ltv_cents, 400);

        // Over-decrement clamps, never negative.
        sub.debit_ltv(10_000);
        assert_eq!(sub.ltv_cents, 0);

        sub.debit_ltv(100);
        assert_eq!(sub.ltv_cents, 0);
    }

    #[test]
    fn ltv_rejects_negative_credit() {
        let mut sub = test_subscription();
        assert!(sub.credit_ltv(-1).is_err());
    }

    #[test]
    fn deferred_attribution_is_consumed_exactly_once() {
        let mut sub = test_subscription();
        sub.defer_attribution(Some("view_1".into()), Some("req_1".into()));

        let (view, req) = sub.take_deferred_attribution();
        assert_eq!(view.as_deref(), Some("view_1"));
        assert_eq!(req.as_deref(), Some("req_1"));

        let (view, req) = sub.take_deferred_attribution();
        assert!(view.is_none());
        assert!(req.is_none());
    }

    #[test]
    fn fee_model_tag_resolves_for_tiered_rows() {
        let mut sub = test_subscription();
        sub.fee_model = Some("progressive_founding".to_string());
        assert_eq!(
            sub.fee_model(),
            FeeModel::TieredV2 {
                founding: true,
                direction: Direction::RecipientPays
            }
        );
    }
}
