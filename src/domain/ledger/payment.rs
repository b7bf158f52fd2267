//! Payment ledger entries.
//!
//! One row per money-movement event: charge, renewal, refund, dispute
//! hold/resolution, payout. Rows are immutable after creation except for
//! the narrow status transitions the [`StateMachine`] impl allows, and the
//! provider event-id columns are unique; the row-level idempotency guard
//! layered under the webhook-event ledger.

use serde::{Deserialize, Serialize};

use crate::domain::fees::{self, FeeBreakdown};
use crate::domain::foundation::{
    CreatorId, CurrencyCode, DomainError, ErrorCode, PaymentId, StateMachine, SubscriberId,
    SubscriptionId, Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    OneTime,
    Recurring,
    Refund,
    Payout,
    Dispute,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::OneTime => "one_time",
            PaymentType::Recurring => "recurring",
            PaymentType::Refund => "refund",
            PaymentType::Payout => "payout",
            PaymentType::Dispute => "dispute",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "recurring" => PaymentType::Recurring,
            "refund" => PaymentType::Refund,
            "payout" => PaymentType::Payout,
            "dispute" => PaymentType::Dispute,
            _ => PaymentType::OneTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Pending,
    Refunded,
    Disputed,
    DisputeWon,
    DisputeLost,
    /// Paystack transfers awaiting a one-time password confirmation.
    OtpPending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Disputed => "disputed",
            PaymentStatus::DisputeWon => "dispute_won",
            PaymentStatus::DisputeLost => "dispute_lost",
            PaymentStatus::OtpPending => "otp_pending",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "succeeded" => PaymentStatus::Succeeded,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "disputed" => PaymentStatus::Disputed,
            "dispute_won" => PaymentStatus::DisputeWon,
            "dispute_lost" => PaymentStatus::DisputeLost,
            "otp_pending" => PaymentStatus::OtpPending,
            _ => PaymentStatus::Pending,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            // Payouts settle asynchronously; a reconciliation mismatch
            // parks the row as disputed instead of settling it.
            PaymentStatus::Pending => vec![
                PaymentStatus::Succeeded,
                PaymentStatus::Failed,
                PaymentStatus::Disputed,
            ],
            PaymentStatus::OtpPending => vec![
                PaymentStatus::Pending,
                PaymentStatus::Succeeded,
                PaymentStatus::Failed,
                PaymentStatus::Disputed,
            ],
            PaymentStatus::Succeeded => {
                vec![PaymentStatus::Refunded, PaymentStatus::Disputed]
            }
            PaymentStatus::Disputed => {
                vec![PaymentStatus::DisputeWon, PaymentStatus::DisputeLost]
            }
            PaymentStatus::Failed
            | PaymentStatus::Refunded
            | PaymentStatus::DisputeWon
            | PaymentStatus::DisputeLost => vec![],
        }
    }
}

/// An immutable money-movement ledger entry.
#[derive(Debug, Clone)]
pub struct Payment {
    pub id: PaymentId,
    /// Nullable for provider-level payouts not tied to one subscription.
    pub subscription_id: Option<SubscriptionId>,
    pub creator_id: CreatorId,
    pub subscriber_id: Option<SubscriberId>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,

    /// Signed: negative for refunds and dispute holds.
    pub amount_cents: i64,
    /// Total the payer was charged; absent when the provider did not report
    /// it.
    pub gross_cents: Option<i64>,
    pub fee_cents: i64,
    /// Creator's portion, signed consistently with `amount_cents`.
    pub net_cents: i64,
    pub currency: CurrencyCode,

    // Fee snapshot for audit and refund reversal.
    pub fee_model: Option<String>,
    pub fee_effective_rate_bps: Option<i64>,
    pub fee_was_capped: bool,

    // Provider correlation. The event ids are unique columns.
    pub stripe_event_id: Option<String>,
    pub stripe_charge_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_dispute_id: Option<String>,
    pub paystack_event_id: Option<String>,
    pub paystack_transaction_ref: Option<String>,
    pub paystack_transfer_code: Option<String>,
    /// Provider-agnostic payout reference; settlement webhooks are matched
    /// on this, never on amount alone.
    pub transfer_reference: Option<String>,

    /// Provider-reported timestamp when available, else processing time.
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

impl Payment {
    /// A successful inbound charge, with its fee breakdown snapshotted.
    pub fn charge(
        payment_type: PaymentType,
        subscription_id: Option<SubscriptionId>,
        creator_id: CreatorId,
        subscriber_id: Option<SubscriberId>,
        currency: CurrencyCode,
        breakdown: &FeeBreakdown,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            subscription_id,
            creator_id,
            subscriber_id,
            payment_type,
            status: PaymentStatus::Succeeded,
            amount_cents: breakdown.gross_cents - breakdown.subscriber_fee_cents,
            gross_cents: Some(breakdown.gross_cents),
            fee_cents: breakdown.fee_cents,
            net_cents: breakdown.net_cents,
            currency,
            fee_model: breakdown.model.tag().map(str::to_owned),
            fee_effective_rate_bps: Some(breakdown.effective_rate_bps),
            fee_was_capped: breakdown.was_capped,
            stripe_event_id: None,
            stripe_charge_id: None,
            stripe_payment_intent_id: None,
            stripe_dispute_id: None,
            paystack_event_id: None,
            paystack_transaction_ref: None,
            paystack_transfer_code: None,
            transfer_reference: None,
            occurred_at,
            created_at: Timestamp::now(),
        }
    }

    /// A negative reversal row for a (possibly partial) refund of
    /// `original`.
    ///
    /// The fee and net are derived from the original payment's stored
    /// ratio, never recomputed from current rates: rates change over time
    /// and the reversal must mirror what was actually charged.
    ///
    /// # Errors
    ///
    /// Fails if the refund amount is non-positive or exceeds the original
    /// amount.
    pub fn refund_of(
        original: &Payment,
        refund_amount_cents: i64,
        occurred_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if refund_amount_cents <= 0 || refund_amount_cents > original.amount_cents {
            return Err(DomainError::new(
                ErrorCode::AmountMismatch,
                "refund amount must be positive and at most the original amount",
            )
            .with_detail("refund_cents", refund_amount_cents.to_string())
            .with_detail("original_cents", original.amount_cents.to_string()));
        }
        let fee = fees::proportional_fee(
            refund_amount_cents,
            original.fee_cents,
            original.amount_cents,
        );
        let net = original
            .net_cents
            .min(refund_amount_cents - fee)
            .max(0)
            .min(refund_amount_cents);
        Ok(Self {
            id: PaymentId::new(),
            subscription_id: original.subscription_id,
            creator_id: original.creator_id,
            subscriber_id: original.subscriber_id,
            payment_type: PaymentType::Refund,
            status: PaymentStatus::Succeeded,
            amount_cents: -refund_amount_cents,
            gross_cents: None,
            fee_cents: -fee,
            net_cents: -net,
            currency: original.currency.clone(),
            fee_model: original.fee_model.clone(),
            fee_effective_rate_bps: original.fee_effective_rate_bps,
            fee_was_capped: original.fee_was_capped,
            stripe_event_id: None,
            stripe_charge_id: original.stripe_charge_id.clone(),
            stripe_payment_intent_id: original.stripe_payment_intent_id.clone(),
            stripe_dispute_id: None,
            paystack_event_id: None,
            paystack_transaction_ref: original.paystack_transaction_ref.clone(),
            paystack_transfer_code: None,
            transfer_reference: None,
            occurred_at,
            created_at: Timestamp::now(),
        })
    }

    /// A held-funds row for a newly created dispute against `original`.
    /// Same ratio derivation as refunds; status starts `disputed` until the
    /// closure webhook resolves it.
    pub fn dispute_hold(
        original: &Payment,
        disputed_amount_cents: i64,
        dispute_id: Option<String>,
        occurred_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let mut row = Self::refund_of(original, disputed_amount_cents, occurred_at)?;
        row.payment_type = PaymentType::Dispute;
        row.status = PaymentStatus::Disputed;
        row.stripe_dispute_id = dispute_id;
        Ok(row)
    }

    /// A payout row created at transfer initiation, before the provider
    /// confirms settlement. `otp_pending` when the transfer is held behind
    /// an OTP challenge.
    #[allow(clippy::too_many_arguments)]
    pub fn payout(
        creator_id: CreatorId,
        amount_cents: i64,
        currency: CurrencyCode,
        status: PaymentStatus,
        transfer_reference: Option<String>,
        transfer_code: Option<String>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            subscription_id: None,
            creator_id,
            subscriber_id: None,
            payment_type: PaymentType::Payout,
            status,
            amount_cents,
            gross_cents: None,
            fee_cents: 0,
            net_cents: amount_cents,
            currency,
            fee_model: None,
            fee_effective_rate_bps: None,
            fee_was_capped: false,
            stripe_event_id: None,
            stripe_charge_id: None,
            stripe_payment_intent_id: None,
            stripe_dispute_id: None,
            paystack_event_id: None,
            paystack_transaction_ref: None,
            paystack_transfer_code: transfer_code,
            transfer_reference,
            occurred_at,
            created_at: Timestamp::now(),
        }
    }

    /// Moves the row to a new status through the narrow transition set.
    pub fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }

    /// Whether this row settled money toward the creator (the LTV source).
    pub fn is_settled_charge(&self) -> bool {
        matches!(
            self.payment_type,
            PaymentType::OneTime | PaymentType::Recurring
        ) && self.status == PaymentStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fees::{compute, FeeInput, FeeMode, FeeModel, Purpose};

    fn settled_charge(amount_cents: i64) -> Payment {
        let breakdown = compute(
            FeeModel::FlatV1,
            &FeeInput {
                amount_cents,
                currency: CurrencyCode::parse("USD").unwrap(),
                purpose: Purpose::Personal,
                mode: FeeMode::Absorb,
                cross_border: false,
            },
        );
        Payment::charge(
            PaymentType::Recurring,
            Some(SubscriptionId::new()),
            CreatorId::new(),
            Some(SubscriberId::new()),
            CurrencyCode::parse("USD").unwrap(),
            &breakdown,
            Timestamp::now(),
        )
    }

    #[test]
    fn charge_snapshots_fee_metadata() {
        let payment = settled_charge(10_000);
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.amount_cents, 10_000);
        assert_eq!(payment.fee_cents, 1_000);
        assert_eq!(payment.net_cents, 9_000);
        assert_eq!(payment.fee_model.as_deref(), Some("flat"));
        assert_eq!(payment.fee_effective_rate_bps, Some(1_000));
    }

    #[test]
    fn full_refund_mirrors_original_ratio() {
        let original = settled_charge(10_000);
        let refund = Payment::refund_of(&original, 10_000, Timestamp::now()).unwrap();

        assert_eq!(refund.amount_cents, -10_000);
        assert_eq!(refund.fee_cents, -1_000);
        assert_eq!(refund.net_cents, -9_000);
        assert_eq!(refund.payment_type, PaymentType::Refund);
        assert_eq!(refund.fee_model, original.fee_model);
    }

    #[test]
    fn partial_refund_keeps_original_rate_not_current() {
        let original = settled_charge(10_000);
        // Half the amount reverses half the fee at the original 10% rate,
        // whatever today's rate tables say.
        let refund = Payment::refund_of(&original, 5_000, Timestamp::now()).unwrap();
        assert_eq!(refund.fee_cents, -500);
        assert_eq!(refund.net_cents, -4_500);
    }

    #[test]
    fn refund_rejects_overlarge_amount() {
        let original = settled_charge(10_000);
        assert!(Payment::refund_of(&original, 10_001, Timestamp::now()).is_err());
        assert!(Payment::refund_of(&original, 0, Timestamp::now()).is_err());
    }

    #[test]
    fn dispute_hold_starts_disputed_and_resolves_once() {
        let original = settled_charge(10_000);
        let mut hold =
            Payment::dispute_hold(&original, 10_000, Some("dp_1".into()), Timestamp::now())
                .unwrap();
        assert_eq!(hold.status, PaymentStatus::Disputed);
        assert_eq!(hold.stripe_dispute_id.as_deref(), Some("dp_1"));

        hold.transition_to(PaymentStatus::DisputeWon).unwrap();
        // Terminal: cannot flip the resolution afterwards.
        assert!(hold.transition_to(PaymentStatus::DisputeLost).is_err());
    }

    #[test]
    fn payout_settles_or_parks_disputed() {
        let mut payout = Payment::payout(
            CreatorId::new(),
            25_000,
            CurrencyCode::parse("NGN").unwrap(),
            PaymentStatus::Pending,
            Some("trf_ref_1".into()),
            Some("TRF_code".into()),
            Timestamp::now(),
        );
        payout.transition_to(PaymentStatus::Disputed).unwrap();
        assert_eq!(payout.status, PaymentStatus::Disputed);
        // A disputed payout never quietly becomes succeeded.
        assert!(payout.transition_to(PaymentStatus::Succeeded).is_err());
    }

    #[test]
    fn otp_pending_payout_can_settle() {
        let mut payout = Payment::payout(
            CreatorId::new(),
            25_000,
            CurrencyCode::parse("NGN").unwrap(),
            PaymentStatus::OtpPending,
            Some("trf_ref_2".into()),
            None,
            Timestamp::now(),
        );
        payout.transition_to(PaymentStatus::Succeeded).unwrap();
        assert_eq!(payout.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn settled_rows_are_otherwise_immutable() {
        let mut payment = settled_charge(10_000);
        assert!(payment.transition_to(PaymentStatus::Pending).is_err());
        assert!(payment.transition_to(PaymentStatus::Failed).is_err());
        // Refunded and disputed are the only exits.
        assert!(payment.status.can_transition_to(&PaymentStatus::Refunded));
        assert!(payment.status.can_transition_to(&PaymentStatus::Disputed));
    }
}
