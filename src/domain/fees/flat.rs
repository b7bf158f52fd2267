//! Flat fee models: the original legacy calculation and flat v1.

use crate::domain::foundation::{apply_bps, round_half_up};

use super::model::{FeeBreakdown, FeeInput, FeeMode, FeeModel};
use super::schedule::CurrencySchedule;

/// Cross-border buffer added to the base rate, basis points.
const CROSS_BORDER_BUFFER_BPS: i64 = 150;

/// Legacy flat model: fee = round(amount x rate) + fixed buffer, always
/// deducted from the creator's amount.
pub(super) fn compute_legacy(input: &FeeInput) -> FeeBreakdown {
    let schedule = CurrencySchedule::for_currency(&input.currency);
    let rate_bps = input.purpose.base_rate_bps();
    let fee = apply_bps(input.amount_cents, rate_bps) + schedule.legacy_buffer_cents;

    FeeBreakdown {
        fee_cents: fee,
        gross_cents: input.amount_cents,
        net_cents: input.amount_cents - fee,
        subscriber_fee_cents: 0,
        creator_fee_cents: fee,
        effective_rate_bps: effective_rate(fee, input.amount_cents),
        was_capped: false,
        model: FeeModel::LegacyFlat,
    }
}

/// Flat v1: per-purpose rate, fee-mode choice, currency minimum floor, and
/// optional cross-border buffer.
pub(super) fn compute_v1(input: &FeeInput) -> FeeBreakdown {
    let schedule = CurrencySchedule::for_currency(&input.currency);
    let mut rate_bps = input.purpose.base_rate_bps();
    if input.cross_border {
        rate_bps += CROSS_BORDER_BUFFER_BPS;
    }

    let naive_fee = apply_bps(input.amount_cents, rate_bps);

    // The floor only applies when the amount comfortably exceeds it,
    // otherwise it would consume most of a micro-transaction.
    let floor = schedule.min_fee_cents;
    let (fee, was_capped) = if input.amount_cents > 2 * floor && naive_fee < floor {
        (floor, true)
    } else {
        (naive_fee, false)
    };

    let (gross, net, subscriber_fee, creator_fee) = match input.mode {
        FeeMode::PassToSubscriber => (input.amount_cents + fee, input.amount_cents, fee, 0),
        // Split is not a flat-v1 mode; treat as absorb, the historical
        // behavior for malformed mode tags.
        FeeMode::Absorb | FeeMode::Split => {
            (input.amount_cents, input.amount_cents - fee, 0, fee)
        }
    };

    FeeBreakdown {
        fee_cents: fee,
        gross_cents: gross,
        net_cents: net,
        subscriber_fee_cents: subscriber_fee,
        creator_fee_cents: creator_fee,
        effective_rate_bps: effective_rate(fee, input.amount_cents),
        was_capped,
        model: FeeModel::FlatV1,
    }
}

fn effective_rate(fee: i64, amount: i64) -> i64 {
    if amount == 0 {
        return 0;
    }
    round_half_up(fee * 10_000, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fees::model::Purpose;
    use crate::domain::foundation::CurrencyCode;

    fn input(amount: i64, currency: &str, purpose: Purpose, mode: FeeMode) -> FeeInput {
        FeeInput {
            amount_cents: amount,
            currency: CurrencyCode::parse(currency).unwrap(),
            purpose,
            mode,
            cross_border: false,
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Legacy flat
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn legacy_personal_deducts_ten_percent_plus_buffer() {
        let fee = compute_legacy(&input(10_000, "USD", Purpose::Personal, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 1_030); // 10% + 30c buffer
        assert_eq!(fee.gross_cents, 10_000);
        assert_eq!(fee.net_cents, 8_970);
    }

    #[test]
    fn legacy_service_uses_eight_percent() {
        let fee = compute_legacy(&input(10_000, "USD", Purpose::Service, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 830);
        assert_eq!(fee.net_cents, 9_170);
    }

    #[test]
    fn legacy_always_charges_creator_side() {
        // The mode field is ignored by the legacy model.
        let fee = compute_legacy(&input(10_000, "USD", Purpose::Personal, FeeMode::PassToSubscriber));
        assert_eq!(fee.gross_cents, 10_000);
        assert_eq!(fee.subscriber_fee_cents, 0);
        assert_eq!(fee.creator_fee_cents, fee.fee_cents);
    }

    // ══════════════════════════════════════════════════════════════
    // Flat v1
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn v1_pass_to_subscriber_charges_on_top() {
        let fee = compute_v1(&input(10_000, "USD", Purpose::Personal, FeeMode::PassToSubscriber));
        assert_eq!(fee.fee_cents, 1_000);
        assert_eq!(fee.gross_cents, 11_000);
        assert_eq!(fee.net_cents, 10_000);
        assert_eq!(fee.subscriber_fee_cents, 1_000);
        assert_eq!(fee.creator_fee_cents, 0);
    }

    #[test]
    fn v1_absorb_deducts_from_creator() {
        let fee = compute_v1(&input(10_000, "USD", Purpose::Personal, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 1_000);
        assert_eq!(fee.gross_cents, 10_000);
        assert_eq!(fee.net_cents, 9_000);
        assert_eq!(fee.effective_rate_bps, 1_000);
    }

    #[test]
    fn v1_floor_skipped_below_threshold() {
        // Amount 75c on USD (50c floor): naive 10% fee is 8c, but the
        // amount is only 1.5x the floor, so the low fee stands.
        let fee = compute_v1(&input(75, "USD", Purpose::Personal, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 8);
        assert!(!fee.was_capped);
    }

    #[test]
    fn v1_floor_applied_above_threshold() {
        // Amount $1.50 is 3x the 50c floor; naive 10% fee (15c) is bumped.
        let fee = compute_v1(&input(150, "USD", Purpose::Personal, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 50);
        assert!(fee.was_capped);
    }

    #[test]
    fn v1_floor_not_applied_when_naive_fee_exceeds_it() {
        let fee = compute_v1(&input(10_000, "USD", Purpose::Personal, FeeMode::Absorb));
        assert!(fee.fee_cents > 50);
        assert!(!fee.was_capped);
    }

    #[test]
    fn v1_cross_border_adds_buffer_to_rate() {
        let mut i = input(10_000, "USD", Purpose::Service, FeeMode::Absorb);
        i.cross_border = true;
        let fee = compute_v1(&i);
        // 8% + 1.5% = 9.5%
        assert_eq!(fee.fee_cents, 950);
        assert_eq!(fee.effective_rate_bps, 950);
    }

    #[test]
    fn v1_rounds_half_up() {
        // 10% of 1234.5... 8% of 1_231 = 98.48 -> 98; 10% of 1_235 = 123.5 -> 124
        let fee = compute_v1(&input(1_235, "USD", Purpose::Personal, FeeMode::Absorb));
        assert_eq!(fee.fee_cents, 124);
    }
}
