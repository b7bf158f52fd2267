//! Split v1: the fee is shared 4%/4% between subscriber and creator, with a
//! processor-cost buffer so the platform never settles below its own costs.

use crate::domain::foundation::{apply_bps, round_half_up};

use super::model::{FeeBreakdown, FeeInput, FeeModel};
use super::schedule::CurrencySchedule;

const SUBSCRIBER_SIDE_BPS: i64 = 400;
const CREATOR_SIDE_BPS: i64 = 400;

/// Shortfall apportioning: 60% to the subscriber side, remainder to the
/// creator side. The remainder form guarantees the total is exact.
const SHORTFALL_SUBSCRIBER_PCT: i64 = 60;

pub(super) fn compute(input: &FeeInput) -> FeeBreakdown {
    let schedule = CurrencySchedule::for_currency(&input.currency);

    let mut subscriber_fee = apply_bps(input.amount_cents, SUBSCRIBER_SIDE_BPS);
    let mut creator_fee = apply_bps(input.amount_cents, CREATOR_SIDE_BPS);

    // Estimate what the processor will take for this charge, plus the
    // minimum margin the platform must keep.
    let processor_cost =
        apply_bps(input.amount_cents, schedule.processor_pct_bps) + schedule.processor_fixed_cents;
    let target = processor_cost + schedule.min_margin_cents;

    let collected = subscriber_fee + creator_fee;
    let was_capped = collected < target;
    if was_capped {
        let shortfall = target - collected;
        let subscriber_extra = round_half_up(shortfall * SHORTFALL_SUBSCRIBER_PCT, 100);
        subscriber_fee += subscriber_extra;
        creator_fee += shortfall - subscriber_extra;
        // Invariant: subscriber_fee + creator_fee == target exactly.
    }

    let fee = subscriber_fee + creator_fee;
    let gross = input.amount_cents + subscriber_fee;
    let net = input.amount_cents - creator_fee;

    FeeBreakdown {
        fee_cents: fee,
        gross_cents: gross,
        net_cents: net,
        subscriber_fee_cents: subscriber_fee,
        creator_fee_cents: creator_fee,
        effective_rate_bps: round_half_up(fee * 10_000, input.amount_cents),
        was_capped,
        model: FeeModel::SplitV1,
    }
}
