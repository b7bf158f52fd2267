//! Fee engine - pure platform-fee calculation for every pricing model.
//!
//! Historical subscriptions were created under earlier pricing rules and
//! keep computing under their original model for their whole lifetime, so
//! several models coexist. The model is always an explicit stored tag
//! ([`FeeModel`]), never inferred from absent fields.
//!
//! All functions here are deterministic and side-effect free: integer minor
//! currency units in, integer minor currency units out, with round-half-up
//! at each step. Each calculation also returns the metadata (effective rate,
//! capping flag, model tag) that the ledger snapshots for audit and that
//! refund reversal relies on later.

mod flat;
mod model;
mod schedule;
mod split;
mod tiered;

pub use model::{Direction, FeeBreakdown, FeeInput, FeeMode, FeeModel, Purpose};
pub use schedule::CurrencySchedule;

use crate::domain::foundation::round_half_up;

/// Computes the platform fee breakdown for a charge under the given model.
///
/// Zero amounts short-circuit to an all-zero breakdown without touching any
/// division.
pub fn compute(model: FeeModel, input: &FeeInput) -> FeeBreakdown {
    if input.amount_cents == 0 {
        return FeeBreakdown::zero(model);
    }

    match model {
        FeeModel::LegacyFlat => flat::compute_legacy(input),
        FeeModel::FlatV1 => flat::compute_v1(input),
        FeeModel::SplitV1 => split::compute(input),
        FeeModel::TieredV2 { founding, direction } => {
            tiered::compute(input, founding, direction)
        }
    }
}

/// Derives the fee portion of a partial refund from the original payment's
/// recorded amounts.
///
/// Rates change over time; a refund must reproduce the original payment's
/// fee/net ratio, never a freshly computed rate. Returns the fee magnitude
/// for the refunded portion, rounded half up.
pub fn proportional_fee(refund_cents: i64, original_fee_cents: i64, original_amount_cents: i64) -> i64 {
    if original_amount_cents == 0 || refund_cents == 0 {
        return 0;
    }
    round_half_up(refund_cents * original_fee_cents, original_amount_cents)
}
