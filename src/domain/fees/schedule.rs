//! Per-currency fee schedule constants.
//!
//! Floors, processor cost estimates, and tiered-model thresholds differ per
//! currency. Values are fixed snapshots in minor units; they are part of the
//! pricing contract, not live FX data.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::domain::foundation::CurrencyCode;

/// Fee constants for one currency, in minor units.
#[derive(Debug, Clone, Copy)]
pub struct CurrencySchedule {
    /// Minimum platform fee under flat v1 (only applied when the amount
    /// exceeds twice this floor, so micro-transactions are not consumed).
    pub min_fee_cents: i64,
    /// Estimated payment-processor percentage cost, basis points.
    pub processor_pct_bps: i64,
    /// Estimated payment-processor fixed cost.
    pub processor_fixed_cents: i64,
    /// Minimum platform margin the split model must preserve.
    pub min_margin_cents: i64,
    /// Fixed buffer added by the legacy flat model.
    pub legacy_buffer_cents: i64,
    /// $500-equivalent marginal-rate breakpoint for the tiered model.
    pub tier_breakpoint_cents: i64,
    /// $1-equivalent minimum fee for the tiered model.
    pub tier_floor_cents: i64,
}

const DEFAULT_SCHEDULE: CurrencySchedule = CurrencySchedule {
    min_fee_cents: 50,
    processor_pct_bps: 290,
    processor_fixed_cents: 30,
    min_margin_cents: 20,
    legacy_buffer_cents: 30,
    tier_breakpoint_cents: 50_000,
    tier_floor_cents: 100,
};

static SCHEDULES: Lazy<HashMap<&'static str, CurrencySchedule>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("USD", DEFAULT_SCHEDULE);
    m.insert(
        "EUR",
        CurrencySchedule {
            min_fee_cents: 50,
            processor_pct_bps: 290,
            processor_fixed_cents: 25,
            min_margin_cents: 20,
            legacy_buffer_cents: 25,
            tier_breakpoint_cents: 46_000,
            tier_floor_cents: 92,
        },
    );
    m.insert(
        "GBP",
        CurrencySchedule {
            min_fee_cents: 40,
            processor_pct_bps: 290,
            processor_fixed_cents: 20,
            min_margin_cents: 15,
            legacy_buffer_cents: 20,
            tier_breakpoint_cents: 40_000,
            tier_floor_cents: 80,
        },
    );
    m.insert(
        "NGN",
        CurrencySchedule {
            min_fee_cents: 5_000,
            processor_pct_bps: 150,
            processor_fixed_cents: 10_000,
            min_margin_cents: 2_000,
            legacy_buffer_cents: 10_000,
            tier_breakpoint_cents: 75_000_000,
            tier_floor_cents: 150_000,
        },
    );
    m.insert(
        "GHS",
        CurrencySchedule {
            min_fee_cents: 100,
            processor_pct_bps: 195,
            processor_fixed_cents: 0,
            min_margin_cents: 50,
            legacy_buffer_cents: 50,
            tier_breakpoint_cents: 600_000,
            tier_floor_cents: 1_200,
        },
    );
    m.insert(
        "ZAR",
        CurrencySchedule {
            min_fee_cents: 500,
            processor_pct_bps: 290,
            processor_fixed_cents: 100,
            min_margin_cents: 100,
            legacy_buffer_cents: 100,
            tier_breakpoint_cents: 900_000,
            tier_floor_cents: 1_800,
        },
    );
    m.insert(
        "KES",
        CurrencySchedule {
            min_fee_cents: 5_000,
            processor_pct_bps: 290,
            processor_fixed_cents: 0,
            min_margin_cents: 1_000,
            legacy_buffer_cents: 1_000,
            tier_breakpoint_cents: 6_500_000,
            tier_floor_cents: 13_000,
        },
    );
    m
});

impl CurrencySchedule {
    /// Looks up the schedule for a currency, falling back to USD-shaped
    /// defaults for currencies without an explicit entry.
    pub fn for_currency(currency: &CurrencyCode) -> CurrencySchedule {
        SCHEDULES
            .get(currency.as_str())
            .copied()
            .unwrap_or(DEFAULT_SCHEDULE)
    }
}
