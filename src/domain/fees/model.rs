//! Fee model vocabulary: model tags, modes, purposes, and the breakdown
//! produced by every calculation.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::CurrencyCode;

/// Which pricing model a subscription or payment was created under.
///
/// Stored as an explicit tag on the row. Legacy rows predate tagging and
/// carry NULL, which maps to [`FeeModel::LegacyFlat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeModel {
    /// Original flat rate deducted from the creator's amount.
    LegacyFlat,
    /// Flat per-purpose rate with fee-mode choice and currency floors.
    FlatV1,
    /// 4%/4% two-sided split with processor-cost buffering.
    SplitV1,
    /// Marginal-rate model; present but not the active billing path for
    /// webhooks.
    TieredV2 { founding: bool, direction: Direction },
}

impl FeeModel {
    /// Parses the stored model tag.
    ///
    /// `None` (a legacy row) and unrecognized tags both map to the legacy
    /// model: rows written before tagging must keep computing as they always
    /// have. `progressive*` tags are the tiered family.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("flat") => FeeModel::FlatV1,
            Some("split_v1") => FeeModel::SplitV1,
            Some(t) if t.starts_with("progressive") => FeeModel::TieredV2 {
                founding: t.contains("founding"),
                direction: Direction::RecipientPays,
            },
            _ => FeeModel::LegacyFlat,
        }
    }

    /// Returns the stored tag for this model, or `None` for legacy.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            FeeModel::LegacyFlat => None,
            FeeModel::FlatV1 => Some("flat"),
            FeeModel::SplitV1 => Some("split_v1"),
            FeeModel::TieredV2 { founding: true, .. } => Some("progressive_founding"),
            FeeModel::TieredV2 { founding: false, .. } => Some("progressive"),
        }
    }
}

/// Which party's side absorbs the platform fee.
///
/// Locked at subscription creation and never mutated on renewal; the stored
/// `amount` is the creator's set price, whose relationship to gross/net
/// depends on this mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// Creator absorbs: gross = amount, net = amount - fee.
    Absorb,
    /// Subscriber pays on top: gross = amount + fee, net = amount.
    PassToSubscriber,
    /// Both sides share (split model).
    Split,
}

impl FeeMode {
    /// Parses the stored mode tag; unrecognized values default to absorb,
    /// the historical behavior.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("pass_to_subscriber") => FeeMode::PassToSubscriber,
            Some("split") => FeeMode::Split,
            _ => FeeMode::Absorb,
        }
    }

    /// Returns the stored tag for this mode.
    pub fn tag(&self) -> &'static str {
        match self {
            FeeMode::Absorb => "absorb",
            FeeMode::PassToSubscriber => "pass_to_subscriber",
            FeeMode::Split => "split",
        }
    }
}

/// Fee-rate selector carried on the creator profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Service-tier creators: 8% base rate.
    Service,
    /// Personal creators: 10% base rate.
    Personal,
}

impl Purpose {
    /// Base platform rate in basis points.
    pub fn base_rate_bps(&self) -> i64 {
        match self {
            Purpose::Service => 800,
            Purpose::Personal => 1_000,
        }
    }
}

/// Who covers the processing fee under the tiered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fee comes out of the amount; recipient receives amount - fee.
    RecipientPays,
    /// Payer is grossed up so the recipient receives the full amount.
    PayerPays,
}

/// Input to a fee calculation.
#[derive(Debug, Clone)]
pub struct FeeInput {
    /// The creator's set price in minor currency units (the fee base, not
    /// necessarily what the payer is charged).
    pub amount_cents: i64,
    pub currency: CurrencyCode,
    pub purpose: Purpose,
    pub mode: FeeMode,
    /// Adds the +1.5% cross-border buffer to the base rate (flat v1 only).
    pub cross_border: bool,
}

/// Result of a fee calculation: the three settlement amounts plus the audit
/// metadata snapshotted onto the payment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeBreakdown {
    /// Total platform fee collected across both sides.
    pub fee_cents: i64,
    /// What the paying party is charged.
    pub gross_cents: i64,
    /// What the creator receives.
    pub net_cents: i64,
    /// Portion of the fee charged on top to the subscriber.
    pub subscriber_fee_cents: i64,
    /// Portion of the fee deducted from the creator's side.
    pub creator_fee_cents: i64,
    /// Effective rate relative to the base amount, in basis points.
    pub effective_rate_bps: i64,
    /// True when a floor or processor buffer overrode the naive percentage.
    pub was_capped: bool,
    /// The model that produced this breakdown.
    pub model: FeeModel,
}

impl FeeBreakdown {
    /// All-zero breakdown for a zero amount.
    pub fn zero(model: FeeModel) -> Self {
        Self {
            fee_cents: 0,
            gross_cents: 0,
            net_cents: 0,
            subscriber_fee_cents: 0,
            creator_fee_cents: 0,
            effective_rate_bps: 0,
            was_capped: false,
            model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_tag_roundtrips() {
        for model in [FeeModel::FlatV1, FeeModel::SplitV1] {
            assert_eq!(FeeModel::from_tag(model.tag()), model);
        }
    }

    #[test]
    fn null_tag_is_legacy() {
        assert_eq!(FeeModel::from_tag(None), FeeModel::LegacyFlat);
    }

    #[test]
    fn unknown_tag_is_legacy() {
        assert_eq!(FeeModel::from_tag(Some("experimental_v9")), FeeModel::LegacyFlat);
    }

    #[test]
    fn progressive_tags_map_to_tiered() {
        assert_eq!(
            FeeModel::from_tag(Some("progressive")),
            FeeModel::TieredV2 {
                founding: false,
                direction: Direction::RecipientPays
            }
        );
        assert_eq!(
            FeeModel::from_tag(Some("progressive_founding")),
            FeeModel::TieredV2 {
                founding: true,
                direction: Direction::RecipientPays
            }
        );
    }

    #[test]
    fn mode_defaults_to_absorb() {
        assert_eq!(FeeMode::from_tag(None), FeeMode::Absorb);
        assert_eq!(FeeMode::from_tag(Some("unexpected")), FeeMode::Absorb);
    }

    #[test]
    fn purpose_rates() {
        assert_eq!(Purpose::Service.base_rate_bps(), 800);
        assert_eq!(Purpose::Personal.base_rate_bps(), 1_000);
    }
}
