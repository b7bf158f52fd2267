//! Profile store port.
//!
//! The creator profile is owned elsewhere; this core reads and writes a
//! narrow projection of it: payout status, accumulated platform debit, the
//! fee-rate selector and the opaque transfer credentials.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::fees::Purpose;
use crate::domain::foundation::{CreatorId, DomainError};

/// Tri-state payout capability projected from provider account flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStatus {
    /// Onboarding incomplete; payouts not yet possible.
    Pending,
    /// Charges and payouts enabled.
    Active,
    /// Provider disabled the account; operator attention needed.
    Restricted,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Active => "active",
            PayoutStatus::Restricted => "restricted",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "active" => PayoutStatus::Active,
            "restricted" => PayoutStatus::Restricted,
            _ => PayoutStatus::Pending,
        }
    }

    /// Maps provider account flags onto the tri-state.
    pub fn from_account_flags(
        charges_enabled: bool,
        payouts_enabled: bool,
        has_disabled_reason: bool,
    ) -> Self {
        if has_disabled_reason {
            PayoutStatus::Restricted
        } else if charges_enabled && payouts_enabled {
            PayoutStatus::Active
        } else {
            PayoutStatus::Pending
        }
    }
}

/// The slice of the creator profile this core touches.
#[derive(Debug, Clone)]
pub struct Profile {
    pub creator_id: CreatorId,
    pub email: String,
    pub payout_status: PayoutStatus,
    /// Shortfall owed to the platform by a lapsed service-tier creator;
    /// recovered in capped per-cycle increments, never negative.
    pub platform_debit_cents: i64,
    /// Fee-rate selector.
    pub purpose: Purpose,
    /// Opaque transfer-recipient handle (encrypted at rest).
    pub transfer_recipient_code: Option<SecretString>,
    /// Saved charge authorization for best-effort debit recovery.
    pub saved_payment_method: Option<SecretString>,
}

/// Store port for the creator-profile projection.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_creator(&self, creator_id: &CreatorId)
        -> Result<Option<Profile>, DomainError>;

    async fn set_payout_status(
        &self,
        creator_id: &CreatorId,
        status: PayoutStatus,
    ) -> Result<(), DomainError>;

    /// Atomically decrements the platform debit, clamped at zero, and
    /// returns the amount actually recovered. Always paired with an audit
    /// activity by the caller.
    async fn decrement_platform_debit(
        &self,
        creator_id: &CreatorId,
        cents: i64,
    ) -> Result<i64, DomainError>;

    async fn update(&self, profile: &Profile) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_flags_project_to_tri_state() {
        assert_eq!(
            PayoutStatus::from_account_flags(true, true, false),
            PayoutStatus::Active
        );
        assert_eq!(
            PayoutStatus::from_account_flags(true, false, false),
            PayoutStatus::Pending
        );
        // A disabled reason wins over enabled flags.
        assert_eq!(
            PayoutStatus::from_account_flags(true, true, true),
            PayoutStatus::Restricted
        );
    }

    #[test]
    fn profile_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ProfileStore) {}
    }
}
