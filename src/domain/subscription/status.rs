//! Subscription status state machine.
//!
//! `none -> active <-> past_due -> canceled` with `canceled` terminal for
//! provider-driven transitions; `paused` holds unmapped provider statuses.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Current state of a subscription in the payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paying normally.
    Active,

    /// Most recent charge failed; dunning in progress.
    PastDue,

    /// Terminated, either by the subscriber or by exhausted dunning.
    /// Re-subscription reuses the same row (upsert), so this is terminal
    /// for the status machine but not for the row.
    Canceled,

    /// Provider reported a status we do not map; held rather than guessed.
    Paused,
}

impl SubscriptionStatus {
    /// Maps a provider's subscription-status vocabulary onto ours.
    ///
    /// Unmapped statuses (`trialing`, `incomplete`, `unpaid`, ...) land in
    /// `Paused` so they are visible rather than silently coerced.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Paused,
        }
    }

    /// Stored string tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Paused => "paused",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // Renewal; also the past-due recovery path.
            (Active, Active)
                | (Active, PastDue)
                | (Active, Canceled)
                | (Active, Paused)
                | (PastDue, Active)
                | (PastDue, Canceled)
                | (PastDue, Paused)
                | (Paused, Active)
                | (Paused, PastDue)
                | (Paused, Canceled)
            // Canceled is terminal: reactivation goes through the
            // charge-driven upsert path, which resets the row.
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Active => vec![Active, PastDue, Canceled, Paused],
            PastDue => vec![Active, Canceled, Paused],
            Paused => vec![Active, PastDue, Canceled],
            Canceled => vec![],
        }
    }
}
