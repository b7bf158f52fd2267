//! The verified provider event envelope.
//!
//! Signature verification happens before this core is invoked, so the
//! envelope itself is authentic; but the *embedded* metadata (creator id,
//! fee amounts) is still untrusted and gets its own structural validation
//! in the handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;

/// Payment provider the event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paystack,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Paystack => "paystack",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "stripe" => Some(Provider::Stripe),
            "paystack" => Some(Provider::Paystack),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, signature-verified provider event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub provider: Provider,
    /// The provider's own event id (`evt_...` for Stripe; Paystack events
    /// carry no id, so the adapter synthesizes one from stable payload
    /// fields).
    pub id: String,
    /// Provider event-type string, e.g. `checkout.session.completed`,
    /// `charge.success`.
    pub event_type: String,
    /// Provider-reported creation time, when the envelope carries one.
    pub created: Option<i64>,
    /// Provider-specific payload; handlers deserialize the shape they
    /// expect and validate before trusting any field.
    pub data: Value,
}

impl ProviderEvent {
    /// Ledger key: prefixed with the provider so ids can never collide
    /// across providers.
    pub fn ledger_event_id(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }

    /// Provider-reported timestamp, falling back to now.
    pub fn occurred_at(&self) -> Timestamp {
        self.created
            .map(Timestamp::from_unix_secs)
            .unwrap_or_else(Timestamp::now)
    }
}
