//! Activity audit rows.
//!
//! Every financially meaningful event leaves one of these behind. The
//! notification dispatcher that turns them into emails/SMS lives outside
//! this crate; here they are the audit trail and the trigger record.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::foundation::{ActivityId, CreatorId, SubscriberId, Timestamp};

/// One audit entry: a type tag plus a free-form JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub creator_id: CreatorId,
    pub subscriber_id: Option<SubscriberId>,
    /// Dispatcher-facing tag, e.g. `new_subscription`, `payment_refunded`,
    /// `payout_mismatch`, `debit_recovery_failed`.
    pub activity_type: String,
    pub payload: Value,
    pub created_at: Timestamp,
}

impl Activity {
    pub fn new(
        creator_id: CreatorId,
        subscriber_id: Option<SubscriberId>,
        activity_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            creator_id,
            subscriber_id,
            activity_type: activity_type.into(),
            payload,
            created_at: Timestamp::now(),
        }
    }

    /// Audit entry for a best-effort side effect that failed; these must
    /// always exist so operators can see what did not happen.
    pub fn side_effect_failure(
        creator_id: CreatorId,
        activity_type: impl Into<String>,
        error: &str,
        context: Value,
    ) -> Self {
        Self::new(
            creator_id,
            None,
            activity_type,
            json!({ "error": error, "context": context }),
        )
    }
}
