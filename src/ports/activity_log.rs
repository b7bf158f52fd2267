//! Activity log port.
//!
//! Append-only sink for audit rows; the notification dispatcher that
//! consumes them lives outside this crate.

use async_trait::async_trait;

use crate::domain::foundation::{CreatorId, DomainError};
use crate::domain::ledger::Activity;

/// Append-only store for audit activities.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: &Activity) -> Result<(), DomainError>;

    /// Recent activities for a creator, newest first (operator tooling).
    async fn recent_for_creator(
        &self,
        creator_id: &CreatorId,
        limit: u32,
    ) -> Result<Vec<Activity>, DomainError>;
}
