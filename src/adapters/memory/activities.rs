//! In-memory activity log.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CreatorId, DomainError};
use crate::domain::ledger::Activity;
use crate::ports::ActivityLog;

#[derive(Default)]
pub struct InMemoryActivityLog {
    activities: RwLock<Vec<Activity>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded activity, oldest first. Test helper.
    pub async fn all(&self) -> Vec<Activity> {
        self.activities.read().await.clone()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, activity: &Activity) -> Result<(), DomainError> {
        self.activities.write().await.push(activity.clone());
        Ok(())
    }

    async fn recent_for_creator(
        &self,
        creator_id: &CreatorId,
        limit: u32,
    ) -> Result<Vec<Activity>, DomainError> {
        let activities = self.activities.read().await;
        let mut matching: Vec<Activity> = activities
            .iter()
            .filter(|a| &a.creator_id == creator_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.as_unix_secs().cmp(&a.created_at.as_unix_secs()));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
