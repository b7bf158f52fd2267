//! Handler for `account.updated` (Connect onboarding/restriction changes).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::stripe::StripeAccount;
use crate::application::handlers::support::payload;
use crate::domain::foundation::CreatorId;
use crate::domain::webhook::{EventHandler, ProviderEvent, WebhookError};
use crate::ports::{PayoutStatus, ProfileStore};

pub struct AccountUpdatedHandler {
    profiles: Arc<dyn ProfileStore>,
}

impl AccountUpdatedHandler {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl EventHandler for AccountUpdatedHandler {
    fn event_types(&self) -> &'static [&'static str] {
        &["account.updated"]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let account: StripeAccount = payload(event)?;

        // Accounts created outside this platform carry no creator_id and
        // are none of our business.
        let Some(raw_creator) = account.metadata.get("creator_id") else {
            return Err(WebhookError::Ignored(format!(
                "account {} has no creator_id metadata",
                account.id
            )));
        };
        let creator_id = CreatorId::from_str(raw_creator)
            .map_err(|_| WebhookError::MissingMetadata("creator_id"))?;

        let status = PayoutStatus::from_account_flags(
            account.charges_enabled,
            account.payouts_enabled,
            account
                .requirements
                .as_ref()
                .is_some_and(|r| r.disabled_reason.is_some()),
        );
        self.profiles.set_payout_status(&creator_id, status).await?;
        info!(
            event_id = %event.id,
            creator_id = %creator_id,
            status = status.as_str(),
            "payout status updated"
        );
        Ok(())
    }
}
