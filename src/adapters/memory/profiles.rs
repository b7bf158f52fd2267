//! In-memory profile store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CreatorId, DomainError, ErrorCode};
use crate::ports::{PayoutStatus, Profile, ProfileStore};

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<CreatorId, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.creator_id, profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Option<Profile>, DomainError> {
        Ok(self.profiles.read().await.get(creator_id).cloned())
    }

    async fn set_payout_status(
        &self,
        creator_id: &CreatorId,
        status: PayoutStatus,
    ) -> Result<(), DomainError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.get_mut(creator_id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("no profile for creator {}", creator_id),
            )
        })?;
        profile.payout_status = status;
        Ok(())
    }

    async fn decrement_platform_debit(
        &self,
        creator_id: &CreatorId,
        cents: i64,
    ) -> Result<i64, DomainError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.get_mut(creator_id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("no profile for creator {}", creator_id),
            )
        })?;
        let recovered = cents.min(profile.platform_debit_cents).max(0);
        profile.platform_debit_cents -= recovered;
        Ok(recovered)
    }

    async fn update(&self, profile: &Profile) -> Result<(), DomainError> {
        self.profiles
            .write()
            .await
            .insert(profile.creator_id, profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fees::Purpose;

    fn profile(debit: i64) -> Profile {
        Profile {
            creator_id: CreatorId::new(),
            email: "creator@example.com".into(),
            payout_status: PayoutStatus::Active,
            platform_debit_cents: debit,
            purpose: Purpose::Personal,
            transfer_recipient_code: None,
            saved_payment_method: None,
        }
    }

    #[tokio::test]
    async fn debit_decrement_clamps_at_zero() {
        let store = InMemoryProfileStore::new();
        let p = profile(3_00);
        let creator = p.creator_id;
        store.seed(p).await;

        let recovered = store.decrement_platform_debit(&creator, 5_00).await.unwrap();
        assert_eq!(recovered, 3_00);

        let remaining = store.find_by_creator(&creator).await.unwrap().unwrap();
        assert_eq!(remaining.platform_debit_cents, 0);

        // Nothing left to recover.
        let recovered = store.decrement_platform_debit(&creator, 5_00).await.unwrap();
        assert_eq!(recovered, 0);
    }

    #[tokio::test]
    async fn payout_status_roundtrips() {
        let store = InMemoryProfileStore::new();
        let p = profile(0);
        let creator = p.creator_id;
        store.seed(p).await;

        store
            .set_payout_status(&creator, PayoutStatus::Restricted)
            .await
            .unwrap();
        let got = store.find_by_creator(&creator).await.unwrap().unwrap();
        assert_eq!(got.payout_status, PayoutStatus::Restricted);
    }
}
