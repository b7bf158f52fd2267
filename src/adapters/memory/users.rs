//! In-memory user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SubscriberId};
use crate::ports::UserDirectory;

#[derive(Default)]
pub struct InMemoryUserDirectory {
    // keyed by lowercased email
    by_email: RwLock<HashMap<String, SubscriberId>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a known subscriber. Test helper.
    pub async fn seed(&self, email: &str, id: SubscriberId) {
        self.by_email
            .write()
            .await
            .insert(email.to_ascii_lowercase(), id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_or_create_by_email(
        &self,
        email: &str,
        _display_name: Option<&str>,
    ) -> Result<SubscriberId, DomainError> {
        let key = email.trim().to_ascii_lowercase();
        let mut by_email = self.by_email.write().await;
        Ok(*by_email.entry(key).or_insert_with(SubscriberId::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn email_match_is_case_insensitive() {
        let directory = InMemoryUserDirectory::new();
        let first = directory
            .find_or_create_by_email("Fan@Example.com", None)
            .await
            .unwrap();
        let second = directory
            .find_or_create_by_email("fan@example.com", Some("Fan"))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_email_creates_a_stub() {
        let directory = InMemoryUserDirectory::new();
        let a = directory
            .find_or_create_by_email("a@example.com", None)
            .await
            .unwrap();
        let b = directory
            .find_or_create_by_email("b@example.com", None)
            .await
            .unwrap();
        assert_ne!(a, b);
    }
}
