//! User directory port.
//!
//! Subscriber identity is owned by the accounts system; this core only
//! needs to resolve (or lazily create) a subscriber from the email on a
//! checkout event.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriberId};

/// Port for subscriber identity resolution.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds the subscriber for an email, creating a stub account when
    /// none exists yet. Emails are matched case-insensitively.
    async fn find_or_create_by_email(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<SubscriberId, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directory_is_object_safe() {
        fn _accepts_dyn(_directory: &dyn UserDirectory) {}
    }
}
