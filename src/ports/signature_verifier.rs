//! Signature verifier port.
//!
//! Webhook signature algorithms belong to an outer layer; the HTTP surface
//! only needs a yes/no on the raw body + header before parsing. Events
//! reaching the processor are authentic at the envelope level; their
//! embedded metadata still gets structural validation in the handlers.

use async_trait::async_trait;

use crate::domain::webhook::{Provider, WebhookError};

/// Port for provider webhook signature verification.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verifies the raw request body against the provider's signature
    /// header.
    ///
    /// # Errors
    ///
    /// `WebhookError::ParseError` for a missing/unverifiable signature.
    async fn verify(
        &self,
        provider: Provider,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), WebhookError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifier_is_object_safe() {
        fn _accepts_dyn(_verifier: &dyn SignatureVerifier) {}
    }
}
