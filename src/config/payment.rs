//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe + Paystack)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_secret_key: SecretString,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    /// Paystack secret API key; also the webhook signing key
    pub paystack_secret_key: SecretString,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_secret_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_secret_key.expose_secret().starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_secret_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_SECRET_KEY"));
        }
        if self.stripe_webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if self.paystack_secret_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYSTACK_SECRET_KEY"));
        }

        // Verify key prefixes for safety
        if !self.stripe_secret_key.expose_secret().starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self
            .stripe_webhook_secret
            .expose_secret()
            .starts_with("whsec_")
        {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !self.paystack_secret_key.expose_secret().starts_with("sk_") {
            return Err(ValidationError::InvalidPaystackKey);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(stripe: &str, webhook: &str, paystack: &str) -> PaymentConfig {
        PaymentConfig {
            stripe_secret_key: SecretString::new(stripe.to_string()),
            stripe_webhook_secret: SecretString::new(webhook.to_string()),
            paystack_secret_key: SecretString::new(paystack.to_string()),
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = config("sk_test_xxx", "whsec_xxx", "sk_test_yyy");
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = config("sk_live_xxx", "whsec_xxx", "sk_live_yyy");
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_validation_missing_api_key() {
        let config = config("", "whsec_xxx", "sk_test_yyy");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = config("pk_test_xxx", "whsec_xxx", "sk_test_yyy");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = config("sk_test_xxx", "secret_xxx", "sk_test_yyy");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_paystack_prefix() {
        let config = config("sk_test_xxx", "whsec_xxx", "pk_test_yyy");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = config("sk_test_abcd1234", "whsec_xyz789", "sk_test_pstk");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = config("sk_test_abcd1234", "whsec_xyz789", "sk_test_pstk");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_test_abcd1234"));
    }
}
