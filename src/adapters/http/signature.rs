//! Webhook signature verification.
//!
//! Stripe signs `"{t}.{body}"` with HMAC-SHA256 and sends
//! `t=<ts>,v1=<hex>` in `Stripe-Signature`; Paystack signs the raw body
//! with HMAC-SHA512 and sends the hex digest in `x-paystack-signature`.
//! Both comparisons are constant-time.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{Provider, WebhookError};
use crate::ports::SignatureVerifier;

/// Maximum allowed age for a Stripe signature timestamp (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Tolerated clock skew for future timestamps (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of a `Stripe-Signature` header.
///
/// Format: `t=<timestamp>,v1=<hex>[,v0=<legacy>]`; unknown fields are
/// ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl StripeSignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                return Err(WebhookError::ParseError(
                    "invalid signature header format".to_string(),
                ));
            };

            match key.trim() {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid signature timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookError::ParseError("missing signature timestamp".to_string())
        })?;
        let v1_signature = v1_signature
            .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?;

        Ok(StripeSignatureHeader {
            timestamp,
            v1_signature,
        })
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// HMAC verifier holding both providers' signing secrets.
pub struct HmacSignatureVerifier {
    stripe_webhook_secret: SecretString,
    paystack_secret_key: SecretString,
}

impl HmacSignatureVerifier {
    pub fn new(stripe_webhook_secret: SecretString, paystack_secret_key: SecretString) -> Self {
        Self {
            stripe_webhook_secret,
            paystack_secret_key,
        }
    }

    fn verify_stripe(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let header = StripeSignatureHeader::parse(signature_header)?;

        let age = Timestamp::now().as_unix_secs() - header.timestamp;
        if age > MAX_EVENT_AGE_SECS || age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::ParseError(
                "signature timestamp out of range".to_string(),
            ));
        }

        let signed_payload = format!(
            "{}.{}",
            header.timestamp,
            String::from_utf8_lossy(payload)
        );
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.stripe_webhook_secret.expose_secret().as_bytes())
                .map_err(|_| WebhookError::ParseError("invalid signing secret".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(WebhookError::ParseError(
                "signature verification failed".to_string(),
            ));
        }

        Ok(())
    }

    fn verify_paystack(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let provided = hex::decode(signature_header.trim())
            .map_err(|_| WebhookError::ParseError("invalid signature hex".to_string()))?;

        let mut mac =
            Hmac::<Sha512>::new_from_slice(self.paystack_secret_key.expose_secret().as_bytes())
                .map_err(|_| WebhookError::ParseError("invalid signing secret".to_string()))?;
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if !constant_time_compare(&expected, &provided) {
            return Err(WebhookError::ParseError(
                "signature verification failed".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl SignatureVerifier for HmacSignatureVerifier {
    async fn verify(
        &self,
        provider: Provider,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), WebhookError> {
        match provider {
            Provider::Stripe => self.verify_stripe(payload, signature_header),
            Provider::Paystack => self.verify_paystack(payload, signature_header),
        }
    }
}
