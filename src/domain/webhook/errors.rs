//! Webhook error taxonomy, with retryability semantics and HTTP mapping.
//!
//! The provider only ever sees 200 (accepted, possibly a no-op), 400
//! (malformed, do not retry) or 500 (please retry). Which failures earn a
//! 500 is decided here; the router passes every handler failure through
//! and only varies how loudly it logs it.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ValidationError};

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Failed to parse the webhook payload.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing or malformed on the event. Embedded
    /// metadata is untrusted even on a verified envelope; this fails loudly
    /// rather than corrupting the ledger.
    #[error("missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from the payload body.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Referenced subscription could not be found.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Original payment for a refund/dispute could not be located.
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// Attempted state transition is not valid.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// Payout reconciliation mismatch: webhook-reported amount/currency
    /// disagrees with the stored payout row. Never auto-corrected.
    #[error("payout mismatch: {0}")]
    PayoutMismatch(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("event ignored: {0}")]
    Ignored(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Lock-store operation failed (not "lock busy"; that is a skip).
    #[error("lock error: {0}")]
    Lock(String),

    /// Outbound provider API call failed.
    #[error("provider error: {0}")]
    Provider(String),
}

impl WebhookError {
    /// Whether the provider should retry delivering this webhook.
    ///
    /// Transient failures may succeed on redelivery; structural ones never
    /// will. `SubscriptionNotFound`/`PaymentNotFound` are retryable because
    /// the row may simply not have landed yet (event-ordering races).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::Lock(_)
                | WebhookError::Provider(_)
                | WebhookError::SubscriptionNotFound(_)
                | WebhookError::PaymentNotFound(_)
                | WebhookError::PayoutMismatch(_)
        )
    }

    /// HTTP status for this error when the event type is critical.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            // Acknowledged as success so the provider stops redelivering.
            WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::SubscriptionNotFound(_)
            | WebhookError::PaymentNotFound(_)
            | WebhookError::InvalidTransition(_)
            | WebhookError::PayoutMismatch(_)
            | WebhookError::Database(_)
            | WebhookError::Lock(_)
            | WebhookError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

impl From<ValidationError> for WebhookError {
    fn from(err: ValidationError) -> Self {
        WebhookError::InvalidTransition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(WebhookError::Database("connection reset".into()).is_retryable());
        assert!(WebhookError::Lock("redis timeout".into()).is_retryable());
        assert!(WebhookError::Provider("paystack 503".into()).is_retryable());
    }

    #[test]
    fn not_found_is_retryable_for_ordering_races() {
        assert!(WebhookError::SubscriptionNotFound("sub_x".into()).is_retryable());
        assert!(WebhookError::PaymentNotFound("ch_x".into()).is_retryable());
    }

    #[test]
    fn malformed_input_is_not_retryable() {
        assert!(!WebhookError::ParseError("bad json".into()).is_retryable());
        assert!(!WebhookError::MissingMetadata("creator_id").is_retryable());
        assert!(!WebhookError::Ignored("no handler".into()).is_retryable());
    }

    #[test]
    fn payout_mismatch_forces_retry_and_500() {
        let err = WebhookError::PayoutMismatch("amount 100 != 200".into());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_input_maps_to_400() {
        assert_eq!(
            WebhookError::MissingMetadata("creator_id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::ParseError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn ignored_maps_to_200() {
        assert_eq!(
            WebhookError::Ignored("cosmetic".into()).status_code(),
            StatusCode::OK
        );
    }
}
