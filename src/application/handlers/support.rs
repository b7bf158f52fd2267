//! Shared helpers for webhook event handlers.

use serde::de::DeserializeOwned;

use crate::domain::foundation::CurrencyCode;
use crate::domain::webhook::{ProviderEvent, WebhookError};

/// Deserializes the event's data payload into its provider-specific shape.
pub(crate) fn payload<T: DeserializeOwned>(event: &ProviderEvent) -> Result<T, WebhookError> {
    serde_json::from_value(event.data.clone()).map_err(|e| {
        WebhookError::ParseError(format!("{} payload: {}", event.event_type, e))
    })
}

/// Parses a provider currency string (Stripe sends lowercase).
pub(crate) fn currency(code: Option<&str>) -> Result<CurrencyCode, WebhookError> {
    let code = code.ok_or(WebhookError::MissingField("currency"))?;
    CurrencyCode::parse(code).map_err(|e| WebhookError::ParseError(e.to_string()))
}
