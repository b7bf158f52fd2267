//! Checkout metadata validation.
//!
//! Event envelopes are signature-verified upstream, but the metadata
//! embedded in them (creator id, fee fields) is attached by our own
//! checkout layer and travels through the provider; structurally
//! untrusted. Malformed metadata fails loudly here; it must never
//! silently corrupt the ledger.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;

use crate::domain::fees::FeeMode;
use crate::domain::foundation::CreatorId;
use crate::domain::subscription::Interval;
use crate::domain::webhook::WebhookError;

/// Validated checkout metadata.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub creator_id: CreatorId,
    pub tier_id: Option<String>,
    pub tier_name: Option<String>,
    pub interval: Interval,
    /// Fee model the charge was priced under; recorded on the event so a
    /// later rate change never retroactively changes this charge.
    pub fee_model: Option<String>,
    pub fee_mode: FeeMode,
    pub cross_border: bool,
    /// Creator's set price as the checkout layer recorded it; the fee base
    /// for pass-to-subscriber sessions where the charged total is not it.
    pub net_amount_cents: Option<i64>,
    /// Fee the checkout layer quoted, cross-checked against our own
    /// computation.
    pub service_fee_cents: Option<i64>,
    /// Deferred-attribution fields for asynchronous payment methods.
    pub view_id: Option<String>,
    pub request_id: Option<String>,
}

impl CheckoutMetadata {
    /// Validates Stripe-style string-map metadata.
    ///
    /// # Errors
    ///
    /// `WebhookError::MissingMetadata("creator_id")` when the creator id
    /// is absent or not a well-formed id.
    pub fn from_string_map(metadata: &HashMap<String, String>) -> Result<Self, WebhookError> {
        let creator_id = metadata
            .get("creator_id")
            .and_then(|raw| CreatorId::from_str(raw).ok())
            .ok_or(WebhookError::MissingMetadata("creator_id"))?;

        Ok(Self {
            creator_id,
            tier_id: non_empty(metadata.get("tier_id")),
            tier_name: non_empty(metadata.get("tier_name")),
            interval: metadata
                .get("interval")
                .map(|s| Interval::from_tag(s))
                .unwrap_or(Interval::Month),
            fee_model: non_empty(metadata.get("fee_model")),
            fee_mode: FeeMode::from_tag(metadata.get("fee_mode").map(String::as_str)),
            cross_border: metadata.get("cross_border").map(String::as_str) == Some("true"),
            net_amount_cents: parse_cents(metadata.get("net_amount")),
            service_fee_cents: parse_cents(metadata.get("service_fee")),
            view_id: non_empty(metadata.get("view_id")),
            request_id: non_empty(metadata.get("request_id")),
        })
    }

    /// Validates Paystack-style JSON metadata ([`Value`] object).
    pub fn from_json(metadata: &Value) -> Result<Self, WebhookError> {
        let object = metadata
            .as_object()
            .ok_or(WebhookError::MissingMetadata("creator_id"))?;
        let as_map: HashMap<String, String> = object
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.clone(), s.clone())),
                Value::Bool(b) => Some((k.clone(), b.to_string())),
                Value::Number(n) => Some((k.clone(), n.to_string())),
                _ => None,
            })
            .collect();
        Self::from_string_map(&as_map)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

fn parse_cents(value: Option<&String>) -> Option<i64> {
    value.and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_map() -> HashMap<String, String> {
        HashMap::from([
            ("creator_id".to_string(), CreatorId::new().to_string()),
            ("interval".to_string(), "month".to_string()),
            ("fee_model".to_string(), "flat".to_string()),
            ("fee_mode".to_string(), "pass_to_subscriber".to_string()),
        ])
    }

    #[test]
    fn parses_well_formed_metadata() {
        let metadata = CheckoutMetadata::from_string_map(&base_map()).unwrap();
        assert_eq!(metadata.interval, Interval::Month);
        assert_eq!(metadata.fee_model.as_deref(), Some("flat"));
        assert_eq!(metadata.fee_mode, FeeMode::PassToSubscriber);
        assert!(!metadata.cross_border);
    }

    #[test]
    fn missing_creator_id_fails_loudly() {
        let mut map = base_map();
        map.remove("creator_id");
        let err = CheckoutMetadata::from_string_map(&map).unwrap_err();
        assert!(matches!(err, WebhookError::MissingMetadata("creator_id")));
    }

    #[test]
    fn malformed_creator_id_fails_loudly() {
        let mut map = base_map();
        map.insert("creator_id".to_string(), "not-a-uuid".to_string());
        let err = CheckoutMetadata::from_string_map(&map).unwrap_err();
        assert!(matches!(err, WebhookError::MissingMetadata("creator_id")));
    }

    #[test]
    fn empty_optional_fields_become_none() {
        let mut map = base_map();
        map.insert("tier_id".to_string(), "".to_string());
        let metadata = CheckoutMetadata::from_string_map(&map).unwrap();
        assert!(metadata.tier_id.is_none());
    }

    #[test]
    fn amount_fields_parse_as_cents() {
        let mut map = base_map();
        map.insert("net_amount".to_string(), "10000".to_string());
        map.insert("service_fee".to_string(), "1000".to_string());
        let metadata = CheckoutMetadata::from_string_map(&map).unwrap();
        assert_eq!(metadata.net_amount_cents, Some(10_000));
        assert_eq!(metadata.service_fee_cents, Some(1_000));
    }

    #[test]
    fn json_metadata_accepts_mixed_value_types() {
        let creator = CreatorId::new();
        let metadata = CheckoutMetadata::from_json(&json!({
            "creator_id": creator.to_string(),
            "interval": "one_time",
            "cross_border": true,
        }))
        .unwrap();
        assert_eq!(metadata.creator_id, creator);
        assert_eq!(metadata.interval, Interval::OneTime);
        assert!(metadata.cross_border);
    }

    #[test]
    fn non_object_json_metadata_is_rejected() {
        assert!(CheckoutMetadata::from_json(&json!("string")).is_err());
        assert!(CheckoutMetadata::from_json(&json!(null)).is_err());
    }
}
