//! Webhook domain: the provider event envelope, the error taxonomy with
//! its HTTP mapping, the critical-event-type sets, and the idempotent
//! processor that coordinates the event ledger with the handlers.

mod criticality;
mod errors;
mod event;
mod processor;

pub use criticality::is_critical_event;
pub use errors::WebhookError;
pub use event::{Provider, ProviderEvent};
pub use processor::{EventHandler, HandlerRegistry, IdempotentWebhookProcessor, WebhookOutcome};
