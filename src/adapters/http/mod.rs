//! HTTP adapters: the webhook ingestion surface.

mod signature;
mod webhooks;

pub use signature::{HmacSignatureVerifier, StripeSignatureHeader};
pub use webhooks::{webhook_routes, WebhookAppState};
