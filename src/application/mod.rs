//! Application layer: webhook routing and the per-event-type handlers.
//!
//! Handlers orchestrate domain operations through the ports; the router
//! wraps them in the idempotent processor and maps outcomes onto the
//! HTTP contract the providers expect.

pub mod handlers;
pub mod metadata;
pub mod payouts;
pub mod router;

/// Ceiling on what a single renewal or payout may claw back toward an
/// outstanding platform debit.
pub(crate) const DEBIT_RECOVERY_CAP_CENTS: i64 = 5_000;

pub use metadata::CheckoutMetadata;
pub use payouts::PayoutInitiator;
pub use router::{ProviderHandlerRegistry, WebhookResponse, WebhookRouter};
