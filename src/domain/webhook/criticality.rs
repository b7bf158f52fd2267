//! Critical event types per provider.
//!
//! A critical event's effects are financial or state-defining. Every
//! handler failure signals retry so the provider's own backoff redelivers
//! the event; membership in the critical list decides how loudly the
//! failure is logged, not whether it retries.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::Provider;

static STRIPE_CRITICAL: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "checkout.session.completed",
        "invoice.paid",
        "invoice.payment_succeeded",
        "customer.subscription.deleted",
        "charge.refunded",
        "charge.dispute.created",
        "charge.dispute.closed",
        "payout.paid",
        "payout.failed",
    ])
});

static PAYSTACK_CRITICAL: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "charge.success",
        "transfer.success",
        "transfer.failed",
        "transfer.reversed",
        "refund.processed",
        "charge.dispute.create",
        "charge.dispute.resolve",
    ])
});

/// Whether a failure on this event type warrants an error-level alert.
pub fn is_critical_event(provider: Provider, event_type: &str) -> bool {
    match provider {
        Provider::Stripe => STRIPE_CRITICAL.contains(event_type),
        Provider::Paystack => PAYSTACK_CRITICAL.contains(event_type),
    }
}
