//! Stripe adapter: webhook payload types.

pub mod webhook_types;

pub use webhook_types::{
    StripeAccount, StripeCharge, StripeCheckoutSession, StripeDispute, StripeInvoice,
    StripePayout, StripeSubscription, StripeWebhookEvent,
};
