//! Webhook event handlers, one module per provider.

pub mod paystack;
pub mod stripe;

mod support;
