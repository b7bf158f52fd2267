//! Paystack event handlers.

mod charge_success;
mod disputes;
mod refunds;
mod subscription_events;
mod transfers;

pub use charge_success::PaystackChargeHandler;
pub use disputes::PaystackDisputeHandler;
pub use refunds::PaystackRefundHandler;
pub use subscription_events::PaystackSubscriptionHandler;
pub use transfers::PaystackTransferHandler;
