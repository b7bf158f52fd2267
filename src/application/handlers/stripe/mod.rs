//! Stripe event handlers.

mod account_updated;
mod checkout_completed;
mod disputes;
mod invoice_failed;
mod invoice_paid;
mod payouts;
mod refunds;
mod subscription_deleted;
mod subscription_updated;

pub use account_updated::AccountUpdatedHandler;
pub use checkout_completed::CheckoutCompletedHandler;
pub use disputes::DisputeHandler;
pub use invoice_failed::InvoiceFailedHandler;
pub use invoice_paid::InvoicePaidHandler;
pub use payouts::PayoutSettlementHandler;
pub(crate) use payouts::reconcile_payout;
pub use refunds::ChargeRefundedHandler;
pub use subscription_deleted::SubscriptionDeletedHandler;
pub use subscription_updated::SubscriptionUpdatedHandler;
