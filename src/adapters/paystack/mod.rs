//! Paystack adapter: webhook payload types and the transfer API client.

pub mod transfer_client;
pub mod webhook_types;

pub use transfer_client::PaystackTransferClient;
pub use webhook_types::{
    PaystackCharge, PaystackDispute, PaystackRefund, PaystackSubscription, PaystackTransfer,
    PaystackWebhookEvent,
};
