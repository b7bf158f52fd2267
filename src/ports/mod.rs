//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `SubscriptionStore` - Subscription aggregate persistence (transactional multi-row writes)
//! - `PaymentStore` - Immutable payment ledger with unique provider event ids
//! - `ProfileStore` - Creator-profile projection (payout status, platform debit)
//! - `ActivityLog` - Append-only audit rows
//! - `WebhookEventRepository` - Durable webhook idempotency ledger
//!
//! ## Infrastructure Ports
//!
//! - `DistributedLock` - TTL lock over business keys, with `with_lock` skip-on-busy
//! - `TransferGateway` - Outbound payout/transfer API
//! - `UserDirectory` - Subscriber resolution by email
//! - `SignatureVerifier` - Webhook signature check at the HTTP boundary

mod activity_log;
mod distributed_lock;
mod payment_store;
mod profile_store;
mod signature_verifier;
mod subscription_store;
mod transfer_gateway;
mod user_directory;
mod webhook_event_repository;

pub use activity_log::ActivityLog;
pub use distributed_lock::{
    invoice_lock_key, payout_lock_key, subscription_lock_key, with_lock, DistributedLock,
    LockOutcome, LockToken, LOCK_TTL,
};
pub use payment_store::PaymentStore;
pub use profile_store::{PayoutStatus, Profile, ProfileStore};
pub use signature_verifier::SignatureVerifier;
pub use subscription_store::SubscriptionStore;
pub use transfer_gateway::{TransferGateway, TransferInitiation, TransferRecipient};
pub use user_directory::UserDirectory;
pub use webhook_event_repository::{
    UpsertOutcome, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus,
};
