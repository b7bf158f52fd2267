//! In-memory adapters.
//!
//! Full-fidelity implementations of every store port, backed by
//! `tokio::sync::RwLock` maps. They enforce the same uniqueness rules as
//! the postgres adapters (parties key, provider event ids) so the
//! integration suite exercises real idempotency behavior without a
//! database.

mod activities;
mod lock;
mod payments;
mod profiles;
mod subscriptions;
mod users;
mod webhook_events;

pub use activities::InMemoryActivityLog;
pub use lock::InMemoryDistributedLock;
pub use payments::InMemoryPaymentStore;
pub use profiles::InMemoryProfileStore;
pub use subscriptions::InMemorySubscriptionStore;
pub use users::InMemoryUserDirectory;
pub use webhook_events::InMemoryWebhookEventRepository;
