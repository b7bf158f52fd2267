//! PostgreSQL adapter implementations.
//!
//! Implements the store ports using sqlx with connection pooling. Enum
//! columns are stored as string tags; rows are mapped through private
//! `FromRow` structs.

mod activities;
mod payments;
mod profiles;
mod subscriptions;
mod users;
mod webhook_events;

pub use activities::PostgresActivityLog;
pub use payments::PostgresPaymentStore;
pub use profiles::PostgresProfileStore;
pub use subscriptions::PostgresSubscriptionStore;
pub use users::PostgresUserDirectory;
pub use webhook_events::PostgresWebhookEventRepository;
