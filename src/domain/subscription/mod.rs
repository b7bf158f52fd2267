//! Subscription domain: the recurring/one-time payment relationship between
//! one creator and one subscriber.

mod aggregate;
mod status;

pub use aggregate::{Interval, StatusProjection, Subscription};
pub use status::SubscriptionStatus;
