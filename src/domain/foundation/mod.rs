//! Foundation - shared value objects and error types for the payments domain.
//!
//! Everything here is pure: no I/O, no provider knowledge. Money is always
//! integer minor currency units (cents, kobo, pesewas); floats never touch
//! settlement amounts.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ActivityId, CreatorId, PaymentId, SubscriberId, SubscriptionId};
pub use money::{apply_bps, ceil_div, round_half_up, CurrencyCode};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
