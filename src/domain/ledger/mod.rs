//! Money-movement ledger: immutable [`Payment`] entries and the
//! [`Activity`] audit rows that accompany them.

mod activity;
mod payment;

pub use activity::Activity;
pub use payment::{Payment, PaymentStatus, PaymentType};
