//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, money, errors)
//! - `fees` - Pure fee-calculation engine for every coexisting pricing model
//! - `subscription` - The creator/subscriber payment relationship and its lifecycle
//! - `ledger` - Immutable payment entries and activity audit rows
//! - `webhook` - Provider event envelope, error taxonomy, idempotent processor

pub mod fees;
pub mod foundation;
pub mod ledger;
pub mod subscription;
pub mod webhook;
