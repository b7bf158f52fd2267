//! Adapters: implementations of port interfaces.
//!
//! - `http` - webhook ingestion surface (axum routes + signature checks)
//! - `lock` - Redis distributed lock
//! - `memory` - in-memory stores for the integration suite
//! - `paystack` / `stripe` - provider payload types and API clients
//! - `postgres` - sqlx-backed stores

pub mod http;
pub mod lock;
pub mod memory;
pub mod paystack;
pub mod postgres;
pub mod stripe;
